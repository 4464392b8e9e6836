pub mod api_football;
pub mod fbref;
pub mod football_data_csv;
pub mod football_data_org;
pub mod odds_api;
pub mod openligadb;
pub mod statsbomb;
pub mod understat;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Map, Value};

/// Follows object keys; `None` as soon as a step is missing or null.
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    if cur.is_null() { None } else { Some(cur) }
}

pub fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    value_at(value, path).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

pub fn display_at(value: &Value, path: &[&str]) -> String {
    str_at(value, path).unwrap_or_else(|| "None".to_string())
}

/// First key present on the object, for providers that change key casing.
pub fn pick<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    keys.iter().find_map(|k| obj.get(*k))
}

pub fn list_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

pub fn list_len(value: &Value, key: &str) -> usize {
    list_at(value, key).len()
}

pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `(today - back, today + forward)` as ISO dates.
pub fn date_window(today: NaiveDate, back_days: i64, forward_days: i64) -> (String, String) {
    let from = today - Duration::days(back_days);
    let to = today + Duration::days(forward_days);
    (from.to_string(), to.to_string())
}

/// Nested objects become dotted keys; arrays and scalars are kept as leaf values.
pub fn flatten_record(value: &Value) -> Value {
    let mut out = Map::new();
    if let Value::Object(obj) = value {
        flatten_into(&mut out, "", obj);
    }
    Value::Object(out)
}

fn flatten_into(out: &mut Map<String, Value>, prefix: &str, obj: &Map<String, Value>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, &name, inner),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn value_at_treats_null_as_missing() {
        let v = json!({"fixture": {"id": 7, "venue": null}});
        assert_eq!(value_at(&v, &["fixture", "id"]), Some(&json!(7)));
        assert_eq!(value_at(&v, &["fixture", "venue"]), None);
        assert_eq!(str_at(&v, &["fixture", "id"]).as_deref(), Some("7"));
    }

    #[test]
    fn date_window_spans_both_sides() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        assert_eq!(
            date_window(today, 30, 0),
            ("2024-07-21".to_string(), "2024-08-20".to_string())
        );
        assert_eq!(
            date_window(today, 0, 14),
            ("2024-08-20".to_string(), "2024-09-03".to_string())
        );
    }

    #[test]
    fn flatten_uses_dotted_keys() {
        let ev = json!({
            "minute": 3,
            "type": {"id": 16, "name": "Shot"},
            "shot": {"statsbomb_xg": 0.12, "freeze_frame": [{"x": 1}]},
            "tactics": {}
        });
        let flat = flatten_record(&ev);
        assert_eq!(flat["type.name"], json!("Shot"));
        assert_eq!(flat["shot.statsbomb_xg"], json!(0.12));
        assert!(flat["shot.freeze_frame"].is_array());
        assert_eq!(flat["tactics"], json!({}));
        assert_eq!(flat["minute"], json!(3));
    }
}
