use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::cli::Outcome;
use crate::config::env_or;
use crate::http_client::{Request, get_text_with_retry, is_blocked};
use crate::report::{print_fields, short_obs};
use crate::snapshot::SnapshotStore;
use crate::table::{Cell, Table};

pub const SOURCE: &str = "understat";

const BASE: &str = "https://understat.com";

pub const DISPLAY_COLUMNS: [&str; 10] = [
    "player_name",
    "team_title",
    "games",
    "xG",
    "npxG",
    "xA",
    "xGChain",
    "xGBuildup",
    "shots",
    "time",
];

const DATA_VARS: [&str; 3] = ["playersData", "teamsData", "matchesData"];

static NUXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)window\.__NUXT__\s*=\s*(\{.*?\});").expect("nuxt regex"));
static JSON_PARSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"JSON\.parse\('([^']+)'\)").expect("json.parse regex"));
static HEX_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\x([0-9A-Fa-f]{2})").expect("hex escape regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z]+);").expect("entity regex"));

#[derive(Debug, Clone)]
pub struct UnderstatConfig {
    pub league: String,
    pub season: String,
}

impl UnderstatConfig {
    pub fn from_env() -> Self {
        Self {
            league: env_or("UNDERSTAT_LEAGUE", "EPL"),
            season: env_or("UNDERSTAT_SEASON", "2024"),
        }
    }

    pub fn league_url(&self) -> String {
        format!("{BASE}/league/{}/{}", self.league, self.season)
    }
}

/// Resolves `\xHH` escapes left in single-quoted JS strings.
pub fn decode_hex_escapes(raw: &str) -> String {
    HEX_ESCAPE_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn unescape_html(raw: &str) -> String {
    ENTITY_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                    } else if let Some(dec) = name.strip_prefix('#') {
                        dec.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Embedded JSON found in `<script>` blocks, keyed by `__NUXT__` or the data variable name.
pub fn extract_payloads(html: &str) -> Result<Map<String, Value>> {
    let document = Html::parse_document(html);
    let scripts = Selector::parse("script")
        .ok()
        .context("invalid selector script")?;
    let texts = document
        .select(&scripts)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>();

    let mut payload = Map::new();
    for text in &texts {
        let Some(caps) = NUXT_RE.captures(text) else {
            continue;
        };
        match serde_json::from_str::<Value>(&caps[1]) {
            Ok(value) => {
                payload.insert("__NUXT__".to_string(), value);
            }
            Err(err) => log::debug!("skipping unparseable __NUXT__ block: {err}"),
        }
    }

    for text in &texts {
        let Some(var) = DATA_VARS.iter().find(|v| text.contains(**v)) else {
            continue;
        };
        let Some(caps) = JSON_PARSE_RE.captures(text) else {
            continue;
        };
        let decoded = unescape_html(&decode_hex_escapes(&caps[1]));
        match serde_json::from_str::<Value>(&decoded) {
            Ok(value) => {
                payload.insert(var.to_string(), value);
            }
            Err(err) => log::debug!("skipping unparseable {var} block: {err}"),
        }
    }
    Ok(payload)
}

fn looks_like_players(list: &[Value]) -> bool {
    list.first()
        .and_then(|v| v.as_object())
        .is_some_and(|obj| ["xG", "xA", "player_name", "player"].iter().any(|k| obj.contains_key(*k)))
}

fn non_empty_list(value: Option<&Value>) -> Option<&[Value]> {
    value
        .and_then(|v| v.as_array())
        .filter(|list| !list.is_empty())
        .map(|list| list.as_slice())
}

/// Players stats table from whichever payload shape the page carried; empty when none.
pub fn pick_players_table(payload: &Map<String, Value>) -> Table {
    if let Some(list) = non_empty_list(payload.get("playersData")) {
        return Table::from_records(list);
    }
    let blocks = payload
        .get("__NUXT__")
        .and_then(|n| n.get("data"))
        .and_then(|d| d.as_array())
        .map(|d| d.as_slice())
        .unwrap_or(&[]);
    for block in blocks.iter().filter(|b| b.is_object()) {
        if let Some(list) = block.get("playersData").and_then(|v| v.as_array()) {
            return Table::from_records(list);
        }
        let mut stack = vec![block];
        while let Some(cur) = stack.pop() {
            match cur {
                Value::Object(obj) => stack.extend(obj.values()),
                Value::Array(list) if looks_like_players(list) => {
                    return Table::from_records(list);
                }
                _ => {}
            }
        }
    }
    Table::default()
}

/// Highest xG first; rows without a numeric xG are left out.
pub fn top_by_xg(table: &Table, n: usize) -> Vec<String> {
    let names = table.column("player_name");
    let mut scored = table
        .column("xG")
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_f64().map(|xg| (i, xg)))
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(n)
        .map(|(i, xg)| {
            let name = names
                .get(i)
                .filter(|c| !c.is_null())
                .map(Cell::text)
                .unwrap_or_else(|| "?".to_string());
            format!("{name} xG={xg:.2}")
        })
        .collect()
}

pub fn run(store: &SnapshotStore) -> Result<Outcome> {
    let cfg = UnderstatConfig::from_env();
    let html = match get_text_with_retry(&cfg.league_url(), &Request::new()) {
        Ok(html) => html,
        Err(err) if is_blocked(&err) => {
            return Ok(Outcome::Skipped(format!(
                "understat refused the request ({err:#}); skipping this run"
            )));
        }
        Err(err) => return Err(err),
    };

    let payload = extract_payloads(&html)?;
    if payload.is_empty() {
        println!("No recognizable JSON payload found on the page; site structure may have changed.");
    } else {
        let name = format!("understat_{}_{}_payload.json", cfg.league, cfg.season);
        store.dump_json(SOURCE, &name, &Value::Object(payload.clone()))?;
    }

    let table = pick_players_table(&payload);
    if table.is_empty() {
        return Ok(Outcome::Skipped(
            "No players table found. Consider trying another league/season, or updating the parser."
                .to_string(),
        ));
    }

    println!(
        "\nunderstat {} {}: rows={}, cols={}",
        cfg.league,
        cfg.season,
        table.len(),
        table.width()
    );
    let first = table.record(0).into_iter().collect::<Vec<_>>();
    print_fields("understat columns", &Value::from(first));

    let present = DISPLAY_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect::<Vec<_>>();
    if !present.is_empty() {
        println!("\nexample values:");
        println!("{}", table.select(&present).render(10));
    }
    if table.has_column("xG") {
        short_obs("top-5 by xG (sample)", &top_by_xg(&table, 5));
    }
    Ok(Outcome::Complete)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hex_and_entity_decoding() {
        assert_eq!(decode_hex_escapes(r"\x5B\x7B\x22id\x22:1\x7D\x5D"), r#"[{"id":1}]"#);
        assert_eq!(unescape_html("a &amp; b &quot;c&quot; &#39;d&#x27;"), "a & b \"c\" 'd'");
        assert_eq!(unescape_html("&unknown;"), "&unknown;");
    }

    #[test]
    fn nested_nuxt_players_are_found() {
        let mut payload = Map::new();
        payload.insert(
            "__NUXT__".to_string(),
            json!({"data": [{"league": {"stats": {"rows": [
                {"player_name": "Saka", "xG": "9.1"}
            ]}}}]}),
        );
        let table = pick_players_table(&payload);
        assert_eq!(table.len(), 1);
        assert!(table.has_column("xG"));
    }

    #[test]
    fn top_by_xg_sorts_numeric_strings() {
        let table = Table::from_records(&[
            json!({"player_name": "A", "xG": "3.5"}),
            json!({"player_name": "B", "xG": "10.25"}),
            json!({"player_name": null, "xG": "7"}),
        ]);
        assert_eq!(
            top_by_xg(&table, 5),
            vec!["B xG=10.25", "? xG=7.00", "A xG=3.50"]
        );
    }
}
