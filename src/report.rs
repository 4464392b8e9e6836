use std::collections::BTreeSet;
use std::fmt::Display;

use serde_json::Value;

const BANNER_WIDTH: usize = 72;
const EXAMPLE_KEYS: usize = 20;

pub fn union_keys(items: &[Value]) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for item in items {
        if let Some(obj) = item.as_object() {
            keys.extend(obj.keys().cloned());
        }
    }
    keys.into_iter().collect()
}

pub fn print_fields(title: &str, items: &Value) {
    println!("\n{}", "-".repeat(BANNER_WIDTH));
    println!("{title}");
    println!("{}", "-".repeat(BANNER_WIDTH));
    match items {
        Value::Array(list) if list.first().is_some_and(Value::is_object) => {
            let keys = union_keys(list);
            println!("fields ({}): {}", keys.len(), format_keys(&keys));
            println!("example first row values:");
            let first = &list[0];
            for key in keys.iter().take(EXAMPLE_KEYS) {
                println!("  {key}: {}", display_value(first.get(key)));
            }
        }
        Value::Object(obj) => {
            let keys = obj.keys().cloned().collect::<BTreeSet<_>>();
            println!("fields: {}", format_keys(&keys.into_iter().collect::<Vec<_>>()));
        }
        _ => println!("no dict-like items to summarize"),
    }
}

/// Banner, field names of the first item and its JSON cut to `max_chars`.
pub fn print_sample(title: &str, items: &Value, max_chars: usize) {
    println!("\n{}", "=".repeat(BANNER_WIDTH));
    println!("{title}");
    println!("{}", "=".repeat(BANNER_WIDTH));
    let sample = match items {
        Value::Array(list) => list.first(),
        Value::Object(obj) if !obj.is_empty() => Some(items),
        _ => None,
    };
    let Some(sample) = sample else {
        println!("no items");
        return;
    };
    if let Some(obj) = sample.as_object() {
        let keys = obj.keys().cloned().collect::<BTreeSet<_>>();
        println!("fields: {}", format_keys(&keys.into_iter().collect::<Vec<_>>()));
    }
    println!("sample: {} ...", truncate_chars(&sample.to_string(), max_chars));
}

pub fn short_obs<T: Display>(label: &str, lines: &[T]) {
    println!("\n{label}");
    for line in lines {
        println!("  • {line}");
    }
}

pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn truncate_chars(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

pub fn format_keys(keys: &[String]) -> String {
    let quoted = keys.iter().map(|k| format!("'{k}'")).collect::<Vec<_>>();
    format!("[{}]", quoted.join(", "))
}
