use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::Outcome;
use crate::http_client::{Request, get_json};
use crate::report::print_fields;
use crate::snapshot::SnapshotStore;
use crate::sources::{flatten_record, str_at};
use crate::table::Table;

pub const SOURCE: &str = "statsbomb_open";

const BASE: &str = "https://raw.githubusercontent.com/statsbomb/open-data/master/data";

pub const EVENT_COLUMNS: [&str; 8] = [
    "type.name",
    "team.name",
    "player.name",
    "shot.statsbomb_xg",
    "pass.length",
    "pass.height",
    "minute",
    "second",
];

pub fn events_table(events: &[Value]) -> Table {
    let flat = events.iter().map(flatten_record).collect::<Vec<_>>();
    Table::from_records(&flat)
}

fn fetch(url: &str) -> Result<Value> {
    get_json(url, &Request::new()).with_context(|| format!("statsbomb open data {url}"))
}

pub fn run(store: &SnapshotStore) -> Result<Outcome> {
    let comps = fetch(&format!("{BASE}/competitions.json"))?;
    store.dump_json(SOURCE, "competitions.json", &comps)?;
    print_fields("statsbomb competitions fields", &comps);

    let comp = comps
        .as_array()
        .and_then(|list| list.first())
        .context("statsbomb competitions list is empty")?;
    let cid = str_at(comp, &["competition_id"]).context("competition without competition_id")?;
    let sid = str_at(comp, &["season_id"]).context("competition without season_id")?;

    let matches = fetch(&format!("{BASE}/matches/{cid}/{sid}.json"))?;
    store.dump_json(SOURCE, &format!("matches_{cid}_{sid}.json"), &matches)?;
    print_fields("statsbomb matches fields", &matches);

    let Some(first) = matches.as_array().and_then(|list| list.first()) else {
        return Ok(Outcome::Skipped("no matches in sample season".to_string()));
    };
    let mid = str_at(first, &["match_id"]).context("match without match_id")?;

    let events = fetch(&format!("{BASE}/events/{mid}.json"))?;
    store.dump_json(SOURCE, &format!("events_{mid}.json"), &events)?;

    let table = events_table(events.as_array().map(|v| v.as_slice()).unwrap_or(&[]));
    println!("\nrows(events)={}, cols={}", table.len(), table.width());
    let present = EVENT_COLUMNS
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect::<Vec<_>>();
    println!("\nexample values:");
    println!("{}", table.select(&present).render(8));
    Ok(Outcome::Complete)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn events_table_has_dotted_columns() {
        let events = vec![
            json!({"minute": 1, "type": {"name": "Pass"}, "pass": {"length": 12.5}}),
            json!({"minute": 2, "type": {"name": "Shot"}, "shot": {"statsbomb_xg": 0.3}}),
        ];
        let table = events_table(&events);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &["minute", "type.name", "pass.length", "shot.statsbomb_xg"]
        );
    }
}
