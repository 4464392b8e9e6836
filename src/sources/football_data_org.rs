use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::{env_or, env_required};
use crate::http_client::{Request, get_json, http_status};
use crate::report::{print_fields, print_sample, short_obs};
use crate::snapshot::SnapshotStore;
use crate::sources::{date_window, display_at, list_at, str_at, utc_today};

/// Directory used by the smoke-test connector.
pub const CONNECT_SOURCE: &str = "footballdata_org";
/// Directory used by the broader probe.
pub const PULL_SOURCE: &str = "footballdata";

pub const POPULAR_CODES: [&str; 5] = ["PL", "BL1", "PD", "SA", "CL"];

const DEFAULT_BASE: &str = "https://api.football-data.org/v4";
const CONNECT_SAMPLE_CHARS: usize = 600;
const PROBED_COMPETITIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct FdOrgConfig {
    pub base: String,
    pub token: String,
}

impl FdOrgConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base: env_or("FOOTBALLDATA_BASE", DEFAULT_BASE),
            token: env_required("FOOTBALLDATA_TOKEN")?,
        })
    }
}

pub struct FdOrg {
    cfg: FdOrgConfig,
    store: SnapshotStore,
    source: &'static str,
}

impl FdOrg {
    pub fn new(cfg: FdOrgConfig, store: SnapshotStore, source: &'static str) -> Self {
        Self { cfg, store, source }
    }

    pub fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut req = Request::new().header("X-Auth-Token", self.cfg.token.clone());
        for (key, value) in params {
            req = req.query(*key, value.clone());
        }
        let url = format!("{}{path}", self.cfg.base);
        get_json(&url, &req).with_context(|| format!("football-data.org {path}"))
    }

    fn save(&self, name: &str, data: &Value) -> Result<()> {
        self.store.dump_json(self.source, name, data)?;
        Ok(())
    }

    pub fn competitions(&self) -> Result<Value> {
        let data = self.get("/competitions", &[])?;
        self.save("competitions.json", &data)?;
        Ok(data)
    }

    pub fn matches_future(&self, code: &str) -> Result<Value> {
        let (from, to) = date_window(utc_today(), 0, 14);
        let data = self.matches(code, from, to)?;
        self.save(&format!("matches_future_{code}.json"), &data)?;
        Ok(data)
    }

    pub fn matches_past(&self, code: &str) -> Result<Value> {
        let (from, to) = date_window(utc_today(), 30, 0);
        let data = self.matches(code, from, to)?;
        self.save(&format!("matches_past_{code}.json"), &data)?;
        Ok(data)
    }

    fn matches(&self, code: &str, from: String, to: String) -> Result<Value> {
        self.get(
            &format!("/competitions/{code}/matches"),
            &[("dateFrom", from), ("dateTo", to)],
        )
    }

    pub fn standings(&self, code: &str) -> Result<Value> {
        let data = self.get(&format!("/competitions/{code}/standings"), &[])?;
        self.save(&format!("standings_{code}.json"), &data)?;
        Ok(data)
    }

    pub fn scorers(&self, code: &str) -> Result<Value> {
        let data = self.get(
            &format!("/competitions/{code}/scorers"),
            &[("limit", "20".to_string())],
        )?;
        self.save(&format!("scorers_{code}.json"), &data)?;
        Ok(data)
    }

    /// Competitions plus the Premier League matches, standings and scorers.
    pub fn run_connect(&self) -> Result<()> {
        let comps = self.competitions()?;
        sample_list("FD.org competitions", &comps, "competitions");

        let fut = self.matches_future("PL")?;
        sample_list("FD.org matches future 14d (PL)", &fut, "matches");
        let past = self.matches_past("PL")?;
        sample_list("FD.org matches past 30d (PL)", &past, "matches");

        let st = self.standings("PL")?;
        sample_list("FD.org standings (PL)", &st, "standings");
        let sc = self.scorers("PL")?;
        sample_list("FD.org scorers (PL)", &sc, "scorers");
        Ok(())
    }

    pub fn run_probe(&self) -> Result<()> {
        let comps = self.competitions()?;
        let list = list_at(&comps, "competitions");
        print_fields("FD.org /competitions fields", &Value::from(list.to_vec()));
        let sample = list.iter().take(10).map(competition_sample).collect::<Vec<_>>();
        short_obs("sample competitions", &sample);

        for code in popular_codes(list).into_iter().take(PROBED_COMPETITIONS) {
            self.probe_matches(&code)?;
            self.probe_standings_and_scorers(&code)?;
        }
        Ok(())
    }

    fn probe_matches(&self, code: &str) -> Result<()> {
        let fut = self.matches_future(code)?;
        let matches = list_at(&fut, "matches");
        print_fields(
            &format!("FD.org matches future (14d) {code}"),
            &Value::from(matches.to_vec()),
        );
        match matches.first() {
            Some(m) => short_obs("match sample (future)", &future_match_sample(m)),
            None => short_obs("matches future", &[format!("{code}: none returned (offseason?)")]),
        }

        let past = self.matches_past(code)?;
        let matches = list_at(&past, "matches");
        print_fields(
            &format!("FD.org matches past (30d) {code}"),
            &Value::from(matches.to_vec()),
        );
        if let Some(m) = matches.first() {
            short_obs("match sample (past)", &[past_match_sample(m)]);
        }
        Ok(())
    }

    fn probe_standings_and_scorers(&self, code: &str) -> Result<()> {
        match self.standings(code) {
            Ok(st) => print_fields(
                &format!("FD.org standings {code}"),
                &Value::from(list_at(&st, "standings").to_vec()),
            ),
            Err(err) if http_status(&err).is_some() => {
                short_obs("standings", &[format!("{code}: {err:#}")])
            }
            Err(err) => return Err(err),
        }

        match self.scorers(code) {
            Ok(sc) => {
                let scorers = list_at(&sc, "scorers");
                print_fields(
                    &format!("FD.org scorers {code}"),
                    &Value::from(scorers.to_vec()),
                );
                if let Some(top) = scorers.first() {
                    short_obs("top scorer sample", &[scorer_sample(top)]);
                }
            }
            Err(err) if http_status(&err).is_some() => {
                short_obs("scorers", &[format!("{code}: {err:#}")])
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

fn sample_list(title: &str, data: &Value, key: &str) {
    print_sample(
        title,
        &Value::from(list_at(data, key).to_vec()),
        CONNECT_SAMPLE_CHARS,
    );
}

/// Codes of the well-known competitions, in the order the API lists them.
pub fn popular_codes(competitions: &[Value]) -> Vec<String> {
    competitions
        .iter()
        .filter_map(|c| str_at(c, &["code"]))
        .filter(|code| POPULAR_CODES.contains(&code.as_str()))
        .collect()
}

pub fn competition_sample(c: &Value) -> String {
    format!(
        "{} | {} | {} | type={}",
        display_at(c, &["code"]),
        display_at(c, &["name"]),
        display_at(c, &["area", "name"]),
        display_at(c, &["type"]),
    )
}

pub fn future_match_sample(m: &Value) -> Vec<String> {
    vec![
        format!(
            "id={} | utcDate={} | status={}",
            display_at(m, &["id"]),
            display_at(m, &["utcDate"]),
            display_at(m, &["status"]),
        ),
        format!(
            "home={} | away={}",
            display_at(m, &["homeTeam", "name"]),
            display_at(m, &["awayTeam", "name"]),
        ),
    ]
}

pub fn past_match_sample(m: &Value) -> String {
    format!(
        "id={} | utcDate={} | FT={}-{}",
        display_at(m, &["id"]),
        display_at(m, &["utcDate"]),
        display_at(m, &["score", "fullTime", "home"]),
        display_at(m, &["score", "fullTime", "away"]),
    )
}

pub fn scorer_sample(s: &Value) -> String {
    format!(
        "player={} | team={} | goals={}",
        display_at(s, &["player", "name"]),
        display_at(s, &["team", "name"]),
        display_at(s, &["goals"]),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn popular_codes_keep_api_order() {
        let comps = vec![
            json!({"code": "CL"}),
            json!({"code": "WC"}),
            json!({"code": "PL"}),
            json!({"name": "no code"}),
        ];
        assert_eq!(popular_codes(&comps), vec!["CL", "PL"]);
    }

    #[test]
    fn past_match_sample_reads_full_time() {
        let m = json!({
            "id": 11,
            "utcDate": "2024-08-17T14:00:00Z",
            "score": {"fullTime": {"home": 2, "away": null}}
        });
        assert_eq!(
            past_match_sample(&m),
            "id=11 | utcDate=2024-08-17T14:00:00Z | FT=2-None"
        );
    }
}
