use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::config::{env_list, env_or, env_required};
use crate::http_client::{Request, get_json, http_status};
use crate::report::{print_fields, short_obs};
use crate::snapshot::SnapshotStore;
use crate::sources::{display_at, list_at, list_len, str_at};

pub const SOURCE: &str = "odds_api";

const BASE: &str = "https://api.the-odds-api.com/v4";
const TIMEOUT_SECS: u64 = 25;
const FULL_MARKETS: &str = "h2h,spreads,totals";

#[derive(Debug, Clone)]
pub struct OddsApiConfig {
    pub api_key: String,
    pub regions: String,
    pub odds_format: String,
    pub sport_keys: Vec<String>,
}

impl OddsApiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env_required("ODDS_API_KEY")?,
            regions: env_or("ODDS_REGIONS", "us,uk,eu"),
            odds_format: env_or("ODDS_FORMAT", "decimal"),
            sport_keys: env_list("ODDS_SPORT_KEYS", "soccer_epl"),
        })
    }
}

pub struct OddsApi {
    cfg: OddsApiConfig,
    store: SnapshotStore,
}

impl OddsApi {
    pub fn new(cfg: OddsApiConfig, store: SnapshotStore) -> Self {
        Self { cfg, store }
    }

    pub fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut req = Request::new().timeout_secs(TIMEOUT_SECS);
        for (key, value) in params {
            req = req.query(*key, value.clone());
        }
        req = req.query("apiKey", self.cfg.api_key.clone());
        let url = format!("{BASE}{path}");
        get_json(&url, &req).with_context(|| format!("odds api {path}"))
    }

    fn odds_params(&self, markets: &str) -> Vec<(&'static str, String)> {
        vec![
            ("regions", self.cfg.regions.clone()),
            ("oddsFormat", self.cfg.odds_format.clone()),
            ("markets", markets.to_string()),
        ]
    }

    pub fn list_soccer_sports(&self) -> Result<Vec<Value>> {
        let data = self.get("/sports", &[])?;
        let soccer = soccer_only(&data);
        self.store
            .dump_json(SOURCE, "sports_soccer.json", &Value::from(soccer.clone()))?;
        print_fields("The Odds API /sports (soccer only)", &Value::from(soccer.clone()));
        let sample = soccer
            .iter()
            .take(12)
            .map(|s| {
                format!(
                    "{} | {} | {}",
                    display_at(s, &["key"]),
                    display_at(s, &["group"]),
                    display_at(s, &["title"])
                )
            })
            .collect::<Vec<_>>();
        short_obs("sample soccer sports", &sample);
        Ok(soccer)
    }

    pub fn fetch_odds(&self, sport_key: &str) -> Result<()> {
        let data = self.get(
            &format!("/sports/{sport_key}/odds"),
            &self.odds_params(FULL_MARKETS),
        )?;
        self.store
            .dump_json(SOURCE, &format!("odds_{sport_key}.json"), &data)?;
        let events = data.as_array().map(|v| v.as_slice()).unwrap_or(&[]);
        let Some(event) = events.first() else {
            println!("no events returned for {sport_key}");
            return Ok(());
        };
        print_fields(&format!("{sport_key} event top-level fields"), &data);
        short_obs("event sanity", &event_sanity(event));
        if let Some(bookmaker) = list_at(event, "bookmakers").first() {
            short_obs("bookmaker sample", &bookmaker_sample(bookmaker));
            if let Some(market) = list_at(bookmaker, "markets").first() {
                short_obs("market sample", &market_sample(market));
            }
        }
        Ok(())
    }

    /// Yesterday's snapshot for the first current event; plan restrictions become a note.
    pub fn try_historical(&self, sport_key: &str) -> Result<()> {
        match self.fetch_historical(sport_key) {
            Ok(()) => Ok(()),
            Err(err) if http_status(&err).is_some() => {
                short_obs("historical not enabled/available", &[format!("{err:#}")]);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn fetch_historical(&self, sport_key: &str) -> Result<()> {
        let events = self.get(&format!("/sports/{sport_key}/odds"), &self.odds_params("h2h"))?;
        let Some(event_id) = events
            .as_array()
            .and_then(|list| list.first())
            .and_then(|ev| str_at(ev, &["id"]))
        else {
            println!("no current events to demo historical snapshot");
            return Ok(());
        };
        let date = historical_date(Utc::now());
        let mut params = self.odds_params("h2h");
        params.insert(0, ("date", date.clone()));
        let data = self.get(
            &format!("/historical/sports/{sport_key}/events/{event_id}/odds"),
            &params,
        )?;
        self.store.dump_json(
            SOURCE,
            &format!("historical_{sport_key}_{event_id}.json"),
            &data,
        )?;
        short_obs(
            "historical snapshot (if enabled)",
            &[
                format!("bookmakers={}", list_len(&data, "bookmakers")),
                format!("date={date}"),
            ],
        );
        Ok(())
    }

    pub fn run(&self) -> Result<()> {
        self.list_soccer_sports()?;
        for key in &self.cfg.sport_keys {
            self.fetch_odds(key)?;
            self.try_historical(key)?;
        }
        Ok(())
    }
}

pub fn soccer_only(sports: &Value) -> Vec<Value> {
    sports
        .as_array()
        .map(|list| {
            list.iter()
                .filter(|s| {
                    s.get("key")
                        .and_then(|k| k.as_str())
                        .is_some_and(|k| k.starts_with("soccer_"))
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

pub fn historical_date(now: DateTime<Utc>) -> String {
    (now - Duration::days(1))
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

pub fn event_sanity(event: &Value) -> Vec<String> {
    vec![
        format!("id={}", display_at(event, &["id"])),
        format!("commence_time={}", display_at(event, &["commence_time"])),
        format!("home={}", display_at(event, &["home_team"])),
        format!("away={}", display_at(event, &["away_team"])),
        format!("bookmakers={}", list_len(event, "bookmakers")),
    ]
}

pub fn bookmaker_sample(bookmaker: &Value) -> Vec<String> {
    vec![
        format!("title={}", display_at(bookmaker, &["title"])),
        format!("last_update={}", display_at(bookmaker, &["last_update"])),
        format!("markets={}", list_len(bookmaker, "markets")),
    ]
}

pub fn market_sample(market: &Value) -> Vec<String> {
    let mut lines = vec![
        format!(
            "market.key={} last_update={}",
            display_at(market, &["key"]),
            display_at(market, &["last_update"])
        ),
        format!("outcomes={}", list_len(market, "outcomes")),
    ];
    if let Some(o) = list_at(market, "outcomes").first() {
        lines.push(format!(
            "outcome: name={} price={} point={}",
            display_at(o, &["name"]),
            display_at(o, &["price"]),
            display_at(o, &["point"]),
        ));
    }
    lines
}
