use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::config::{env_opt, env_or, env_parse};
use crate::http_client::{Request, get_json, http_status};
use crate::report::{print_fields, print_sample, short_obs, truncate_chars};
use crate::snapshot::{SnapshotStore, load_json, matching_files};
use crate::sources::{date_window, display_at, list_at, list_len, utc_today, value_at};

pub const SOURCE: &str = "api_football";

const DEFAULT_BASE: &str = "https://v3.football.api-sports.io";
const SAMPLE_CHARS: usize = 800;

#[derive(Debug, Clone)]
pub struct ApiFootballConfig {
    pub base: String,
    pub api_key: Option<String>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: Option<String>,
    pub league: String,
    pub season: String,
    pub pagination_limit: usize,
}

impl ApiFootballConfig {
    pub fn from_env() -> Self {
        Self {
            base: env_or("APIFOOTBALL_BASE", DEFAULT_BASE),
            api_key: env_opt("APIFOOTBALL_KEY"),
            rapidapi_key: env_opt("APIFOOTBALL_RAPIDAPI_KEY"),
            rapidapi_host: env_opt("APIFOOTBALL_RAPIDAPI_HOST"),
            league: env_or("APIFOOTBALL_LEAGUE_ID", "39"),
            season: env_or("APIFOOTBALL_SEASON", "2024"),
            pagination_limit: env_parse("PAGINATION_LIMIT", 3usize),
        }
    }

    /// Direct API-Sports key first, RapidAPI pair second.
    pub fn auth_headers(&self) -> Result<Vec<(&'static str, String)>> {
        if let Some(key) = self.api_key.as_ref() {
            return Ok(vec![("x-apisports-key", key.clone())]);
        }
        match (self.rapidapi_key.as_ref(), self.rapidapi_host.as_ref()) {
            (Some(key), Some(host)) => Ok(vec![
                ("X-RapidAPI-Key", key.clone()),
                ("X-RapidAPI-Host", host.clone()),
            ]),
            _ => Err(anyhow!(
                "no API-Football credentials found; set APIFOOTBALL_KEY or the RapidAPI pair"
            )),
        }
    }
}

pub struct ApiFootball {
    cfg: ApiFootballConfig,
    store: SnapshotStore,
}

impl ApiFootball {
    pub fn new(cfg: ApiFootballConfig, store: SnapshotStore) -> Self {
        Self { cfg, store }
    }

    pub fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut req = Request::new();
        for (name, value) in self.cfg.auth_headers()? {
            req = req.header(name, value);
        }
        for (key, value) in params {
            req = req.query(*key, value.clone());
        }
        let url = format!("{}{path}", self.cfg.base);
        let payload = get_json(&url, &req).with_context(|| format!("API-Football {path}"))?;
        validate_payload(path, payload)
    }

    /// Follows `paging.total` up to `pagination_limit` pages, appending each page's `response`.
    pub fn get_paged(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut data = self.get(path, params)?;
        let last = pages_to_fetch(&data, self.cfg.pagination_limit);
        if last > 1 {
            log::info!("{path}: fetching {last} pages");
        }
        for page in 2..=last {
            let mut paged = params.to_vec();
            paged.push(("page", page.to_string()));
            merge_page(&mut data, self.get(path, &paged)?);
        }
        Ok(data)
    }

    fn league_params(&self, from: &str, to: &str) -> Vec<(&'static str, String)> {
        vec![
            ("league", self.cfg.league.clone()),
            ("season", self.cfg.season.clone()),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ]
    }

    fn future_fixtures_name(&self) -> String {
        format!("fixtures_future_{}_{}.json", self.cfg.league, self.cfg.season)
    }

    /// Next 14 days of fixtures; returns the `response` list.
    pub fn fetch_future_fixtures(&self) -> Result<Value> {
        let (from, to) = date_window(utc_today(), 0, 14);
        let data = self.get_paged("/fixtures", &self.league_params(&from, &to))?;
        self.store
            .dump_json(SOURCE, &self.future_fixtures_name(), &data)?;
        Ok(data)
    }

    pub fn fetch_past_fixtures(&self) -> Result<Value> {
        let (from, to) = date_window(utc_today(), 30, 0);
        let data = self.get_paged("/fixtures", &self.league_params(&from, &to))?;
        let name = format!("fixtures_past_{}_{}.json", self.cfg.league, self.cfg.season);
        self.store.dump_json(SOURCE, &name, &data)?;
        Ok(data)
    }

    pub fn fetch_lineups(&self, fixture_id: i64) -> Result<Value> {
        let data = self.get("/fixtures/lineups", &[("fixture", fixture_id.to_string())])?;
        self.store
            .dump_json(SOURCE, &format!("lineups_fixture_{fixture_id}.json"), &data)?;
        Ok(data)
    }

    pub fn fetch_injuries(&self, file_suffix: &str) -> Result<Value> {
        let (from, to) = date_window(utc_today(), 14, 0);
        let data = self.get_paged("/injuries", &self.league_params(&from, &to))?;
        let name = format!(
            "injuries_{}_{}{file_suffix}.json",
            self.cfg.league, self.cfg.season
        );
        self.store.dump_json(SOURCE, &name, &data)?;
        Ok(data)
    }

    /// Smoke-test sequence: fixtures, lineups for the first fixture, injuries.
    pub fn run_connect(&self) -> Result<()> {
        let fixtures = self.fetch_future_fixtures()?;
        let resp = list_at(&fixtures, "response");
        print_sample("API-Football fixtures (future 14d)", &Value::from(resp.to_vec()), SAMPLE_CHARS);
        let first_id = resp.first().and_then(fixture_id);
        if let Some(first) = resp.first() {
            println!(
                "\nFixture sample: id={} kickoff={}  {} vs {}",
                display_at(first, &["fixture", "id"]),
                display_at(first, &["fixture", "date"]),
                display_at(first, &["teams", "home", "name"]),
                display_at(first, &["teams", "away", "name"]),
            );
        }

        if let Some(fid) = first_id {
            // Lineups are usually empty until shortly before kickoff.
            match self.fetch_lineups(fid) {
                Ok(data) => {
                    let resp = list_at(&data, "response");
                    print_sample("API-Football lineups", &Value::from(resp.to_vec()), SAMPLE_CHARS);
                    if let Some(team) = resp.first() {
                        println!(
                            "\nLineups sample: team={} formation={} startXI={}",
                            display_at(team, &["team", "name"]),
                            display_at(team, &["formation"]),
                            list_len(team, "startXI"),
                        );
                    }
                }
                Err(err) => {
                    println!("Lineups note (may be empty until close to kickoff): {err:#}");
                }
            }
        }

        let injuries = self.fetch_injuries("_last14d")?;
        let resp = list_at(&injuries, "response");
        print_sample("API-Football injuries (last 14d)", &Value::from(resp.to_vec()), SAMPLE_CHARS);
        if let Some(first) = resp.first() {
            println!(
                "\nInjury sample: player={} team={} type={}",
                display_at(first, &["player", "name"]),
                display_at(first, &["team", "name"]),
                display_at(first, &["type"]),
            );
        }
        Ok(())
    }

    /// Broader probe: leagues, both fixture windows, lineups, injuries and odds.
    pub fn run_probe(&self) -> Result<()> {
        self.probe_leagues()?;
        self.probe_fixtures()?;
        if let Err(err) = self.probe_lineups() {
            log::warn!("lineups probe failed: {err:#}");
            short_obs(
                "lineups",
                &["skipped (no cached future fixture or endpoint not available)"],
            );
        }
        self.probe_injuries()?;
        self.probe_odds()?;
        Ok(())
    }

    fn probe_leagues(&self) -> Result<()> {
        let data = self.get("/leagues", &[("season", self.cfg.season.clone())])?;
        self.store
            .dump_json(SOURCE, &format!("leagues_{}.json", self.cfg.season), &data)?;
        let resp = list_at(&data, "response");
        print_fields("API-Football /leagues fields", &Value::from(resp.to_vec()));
        let sample = resp.iter().take(10).map(league_sample).collect::<Vec<_>>();
        short_obs("sample leagues", &sample);
        Ok(())
    }

    fn probe_fixtures(&self) -> Result<()> {
        let future = self.fetch_future_fixtures()?;
        let resp = list_at(&future, "response");
        print_fields("fixtures (future 14d) fields", &Value::from(resp.to_vec()));
        match resp.first() {
            Some(first) => short_obs("fixture sample (future)", &future_fixture_sample(first)),
            None => short_obs(
                "fixtures (future)",
                &["no fixtures returned (offseason or league id/season mismatch)"],
            ),
        }

        let past = self.fetch_past_fixtures()?;
        let resp = list_at(&past, "response");
        print_fields("fixtures (past 30d) fields", &Value::from(resp.to_vec()));
        if let Some(first) = resp.first() {
            short_obs("fixture sample (past)", &[past_fixture_sample(first)]);
        }
        Ok(())
    }

    fn probe_lineups(&self) -> Result<()> {
        let dir = self
            .store
            .latest_dated_dir(SOURCE)
            .ok_or_else(|| anyhow!("no api_football snapshots yet"))?;
        let cached = matching_files(&dir, "fixtures_future", ".json")
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no cached future fixtures in {}", dir.display()))?;
        let fixtures = load_json(&cached)?;
        let resp = list_at(&fixtures, "response");
        if resp.is_empty() {
            short_obs("lineups", &["no future fixtures cached locally; skipping lineups"]);
            return Ok(());
        }
        let Some(fid) = resp.first().and_then(fixture_id) else {
            short_obs("lineups", &["no fixture id found"]);
            return Ok(());
        };
        let data = self.fetch_lineups(fid)?;
        let resp = list_at(&data, "response");
        print_fields("lineups fields", &Value::from(resp.to_vec()));
        if let Some(team) = resp.first() {
            short_obs("lineups sample", &lineup_sample(team));
        }
        Ok(())
    }

    fn probe_injuries(&self) -> Result<()> {
        match self.fetch_injuries("") {
            Ok(data) => {
                let resp = list_at(&data, "response");
                print_fields("injuries fields", &Value::from(resp.to_vec()));
                match resp.first() {
                    Some(first) => short_obs("injury sample", &[injury_sample(first)]),
                    None => short_obs(
                        "injuries",
                        &["no injuries returned in last 14d (or endpoint restricted)"],
                    ),
                }
                Ok(())
            }
            Err(err) if http_status(&err).is_some() => {
                short_obs("injuries", &[format!("not available on your plan / {err:#}")]);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn probe_odds(&self) -> Result<()> {
        let params = [
            ("league", self.cfg.league.clone()),
            ("season", self.cfg.season.clone()),
        ];
        match self.get("/odds", &params) {
            Ok(data) => {
                let name = format!("odds_{}_{}.json", self.cfg.league, self.cfg.season);
                self.store.dump_json(SOURCE, &name, &data)?;
                let resp = list_at(&data, "response");
                print_fields("odds fields (API-Football)", &Value::from(resp.to_vec()));
                match resp.first() {
                    Some(first) => short_obs("odds sample", &odds_sample(first)),
                    None => short_obs("odds", &["no odds returned (league/season/plan)"]),
                }
                Ok(())
            }
            Err(err) if http_status(&err).is_some() => {
                short_obs("odds", &[format!("not available on your plan / {err:#}")]);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// API-Football wraps everything in `{"response": ...}`; anything else is an error.
pub fn validate_payload(path: &str, payload: Value) -> Result<Value> {
    if payload.as_object().is_some_and(|o| o.contains_key("response")) {
        return Ok(payload);
    }
    Err(anyhow!(
        "unexpected API-Football payload at {path}: {}",
        truncate_chars(&payload.to_string(), 300)
    ))
}

/// Pages to request: the advertised total capped at `limit`, never fewer than one.
pub fn pages_to_fetch(payload: &Value, limit: usize) -> usize {
    let total = value_at(payload, &["paging", "total"])
        .and_then(Value::as_u64)
        .unwrap_or(1);
    usize::try_from(total).unwrap_or(usize::MAX).min(limit).max(1)
}

pub fn merge_page(into: &mut Value, mut page: Value) {
    let Some(Value::Array(extra)) = page.get_mut("response").map(Value::take) else {
        return;
    };
    if let Some(Value::Array(list)) = into.get_mut("response") {
        list.extend(extra);
    }
}

pub fn fixture_id(item: &Value) -> Option<i64> {
    value_at(item, &["fixture", "id"]).and_then(|v| v.as_i64())
}

pub fn league_sample(item: &Value) -> String {
    format!(
        "{} | {} | {} | {} | seasons={}",
        display_at(item, &["league", "id"]),
        display_at(item, &["league", "name"]),
        display_at(item, &["country", "name"]),
        display_at(item, &["league", "type"]),
        list_len(item, "seasons"),
    )
}

pub fn future_fixture_sample(item: &Value) -> Vec<String> {
    vec![
        format!(
            "id={} date={} status={}",
            display_at(item, &["fixture", "id"]),
            display_at(item, &["fixture", "date"]),
            display_at(item, &["fixture", "status", "short"]),
        ),
        format!(
            "home={} away={}",
            display_at(item, &["teams", "home", "name"]),
            display_at(item, &["teams", "away", "name"]),
        ),
    ]
}

pub fn past_fixture_sample(item: &Value) -> String {
    format!(
        "id={} date={} score={}-{}",
        display_at(item, &["fixture", "id"]),
        display_at(item, &["fixture", "date"]),
        display_at(item, &["goals", "home"]),
        display_at(item, &["goals", "away"]),
    )
}

pub fn lineup_sample(team: &Value) -> Vec<String> {
    vec![
        format!("team={}", display_at(team, &["team", "name"])),
        format!("formation={}", display_at(team, &["formation"])),
        format!("startXI_count={}", list_len(team, "startXI")),
        format!("subs_count={}", list_len(team, "substitutes")),
    ]
}

pub fn injury_sample(item: &Value) -> String {
    format!(
        "player={} | team={} | type={} | reason={}",
        display_at(item, &["player", "name"]),
        display_at(item, &["team", "name"]),
        display_at(item, &["type"]),
        display_at(item, &["reason"]),
    )
}

pub fn odds_sample(item: &Value) -> Vec<String> {
    let bookmakers = list_at(item, "bookmakers");
    vec![
        format!(
            "fixture={} bookmakers={}",
            display_at(item, &["fixture", "id"]),
            bookmakers.len()
        ),
        format!(
            "first_bookmaker={}",
            bookmakers
                .first()
                .map(|b| display_at(b, &["name"]))
                .unwrap_or_else(|| "None".to_string())
        ),
    ]
}
