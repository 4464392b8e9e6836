use std::fmt;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::USER_AGENT;
use serde_json::Value;

pub const INGEST_USER_AGENT: &str = "betmachine-soccer-ingest/1.0 (+github)";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const RETRY_ATTEMPTS: u32 = 4;
const RETRY_BASE_MS: u64 = 500;
const SNIPPET_CHARS: usize = 220;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Non-2xx response, kept as a typed error so callers can branch on the status.
#[derive(Debug, Clone)]
pub struct HttpStatusError {
    pub status: StatusCode,
    pub url: String,
    pub snippet: String,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http {} for {}: {}", self.status, self.url, self.snippet)
    }
}

impl std::error::Error for HttpStatusError {}

pub fn http_status(err: &anyhow::Error) -> Option<StatusCode> {
    err.chain()
        .find_map(|e| e.downcast_ref::<HttpStatusError>())
        .map(|e| e.status)
}

#[derive(Debug, Clone, Default)]
pub struct Request<'a> {
    pub query: Vec<(&'a str, String)>,
    pub headers: Vec<(&'a str, String)>,
    pub timeout: Option<Duration>,
}

impl<'a> Request<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn header(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    fn apply(&self, mut req: RequestBuilder) -> RequestBuilder {
        req = req.header(USER_AGENT, INGEST_USER_AGENT);
        if !self.query.is_empty() {
            req = req.query(&self.query);
        }
        for (name, value) in &self.headers {
            req = req.header(*name, value.as_str());
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        req
    }
}

pub fn get_text(url: &str, request: &Request<'_>) -> Result<String> {
    let client = http_client()?;
    log::info!("GET {url}");
    let resp = request
        .apply(client.get(url))
        .send()
        .with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let final_url = resp.url().to_string();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(HttpStatusError {
            status,
            url: strip_secrets(&final_url),
            snippet: snippet(&body),
        }
        .into());
    }
    Ok(body)
}

pub fn get_json(url: &str, request: &Request<'_>) -> Result<Value> {
    let body = get_text(url, request)?;
    serde_json::from_str(body.trim()).with_context(|| format!("invalid json from {url}"))
}

pub fn get_text_with_retry(url: &str, request: &Request<'_>) -> Result<String> {
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match get_text(url, request) {
            Ok(body) => return Ok(body),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                log::warn!("attempt {attempt}/{RETRY_ATTEMPTS} for {url} failed: {err:#}");
                last_err = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    let sleep_ms = RETRY_BASE_MS.saturating_mul(attempt as u64);
                    thread::sleep(Duration::from_millis(sleep_ms));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("download failed for {url}")))
}

pub fn is_blocked(err: &anyhow::Error) -> bool {
    matches!(
        http_status(err),
        Some(StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
    )
}

fn is_retryable(err: &anyhow::Error) -> bool {
    match http_status(err) {
        Some(status) if status == StatusCode::TOO_MANY_REQUESTS => true,
        Some(status) => !status.is_client_error(),
        None => true,
    }
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

fn strip_secrets(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let kept = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((k, _)) if k.eq_ignore_ascii_case("apikey") => format!("{k}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{kept}")
}
