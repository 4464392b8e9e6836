use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Result, anyhow};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_TEAM_DICTIONARY: &str = "mappings/team_dictionary.csv";

pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_required(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| anyhow!("missing required env var: {key}"))
}

pub fn env_list(key: &str, default: &str) -> Vec<String> {
    split_list(&env_or(key, default))
}

pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub normalized: PathBuf,
    pub joined: PathBuf,
    pub team_dictionary: PathBuf,
}

impl DataPaths {
    pub fn from_env() -> Self {
        let mut paths = Self::new(env_or("INGEST_DATA_DIR", DEFAULT_DATA_DIR));
        if let Some(dict) = env_opt("TEAM_DICTIONARY_PATH") {
            paths.team_dictionary = PathBuf::from(dict);
        }
        paths
    }

    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            raw: root.join("raw"),
            normalized: root.join("normalized"),
            joined: root.join("joined"),
            team_dictionary: PathBuf::from(DEFAULT_TEAM_DICTIONARY),
            root,
        }
    }

    pub fn with_team_dictionary(mut self, path: impl AsRef<Path>) -> Self {
        self.team_dictionary = path.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(" soccer_epl, ,soccer_spain_la_liga,"),
            vec!["soccer_epl", "soccer_spain_la_liga"]
        );
    }

    #[test]
    fn data_paths_layout() {
        let paths = DataPaths::new("/tmp/ingest");
        assert_eq!(paths.raw, PathBuf::from("/tmp/ingest/raw"));
        assert_eq!(paths.normalized, PathBuf::from("/tmp/ingest/normalized"));
        assert_eq!(paths.joined, PathBuf::from("/tmp/ingest/joined"));
    }
}
