use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;

/// Writes raw responses under `<raw_root>/<source>/<YYYY-MM-DD>/`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    raw_root: PathBuf,
    day: String,
}

impl SnapshotStore {
    pub fn new(raw_root: impl AsRef<Path>) -> Self {
        Self {
            raw_root: raw_root.as_ref().to_path_buf(),
            day: utc_day(),
        }
    }

    pub fn with_day(mut self, day: &str) -> Self {
        self.day = day.to_string();
        self
    }

    pub fn raw_root(&self) -> &Path {
        &self.raw_root
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    pub fn today_dir(&self, source: &str) -> Result<PathBuf> {
        let dir = self.raw_root.join(source).join(&self.day);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn dump_json(&self, source: &str, name: &str, value: &Value) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(value).context("serialize snapshot")?;
        self.dump_text(source, name, &json)
    }

    pub fn dump_text(&self, source: &str, name: &str, text: &str) -> Result<PathBuf> {
        let path = self.today_dir(source)?.join(name);
        write_atomic(&path, text.as_bytes())?;
        println!("saved: {}", path.display());
        log::debug!("wrote {} bytes to {}", text.len(), path.display());
        Ok(path)
    }

    pub fn latest_dated_dir(&self, source: &str) -> Option<PathBuf> {
        latest_dated_dir(&self.raw_root.join(source))
    }
}

pub fn utc_day() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

pub fn latest_dated_dir(base: &Path) -> Option<PathBuf> {
    let mut dirs = fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();
    dirs.pop()
}

/// Files in `dir` whose name starts with `prefix` and ends with `suffix`, sorted.
pub fn matching_files(dir: &Path, prefix: &str, suffix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix))
        })
        .collect::<Vec<_>>();
    out.sort();
    out
}

pub fn load_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut value: Value =
        serde_json::from_str(&raw).with_context(|| format!("invalid json in {}", path.display()))?;
    if let Some(inner) = value.as_object_mut().and_then(|obj| obj.remove("json")) {
        return Ok(inner);
    }
    Ok(value)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
