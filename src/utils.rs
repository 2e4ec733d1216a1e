use anyhow::Context;
use chrono::{DateTime, Local};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::fs;

use crate::types::ConfigError;

pub const DEFAULT_SOCKS_ADDR: &str = "127.0.0.1:9150";
pub const TOR_CHECK_URL: &str = "https://check.torproject.org/api/ip";
pub const TOR_MARKER: &str = r#""IsTor":true"#;
pub const OUTPUT_DIR: &str = "scan_results";
pub const RUN_LOG_FILE: &str = "scan_report.log";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
pub const CAPTURE_DEADLINE: Duration = Duration::from_secs(60);
pub const SETTLE_DELAY: Duration = Duration::from_secs(6);
pub const PACING_DELAY: Duration = Duration::from_secs(4);

pub const SCREENSHOT_QUALITY: u32 = 95;
pub const WINDOW_SIZE: (u32, u32) = (1920, 1080);

// file name stamp, e.g. 20240131_235959
pub const FORMAT_STRING: &str = "%Y%m%d_%H%M%S";
pub const LOG_FORMAT_STRING: &str = "%Y/%m/%d %H:%M:%S";

/// Prefixes `http://` unless the address already carries an http(s) scheme.
pub fn normalize_target(raw: &str) -> String {
    let t = raw.trim();
    if t.to_lowercase().starts_with("http") {
        return t.to_string();
    }
    format!("http://{}", t)
}

/// One target per non-blank line, normalized.
pub fn parse_targets(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(normalize_target)
        .collect()
}

pub async fn read_targets(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::TargetFile {
            path: path.to_path_buf(),
            source,
        })?;

    let targets = parse_targets(&content);
    if targets.is_empty() {
        return Err(ConfigError::NoTargets(path.to_path_buf()));
    }
    Ok(targets)
}

pub fn file_timestamp(now: &DateTime<Local>) -> String {
    now.format(FORMAT_STRING).to_string()
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Writes to a `.part` sibling first so the final name only ever holds a
/// complete artifact.
pub async fn write_artifact(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = part_path(path);
    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e).context(format!("could not write {:?}", tmp));
    }
    fs::rename(&tmp, path)
        .await
        .context(format!("could not move {:?} into place", tmp))?;
    Ok(())
}
