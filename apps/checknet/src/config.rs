use anyhow::{Context, Result};
use checknet_model::{default_targets, Target, TargetList};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Loads the target list. No path, or a path that does not exist, falls back
/// to the built-in gateway/DNS pair; an unreadable or malformed file is fatal.
pub fn load_targets(path: Option<&Path>) -> Result<Vec<Target>> {
    let Some(path) = path else {
        return Ok(default_targets());
    };

    if !path.exists() {
        warn!(path = %path.display(), "target list not found; using defaults");
        return Ok(default_targets());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read target list {:?}", path))?;
    let targets = parse_targets(&contents)
        .with_context(|| format!("failed to parse target list {:?}", path))?;
    info!(path = %path.display(), count = targets.len(), "loaded target list");
    Ok(targets)
}

pub fn parse_targets(contents: &str) -> Result<Vec<Target>> {
    let list: TargetList = serde_json::from_str(contents)?;
    Ok(list.into_targets())
}

/// Smallest interval `ping -i` can express; it takes seconds with three decimals.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Parses a probe interval such as `5s` or `500ms`. Anything under one
/// millisecond is rejected.
pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(value).map_err(|err| err.to_string())?;
    if interval < MIN_INTERVAL {
        return Err("interval must be at least 1ms".to_string());
    }
    Ok(interval)
}
