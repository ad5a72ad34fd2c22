use crate::parser::parse_traceroute_n;
use checknet_model::HopObservation;
use std::io;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to spawn traceroute for {target}: {source}")]
    Spawn {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("traceroute failed for {target} (status: {status}): {output}")]
    Failed {
        target: String,
        status: String,
        output: String,
    },

    #[error("failed to parse traceroute output: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub probes: u32,
    pub timeout: Duration,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            probes: 1,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Performs one full hop-by-hop trace and returns hops in TTL order.
pub trait PathTracer: Send + Sync {
    fn trace(&self, target: &str, max_hops: u32) -> Result<Vec<HopObservation>, TraceError>;
}

/// Path tracer backed by the platform `traceroute` binary.
#[derive(Debug, Clone, Default)]
pub struct SystemTracer {
    settings: TraceSettings,
}

impl SystemTracer {
    pub fn new(settings: TraceSettings) -> Self {
        Self { settings }
    }

    pub fn command_args(&self, target: &str, max_hops: u32) -> Vec<String> {
        let timeout_secs = ((self.settings.timeout.as_millis() as u64 + 999) / 1000).max(1);
        vec![
            "-n".to_string(),
            "-q".to_string(),
            self.settings.probes.to_string(),
            "-m".to_string(),
            max_hops.to_string(),
            "-w".to_string(),
            timeout_secs.to_string(),
            target.to_string(),
        ]
    }
}

impl PathTracer for SystemTracer {
    fn trace(&self, target: &str, max_hops: u32) -> Result<Vec<HopObservation>, TraceError> {
        let output = Command::new("traceroute")
            .args(self.command_args(target, max_hops))
            .output()
            .map_err(|source| TraceError::Spawn {
                target: target.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TraceError::Failed {
                target: target.to_string(),
                status: output.status.to_string(),
                output: format!("{}{}", stderr.trim(), stdout.trim()),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_traceroute_n(&text)?;
        debug!(
            host = %target,
            destination = ?parsed.target,
            hops = parsed.hops.len(),
            "trace finished"
        );
        Ok(parsed.hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_rounds_timeout_up_to_whole_seconds() {
        let tracer = SystemTracer::new(TraceSettings {
            probes: 1,
            timeout: Duration::from_millis(1200),
        });
        assert_eq!(
            tracer.command_args("1.1.1.1", 8),
            ["-n", "-q", "1", "-m", "8", "-w", "2", "1.1.1.1"]
        );
    }
}
