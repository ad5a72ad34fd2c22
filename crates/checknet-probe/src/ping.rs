use crate::echo::{EchoProber, EchoReply, EchoSettings, EchoStatistics};
use crate::error::ProbeError;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::ops::ControlFlow;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

/// Echo prober backed by the platform `ping` binary in numeric mode.
#[derive(Debug, Clone)]
pub struct SystemPinger {
    program: String,
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
        }
    }
}

impl SystemPinger {
    pub fn command_args(addr: IpAddr, settings: &EchoSettings) -> Vec<String> {
        let mut args = vec!["-n".to_string()];

        if let Some(count) = settings.budget.remaining() {
            args.push("-c".to_string());
            args.push(count.to_string());
        }

        args.push("-i".to_string());
        args.push(format!("{:.3}", settings.interval.as_secs_f64()));

        if let Some(timeout) = settings.timeout {
            args.push("-w".to_string());
            args.push(deadline_secs(timeout).to_string());
        }

        args.push(addr.to_string());
        args
    }
}

impl EchoProber for SystemPinger {
    fn run(
        &self,
        addr: IpAddr,
        settings: &EchoSettings,
        on_reply: &mut dyn FnMut(&EchoReply) -> ControlFlow<()>,
    ) -> Result<EchoStatistics, ProbeError> {
        let args = Self::command_args(addr, settings);
        debug!(program = %self.program, ?args, "starting echo cycle");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(ProbeError::MissingOutput("ping"))?;

        let mut stats = EchoStatistics::default();
        let mut read_error = None;
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            };
            let Some(reply) = parse_reply_line(&line) else {
                continue;
            };
            stats.record(&reply);
            if on_reply(&reply).is_break() {
                let _ = child.kill();
                break;
            }
        }

        if read_error.is_some() {
            let _ = child.kill();
        }
        // ping exits non-zero when replies are missing; the statistics say the same.
        let _ = child.wait();

        match read_error {
            Some(err) => Err(ProbeError::Io(err)),
            None => Ok(stats),
        }
    }
}

fn deadline_secs(timeout: Duration) -> u64 {
    let millis = timeout.as_millis() as u64;
    ((millis + 999) / 1000).max(1)
}

/// Parses one reply line of `ping -n` output, e.g.
/// `64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=12.3 ms`.
pub fn parse_reply_line(line: &str) -> Option<EchoReply> {
    let (_, rest) = line.trim().split_once(" from ")?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    let mut from = tokens.first()?.trim_end_matches(':');
    if let Some(inner) = tokens.get(1).and_then(|tok| tok.strip_prefix('(')) {
        from = inner.trim_end_matches(':').trim_end_matches(')');
    }

    let mut seq = None;
    let mut rtt = None;
    for (i, tok) in tokens.iter().enumerate() {
        if let Some(value) = tok
            .strip_prefix("icmp_seq=")
            .or_else(|| tok.strip_prefix("seq="))
        {
            seq = value.parse().ok();
        } else if let Some(value) = tok
            .strip_prefix("time=")
            .or_else(|| tok.strip_prefix("time<"))
        {
            rtt = parse_rtt(value, tokens.get(i + 1).copied());
        }
    }

    Some(EchoReply {
        from: from.to_string(),
        seq,
        rtt: rtt?,
    })
}

fn parse_rtt(value: &str, next: Option<&str>) -> Option<Duration> {
    let (number, unit) = match value.strip_suffix("ms") {
        Some(number) => (number, "ms"),
        None => (value, next.unwrap_or("ms")),
    };

    let amount: f64 = number.parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }

    let nanos = match unit {
        "ms" => amount * 1_000_000.0,
        "us" | "µs" => amount * 1_000.0,
        "s" => amount * 1_000_000_000.0,
        _ => return None,
    };
    Some(Duration::from_nanos(nanos.round() as u64))
}
