use crate::runner::TraceError;
use checknet_model::HopObservation;
use std::net::IpAddr;
use std::time::Duration;

/// Address shown for a hop that never answered.
pub const SILENT_HOP: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrace {
    pub target: Option<String>,
    pub hops: Vec<HopObservation>,
}

#[derive(Debug, Default)]
struct PendingHop {
    ttl: u32,
    address: Option<String>,
    rtts: Vec<Duration>,
}

impl PendingHop {
    fn absorb(&mut self, tokens: &[&str]) {
        let mut i = 0;
        while i < tokens.len() {
            let tok = tokens[i];
            if tok == "*" || tok.starts_with('!') {
                i += 1;
                continue;
            }

            if tok.parse::<IpAddr>().is_ok() {
                if self.address.is_none() {
                    self.address = Some(tok.to_string());
                }
                i += 1;
                continue;
            }

            match parse_rtt(tok, tokens.get(i + 1).copied()) {
                Some((rtt, consumed_next)) => {
                    self.rtts.push(rtt);
                    i += if consumed_next { 2 } else { 1 };
                }
                None => i += 1,
            }
        }
    }

    fn finish(self) -> HopObservation {
        HopObservation {
            ttl: self.ttl,
            address: self.address.unwrap_or_else(|| SILENT_HOP.to_string()),
            elapsed: self.rtts.into_iter().min(),
        }
    }
}

/// Parses `traceroute -n` output. Probe lines that continue a hop on the
/// next line are folded into that hop.
pub fn parse_traceroute_n(text: &str) -> Result<ParsedTrace, TraceError> {
    let mut target = None;
    let mut hops: Vec<PendingHop> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.to_ascii_lowercase().starts_with("traceroute") {
            if target.is_none() {
                target = parse_target(line);
            }
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let first = tokens[0];
        if first.chars().all(|c| c.is_ascii_digit()) {
            hops.push(parse_pending(&tokens)?);
        } else if first == "*" || first.parse::<IpAddr>().is_ok() {
            if let Some(hop) = hops.last_mut() {
                hop.absorb(&tokens);
            }
        }
    }

    Ok(ParsedTrace {
        target,
        hops: hops.into_iter().map(PendingHop::finish).collect(),
    })
}

fn parse_pending(tokens: &[&str]) -> Result<PendingHop, TraceError> {
    let first = tokens
        .first()
        .ok_or_else(|| TraceError::Parse("empty hop line".to_string()))?;
    let ttl = first
        .parse()
        .map_err(|_| TraceError::Parse(format!("invalid ttl token: {first}")))?;

    let mut hop = PendingHop {
        ttl,
        ..PendingHop::default()
    };
    hop.absorb(&tokens[1..]);
    Ok(hop)
}

fn parse_target(line: &str) -> Option<String> {
    let start = line.find('(')?;
    let end = line[start + 1..].find(')')?;
    let inside = line[start + 1..start + 1 + end].trim();
    (!inside.is_empty()).then(|| inside.to_string())
}

fn parse_rtt(token: &str, next: Option<&str>) -> Option<(Duration, bool)> {
    let millis = |value: f64| Duration::from_nanos((value * 1_000_000.0).round() as u64);

    if let Some(num) = token.strip_suffix("ms") {
        let value: f64 = num.parse().ok()?;
        return (value >= 0.0).then(|| (millis(value), false));
    }

    let value: f64 = token.parse().ok()?;
    match next {
        Some(unit) if unit.starts_with("ms") && value >= 0.0 => Some((millis(value), true)),
        _ => None,
    }
}
