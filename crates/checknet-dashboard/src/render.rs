use crate::view::AggregatedView;
use checknet_model::{HopObservation, ProbeResult};
use chrono::{DateTime, Local};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::time::Duration;

const STALE_MARK: &str = "[stale]";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Width of the label column, fixed once from the target list.
    pub label_width: usize,
    /// A line older than this is flagged stale.
    pub interval: Duration,
    pub max_hops: usize,
    pub color: bool,
}

/// `Mon DD HH:MM:SS.mmm` in local time.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%b %e %H:%M:%S%.3f").to_string()
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

pub fn format_result_line(result: &ProbeResult, opts: &RenderOptions, now: DateTime<Local>) -> String {
    let label = result.target.label();
    let width = opts.label_width;
    let state = &result.state;
    let updated = format_timestamp(state.last_update_at);

    let line = match &result.error {
        Some(err) => {
            let last_online = state
                .last_success_at
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string());
            format!("{label:<width$}\t ---.---ms {updated} (ERR: {err}; last online: {last_online})")
        }
        None => {
            let rtt = state.last_round_trip.map(millis).unwrap_or_default();
            format!("{label:<width$}\t{rtt:8.3}ms {updated} ({})", state.resolved_label)
        }
    };

    if !state.is_stale(now, opts.interval) {
        return line;
    }

    let flagged = format!("{line} {STALE_MARK}");
    if opts.color {
        flagged.yellow().to_string()
    } else {
        flagged
    }
}

pub fn format_hop_line(hop: &HopObservation) -> String {
    let elapsed = match hop.elapsed {
        Some(elapsed) => format!("{:8.3}ms", millis(elapsed)),
        None => format!("{:>10}", "*"),
    };
    format!("{:>3}  {:<15} {elapsed}", hop.ttl, hop.address)
}

/// Clears the screen and draws the banner, one line per target and up to
/// `max_hops` hop lines.
pub fn write_snapshot<W: Write>(
    out: &mut W,
    view: &AggregatedView,
    opts: &RenderOptions,
    now: DateTime<Local>,
) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(out, "--- {} ---", format_timestamp(now))?;
    writeln!(out)?;

    for result in view.results() {
        writeln!(out, "{}", format_result_line(result, opts, now))?;
    }

    if view.hop_count() > 0 && opts.max_hops > 0 {
        writeln!(out)?;
        for hop in view.hops().take(opts.max_hops) {
            writeln!(out, "{}", format_hop_line(hop))?;
        }
    }

    out.flush()
}
