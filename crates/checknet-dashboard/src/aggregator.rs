use crate::render::{format_result_line, write_snapshot, RenderOptions};
use crate::view::AggregatedView;
use anyhow::{Context, Result};
use checknet_model::Event;
use chrono::Local;
use std::io::Write;
use std::sync::mpsc::Receiver;
use tracing::{debug, info};

/// Why an aggregation loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every expected result arrived.
    Completed,
    Cancelled,
    /// All producers went away.
    Disconnected,
}

/// Prints each probe result as it arrives until `expected` have been shown.
pub fn run_bounded<W: Write>(
    events: &Receiver<Event>,
    expected: usize,
    opts: &RenderOptions,
    out: &mut W,
) -> Result<Outcome> {
    let mut rendered = 0;

    while rendered < expected {
        let Ok(event) = events.recv() else {
            debug!(rendered, expected, "all producers gone");
            return Ok(Outcome::Disconnected);
        };

        match event {
            Event::Probe(result) => {
                writeln!(out, "{}", format_result_line(&result, opts, Local::now()))
                    .and_then(|()| out.flush())
                    .context("failed to write result line")?;
                rendered += 1;
            }
            Event::Hop(_) => {}
            Event::Cancelled => {
                info!(rendered, expected, "cancelled");
                return Ok(Outcome::Cancelled);
            }
        }
    }

    Ok(Outcome::Completed)
}

/// Folds every event into `view` and redraws the whole screen after each one.
pub fn run_dashboard<W: Write>(
    events: &Receiver<Event>,
    view: &mut AggregatedView,
    opts: &RenderOptions,
    out: &mut W,
) -> Result<Outcome> {
    write_snapshot(out, view, opts, Local::now()).context("failed to draw dashboard")?;

    loop {
        let Ok(event) = events.recv() else {
            debug!("all producers gone");
            return Ok(Outcome::Disconnected);
        };

        match event {
            Event::Probe(result) => view.record_result(result),
            Event::Hop(hop) => view.record_hop(hop),
            Event::Cancelled => {
                info!("cancelled");
                return Ok(Outcome::Cancelled);
            }
        }

        write_snapshot(out, view, opts, Local::now()).context("failed to draw dashboard")?;
    }
}
