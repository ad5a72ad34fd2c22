use crate::runner::PathTracer;
use checknet_model::Event;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Re-traces the path to one reference host every interval.
pub struct TraceTask<T> {
    host: String,
    max_hops: u32,
    interval: Duration,
    tracer: Arc<T>,
    events: Sender<Event>,
}

impl<T: PathTracer + 'static> TraceTask<T> {
    pub fn new(
        host: impl Into<String>,
        max_hops: u32,
        interval: Duration,
        tracer: Arc<T>,
        events: Sender<Event>,
    ) -> Self {
        Self {
            host: host.into(),
            max_hops,
            interval,
            tracer,
            events,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    /// Runs until a trace fails, comes back empty, or nobody is listening.
    pub fn run(self) {
        info!(host = %self.host, max_hops = self.max_hops, "trace task started");

        loop {
            let hops = match self.tracer.trace(&self.host, self.max_hops) {
                Ok(hops) if hops.is_empty() => {
                    error!(host = %self.host, "trace returned no hops; stopping trace task");
                    return;
                }
                Ok(hops) => hops,
                Err(err) => {
                    error!(host = %self.host, error = %err, "trace failed; stopping trace task");
                    return;
                }
            };

            debug!(host = %self.host, hops = hops.len(), "trace finished");
            for hop in hops {
                if self.events.send(Event::Hop(hop)).is_err() {
                    debug!(host = %self.host, "event receiver closed");
                    return;
                }
            }

            thread::sleep(self.interval);
        }
    }
}
