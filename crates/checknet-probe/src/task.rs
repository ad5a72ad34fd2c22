use crate::echo::{EchoProber, EchoReply, EchoSettings};
use crate::resolve::Resolver;
use checknet_model::{Event, ProbeBudget, ProbeResult, Target, TargetState};
use chrono::Local;
use std::net::IpAddr;
use std::ops::ControlFlow;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub budget: ProbeBudget,
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

/// Probing loop for a single target.
///
/// The task owns its [`TargetState`] and only ever sends copies of it. It
/// stops when its budget is spent or when the event receiver is gone.
pub struct ProbeTask<R, P> {
    target: Target,
    settings: ProbeSettings,
    resolver: Arc<R>,
    prober: Arc<P>,
    events: Sender<Event>,
}

struct CycleOutcome {
    flow: ControlFlow<()>,
    charged: u32,
}

impl<R, P> ProbeTask<R, P>
where
    R: Resolver + 'static,
    P: EchoProber + 'static,
{
    pub fn new(
        target: Target,
        settings: ProbeSettings,
        resolver: Arc<R>,
        prober: Arc<P>,
        events: Sender<Event>,
    ) -> Self {
        Self {
            target,
            settings,
            resolver,
            prober,
            events,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    pub fn run(self) {
        let mut state = TargetState::new(Local::now());
        let mut budget = self.settings.budget;
        let mut known: Option<IpAddr> = None;
        info!(host = %self.target.address, %budget, "probe task started");

        while !budget.is_exhausted() {
            let outcome = match self.resolver.resolve(&self.target.address) {
                Ok(addr) => self.run_cycle(addr, budget, &mut known, &mut state),
                Err(err) => {
                    debug!(host = %self.target.address, error = %err, "resolution failed");
                    state.record_failure(Local::now());
                    let flow = self.emit(ProbeResult::failure(
                        &self.target,
                        format!("resolution failed: {err}"),
                        &state,
                    ));
                    if flow.is_continue() && !budget.consume(1).is_exhausted() {
                        thread::sleep(self.settings.interval);
                    }
                    CycleOutcome { flow, charged: 1 }
                }
            };

            budget = budget.consume(outcome.charged);
            if outcome.flow.is_break() {
                debug!(host = %self.target.address, "event receiver closed");
                return;
            }
        }

        info!(host = %self.target.address, "probe budget exhausted");
    }

    /// `known` is the last address this task saw, carried across cycles so a
    /// change between two cycles is reported like one within a cycle.
    fn run_cycle(
        &self,
        addr: IpAddr,
        budget: ProbeBudget,
        known: &mut Option<IpAddr>,
        state: &mut TargetState,
    ) -> CycleOutcome {
        if let Some(old) = known.filter(|old| *old != addr) {
            self.note_change(old, addr, state);
        }

        let echo = EchoSettings {
            budget,
            timeout: self.settings.timeout,
            interval: self.settings.interval,
        };
        let started = Instant::now();
        let mut current = addr;
        let mut flow = ControlFlow::Continue(());

        let outcome = self
            .prober
            .run(addr, &echo, &mut |reply: &EchoReply| {
                debug!(
                    host = %self.target.address,
                    from = %reply.from,
                    seq = ?reply.seq,
                    rtt = ?reply.rtt,
                    "echo reply"
                );
                state.record_reply(Local::now(), reply.rtt);
                if state.resolved_label.is_empty() {
                    state.resolved_label = current.to_string();
                }
                flow = self.emit(ProbeResult::success(&self.target, state));
                if flow.is_break() {
                    return flow;
                }
                self.recheck_address(&mut current, state);
                ControlFlow::Continue(())
            });
        *known = Some(current);

        let stats = match outcome {
            Ok(stats) => stats,
            Err(err) => {
                warn!(host = %self.target.address, error = %err, "echo cycle failed");
                state.record_failure(Local::now());
                let flow = self.emit(ProbeResult::failure(
                    &self.target,
                    format!("echo probe failed: {err}"),
                    state,
                ));
                if flow.is_continue() {
                    thread::sleep(self.settings.interval);
                }
                return CycleOutcome { flow, charged: 1 };
            }
        };

        let received = stats.packets_received;
        debug!(
            host = %self.target.address,
            received,
            max_rtt = ?stats.max_rtt,
            "echo cycle finished"
        );
        if flow.is_continue() && !budget.is_satisfied_by(received) {
            state.record_failure(Local::now());
            let waited = self.settings.timeout.unwrap_or_else(|| started.elapsed());
            flow = self.emit(ProbeResult::failure(
                &self.target,
                format!(
                    "Timeout after {:.1}s ({}/{})",
                    waited.as_secs_f64(),
                    received,
                    budget
                ),
                state,
            ));

            // A prober that gives up early must not turn the loop into a spin.
            if flow.is_continue() && received == 0 {
                thread::sleep(self.settings.interval.saturating_sub(started.elapsed()));
            }
        }

        CycleOutcome {
            flow,
            charged: received,
        }
    }

    /// Resolves the target again after a reply and annotates the label when
    /// the lookup fails or points somewhere new.
    fn recheck_address(&self, current: &mut IpAddr, state: &mut TargetState) {
        match self.resolver.resolve(&self.target.address) {
            Ok(fresh) if fresh != *current => {
                self.note_change(*current, fresh, state);
                *current = fresh;
            }
            Ok(_) => {}
            Err(err) => {
                state.resolved_label = format!("Cached IP: {current} - ERR: {err}");
            }
        }
    }

    fn note_change(&self, old: IpAddr, new: IpAddr, state: &mut TargetState) {
        info!(host = %self.target.address, %old, %new, "address changed");
        state.resolved_label = format!("Changed IP; {old} -> {new}");
    }

    fn emit(&self, result: ProbeResult) -> ControlFlow<()> {
        match self.events.send(Event::Probe(result)) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}
