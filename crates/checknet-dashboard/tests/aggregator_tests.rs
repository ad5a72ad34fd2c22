use checknet_dashboard::{run_bounded, run_dashboard, AggregatedView, Outcome, RenderOptions};
use checknet_model::{
    label_width, Event, HopObservation, ProbeBudget, ProbeResult, Target, TargetState,
};
use checknet_probe::{
    EchoProber, EchoReply, EchoSettings, EchoStatistics, ProbeError, ProbeSettings, ProbeTask,
    Resolver,
};
use chrono::Local;
use std::net::IpAddr;
use std::ops::ControlFlow;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CLEAR: &str = "\u{1b}[2J";

fn opts(targets: &[Target]) -> RenderOptions {
    RenderOptions {
        label_width: label_width(targets),
        interval: Duration::from_secs(5),
        max_hops: 10,
        color: false,
    }
}

fn success(target: &Target) -> Event {
    let mut state = TargetState::new(Local::now());
    state.record_reply(Local::now(), Duration::from_millis(2));
    state.resolved_label = target.address.clone();
    Event::Probe(ProbeResult::success(target, &state))
}

/// Resolves literal addresses only; anything else fails.
struct LiteralResolver;

impl Resolver for LiteralResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError> {
        host.parse()
            .map_err(|_| ProbeError::NoAddress(host.to_string()))
    }
}

/// Answers every requested packet immediately.
struct InstantProber;

impl EchoProber for InstantProber {
    fn run(
        &self,
        addr: IpAddr,
        settings: &EchoSettings,
        on_reply: &mut dyn FnMut(&EchoReply) -> ControlFlow<()>,
    ) -> Result<EchoStatistics, ProbeError> {
        let mut stats = EchoStatistics::default();
        for seq in 0..settings.budget.remaining().unwrap_or(1) {
            let reply = EchoReply {
                from: addr.to_string(),
                seq: Some(seq),
                rtt: Duration::from_millis(1),
            };
            stats.record(&reply);
            if on_reply(&reply).is_break() {
                break;
            }
        }
        Ok(stats)
    }
}

#[test]
fn bounded_stops_after_expected_results() {
    let targets = vec![Target::new("10.0.0.1", "A"), Target::new("10.0.0.2", "B")];
    let (tx, rx) = mpsc::channel();
    for target in targets.iter().cycle().take(5) {
        tx.send(success(target)).unwrap();
    }
    tx.send(Event::Hop(HopObservation {
        ttl: 1,
        address: "10.0.0.254".to_string(),
        elapsed: None,
    }))
    .unwrap();

    let mut out = Vec::new();
    let outcome = run_bounded(&rx, 4, &opts(&targets), &mut out).unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("A (10.0.0.1)"));
    assert!(lines[1].starts_with("B (10.0.0.2)"));
    assert_eq!(rx.try_iter().count(), 2);
}

#[test]
fn bounded_returns_on_cancel() {
    let targets = vec![Target::new("10.0.0.1", "A")];
    let (tx, rx) = mpsc::channel();
    tx.send(success(&targets[0])).unwrap();
    tx.send(Event::Cancelled).unwrap();
    tx.send(success(&targets[0])).unwrap();

    let mut out = Vec::new();
    let outcome = run_bounded(&rx, 3, &opts(&targets), &mut out).unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
}

#[test]
fn bounded_reports_disconnect() {
    let (tx, rx) = mpsc::channel::<Event>();
    drop(tx);
    let mut out = Vec::new();
    let outcome = run_bounded(&rx, 1, &opts(&[]), &mut out).unwrap();
    assert_eq!(outcome, Outcome::Disconnected);
    assert!(out.is_empty());
}

#[test]
fn dashboard_redraws_after_every_event() {
    let targets = vec![Target::new("10.0.0.2", "B"), Target::new("10.0.0.1", "A")];
    let mut view = AggregatedView::new(&targets, Local::now());
    let (tx, rx) = mpsc::channel();
    tx.send(success(&targets[0])).unwrap();
    tx.send(Event::Hop(HopObservation {
        ttl: 2,
        address: "10.9.9.2".to_string(),
        elapsed: Some(Duration::from_millis(3)),
    }))
    .unwrap();
    tx.send(Event::Hop(HopObservation {
        ttl: 1,
        address: "10.9.9.1".to_string(),
        elapsed: Some(Duration::from_millis(1)),
    }))
    .unwrap();
    tx.send(Event::Cancelled).unwrap();

    let mut out = Vec::new();
    let outcome = run_dashboard(&rx, &mut view, &opts(&targets), &mut out).unwrap();
    assert_eq!(outcome, Outcome::Cancelled);

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches(CLEAR).count(), 4);

    let last = text.rsplit(CLEAR).next().unwrap();
    let lines: Vec<&str> = last.lines().filter(|line| !line.is_empty()).collect();
    assert!(lines[0].contains("--- "));
    assert!(lines[1].starts_with("A (10.0.0.1)"));
    assert!(lines[1].contains("ERR: No reply yet; last online: never"));
    assert!(lines[2].starts_with("B (10.0.0.2)"));
    assert!(!lines[2].contains("ERR"));
    assert!(lines[3].starts_with("  1  10.9.9.1"));
    assert!(lines[4].starts_with("  2  10.9.9.2"));
}

#[test]
fn two_targets_one_probe_each_print_two_lines() {
    let targets = vec![
        Target::new("192.168.0.1", "Router"),
        Target::new("1.1.1.1", "DNS"),
    ];
    let (tx, rx) = mpsc::channel();
    let resolver = Arc::new(LiteralResolver);
    let prober = Arc::new(InstantProber);
    for target in &targets {
        ProbeTask::new(
            target.clone(),
            ProbeSettings {
                budget: ProbeBudget::Bounded(1),
                interval: Duration::from_secs(5),
                timeout: Some(Duration::from_secs(5)),
            },
            resolver.clone(),
            prober.clone(),
            tx.clone(),
        )
        .spawn();
    }

    let mut out = Vec::new();
    let outcome = run_bounded(&rx, targets.len(), &opts(&targets), &mut out).unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let text = String::from_utf8(out).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("DNS (1.1.1.1)"));
    assert!(lines[1].starts_with("Router (192.168.0.1)"));
}

#[test]
fn failing_target_keeps_error_line_with_never() {
    let targets = vec![Target::new("unreachable.invalid", "Down")];
    let mut view = AggregatedView::new(&targets, Local::now());
    let (tx, rx) = mpsc::channel();
    ProbeTask::new(
        targets[0].clone(),
        ProbeSettings {
            budget: ProbeBudget::Unbounded,
            interval: Duration::from_millis(10),
            timeout: None,
        },
        Arc::new(LiteralResolver),
        Arc::new(InstantProber),
        tx.clone(),
    )
    .spawn();

    let cancel = tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let _ = cancel.send(Event::Cancelled);
    });

    let mut out = Vec::new();
    let outcome = run_dashboard(&rx, &mut view, &opts(&targets), &mut out).unwrap();
    assert_eq!(outcome, Outcome::Cancelled);

    let text = String::from_utf8(out).unwrap();
    assert!(text.matches(CLEAR).count() >= 3);
    let last = text.rsplit(CLEAR).next().unwrap();
    assert!(last.contains("Down (unreachable.invalid)"));
    assert!(last.contains("ERR: resolution failed: no address found for unreachable.invalid"));
    assert!(last.contains("last online: never"));
}
