//! Shared data structures for checknet.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status text shown for a target before its probe task reports anything.
pub const NO_REPLY_YET: &str = "No reply yet";

/// A configured target as it appears in the target list file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    #[serde(rename = "Target", alias = "target")]
    pub address: String,
    #[serde(rename = "Hint", alias = "hint", default)]
    pub hint: String,
}

impl Target {
    pub fn new(address: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            hint: hint.into(),
        }
    }

    /// Display label, `"Hint (address)"` or the bare address.
    pub fn label(&self) -> String {
        if self.hint.is_empty() {
            self.address.clone()
        } else {
            format!("{} ({})", self.hint, self.address)
        }
    }
}

/// Gateway and public DNS, used when no target list is supplied.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("192.168.0.1", "Router"),
        Target::new("1.1.1.1", "DNS"),
    ]
}

/// Widest label across the list; computed once and handed to the renderer.
pub fn label_width(targets: &[Target]) -> usize {
    targets
        .iter()
        .map(|target| target.label().chars().count())
        .max()
        .unwrap_or(0)
}

/// Accepted shapes of a target list file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TargetList {
    Plain(Vec<Target>),
    Wrapped { ping_targets: Vec<Target> },
}

impl TargetList {
    pub fn into_targets(self) -> Vec<Target> {
        match self {
            TargetList::Plain(targets) => targets,
            TargetList::Wrapped { ping_targets } => ping_targets,
        }
    }
}

/// How many successful replies a probe task still expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBudget {
    Bounded(u32),
    Unbounded,
}

impl ProbeBudget {
    pub fn from_count(count: Option<u32>) -> Self {
        match count {
            Some(n) => ProbeBudget::Bounded(n),
            None => ProbeBudget::Unbounded,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, ProbeBudget::Bounded(0))
    }

    /// Budget left after `replies` more replies. Never goes below zero.
    pub fn consume(self, replies: u32) -> Self {
        match self {
            ProbeBudget::Bounded(n) => ProbeBudget::Bounded(n.saturating_sub(replies)),
            ProbeBudget::Unbounded => ProbeBudget::Unbounded,
        }
    }

    /// Whether a cycle that received `received` replies met its expectation.
    pub fn is_satisfied_by(&self, received: u32) -> bool {
        match self {
            ProbeBudget::Bounded(n) => received == *n,
            ProbeBudget::Unbounded => received > 0,
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self {
            ProbeBudget::Bounded(n) => Some(*n),
            ProbeBudget::Unbounded => None,
        }
    }
}

impl fmt::Display for ProbeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeBudget::Bounded(n) => write!(f, "{n}"),
            ProbeBudget::Unbounded => f.write_str("∞"),
        }
    }
}

/// Runtime state of one target, written only by its probe task.
///
/// `last_success_at` never moves backwards and never passes `last_update_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    pub resolved_label: String,
    pub last_round_trip: Option<Duration>,
    pub last_success_at: Option<DateTime<Local>>,
    pub last_update_at: DateTime<Local>,
}

impl TargetState {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            resolved_label: String::new(),
            last_round_trip: None,
            last_success_at: None,
            last_update_at: started_at,
        }
    }

    pub fn record_reply(&mut self, at: DateTime<Local>, round_trip: Duration) {
        self.last_update_at = self.last_update_at.max(at);
        self.last_success_at = Some(match self.last_success_at {
            Some(previous) => previous.max(at),
            None => at,
        });
        self.last_round_trip = Some(round_trip);
    }

    pub fn record_failure(&mut self, at: DateTime<Local>) {
        self.last_update_at = self.last_update_at.max(at);
    }

    /// True when the last update is more than one `interval` old at `now`.
    pub fn is_stale(&self, now: DateTime<Local>, interval: Duration) -> bool {
        now.signed_duration_since(self.last_update_at)
            .to_std()
            .map(|age| age > interval)
            .unwrap_or(false)
    }
}

/// Snapshot emitted by a probe task. `error` set means the probe failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub target: Target,
    pub error: Option<String>,
    pub state: TargetState,
}

impl ProbeResult {
    pub fn success(target: &Target, state: &TargetState) -> Self {
        Self {
            target: target.clone(),
            error: None,
            state: state.clone(),
        }
    }

    pub fn failure(target: &Target, message: impl Into<String>, state: &TargetState) -> Self {
        Self {
            target: target.clone(),
            error: Some(message.into()),
            state: state.clone(),
        }
    }

    pub fn placeholder(target: &Target, started_at: DateTime<Local>) -> Self {
        Self::failure(target, NO_REPLY_YET, &TargetState::new(started_at))
    }

    /// Identity the aggregator keys results by.
    pub fn key(&self) -> &str {
        &self.target.address
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One hop of the reference path. `address` is `*` for a silent hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopObservation {
    pub ttl: u32,
    pub address: String,
    pub elapsed: Option<Duration>,
}

/// Everything the aggregator consumes, merged onto one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Probe(ProbeResult),
    Hop(HopObservation),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn label_includes_hint_when_present() {
        assert_eq!(Target::new("1.1.1.1", "DNS").label(), "DNS (1.1.1.1)");
        assert_eq!(Target::new("1.1.1.1", "").label(), "1.1.1.1");
    }

    #[test]
    fn label_width_is_widest_label() {
        let targets = vec![Target::new("10.0.0.1", ""), Target::new("1.1.1.1", "DNS")];
        assert_eq!(label_width(&targets), "DNS (1.1.1.1)".len());
        assert_eq!(label_width(&[]), 0);
    }

    #[test]
    fn target_list_accepts_both_shapes() {
        let plain = r#"[{"Target": "192.168.0.1", "Hint": "Router"}, {"target": "8.8.8.8"}]"#;
        let targets = serde_json::from_str::<TargetList>(plain)
            .unwrap()
            .into_targets();
        assert_eq!(
            targets,
            vec![Target::new("192.168.0.1", "Router"), Target::new("8.8.8.8", "")]
        );

        let wrapped = r#"{"ping_targets": [{"Target": "1.1.1.1", "Hint": "DNS"}]}"#;
        let targets = serde_json::from_str::<TargetList>(wrapped)
            .unwrap()
            .into_targets();
        assert_eq!(targets, vec![Target::new("1.1.1.1", "DNS")]);
    }

    #[test]
    fn bounded_budget_saturates_at_zero() {
        let budget = ProbeBudget::Bounded(3);
        assert_eq!(budget.consume(2), ProbeBudget::Bounded(1));
        assert_eq!(budget.consume(5), ProbeBudget::Bounded(0));
        assert!(budget.consume(3).is_exhausted());
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn unbounded_budget_never_exhausts() {
        let budget = ProbeBudget::Unbounded;
        assert_eq!(budget.consume(1_000), ProbeBudget::Unbounded);
        assert!(!budget.is_exhausted());
        assert_eq!(budget.remaining(), None);
        assert_eq!(budget.to_string(), "∞");
    }

    #[test]
    fn satisfaction_depends_on_budget_kind() {
        assert!(ProbeBudget::Bounded(2).is_satisfied_by(2));
        assert!(!ProbeBudget::Bounded(2).is_satisfied_by(1));
        assert!(ProbeBudget::Unbounded.is_satisfied_by(1));
        assert!(!ProbeBudget::Unbounded.is_satisfied_by(0));
    }

    #[test]
    fn last_success_never_moves_backwards() {
        let mut state = TargetState::new(at(0));
        state.record_reply(at(10), Duration::from_millis(5));
        state.record_reply(at(4), Duration::from_millis(6));
        assert_eq!(state.last_success_at, Some(at(10)));
        assert_eq!(state.last_update_at, at(10));
        assert_eq!(state.last_round_trip, Some(Duration::from_millis(6)));

        state.record_failure(at(20));
        assert_eq!(state.last_success_at, Some(at(10)));
        assert!(state.last_update_at >= state.last_success_at.unwrap());
    }

    #[test]
    fn staleness_is_strictly_greater_than_interval() {
        let state = TargetState::new(at(0));
        let interval = Duration::from_secs(5);
        assert!(!state.is_stale(at(5), interval));
        assert!(state.is_stale(at(6), interval));
        assert!(!state.is_stale(at(-3), interval));
    }

    #[test]
    fn placeholder_reports_no_reply_yet() {
        let target = Target::new("1.1.1.1", "DNS");
        let result = ProbeResult::placeholder(&target, at(0));
        assert_eq!(result.key(), "1.1.1.1");
        assert_eq!(result.error.as_deref(), Some(NO_REPLY_YET));
        assert_eq!(result.state.last_success_at, None);
    }
}
