use checknet_model::{HopObservation, ProbeResult, Target};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// Latest result per target and latest observation per hop.
///
/// Both maps are last-write-wins. Iteration is ordered by target address and
/// by ascending TTL respectively.
#[derive(Debug, Clone, Default)]
pub struct AggregatedView {
    results: BTreeMap<String, ProbeResult>,
    hops: BTreeMap<u32, HopObservation>,
}

impl AggregatedView {
    /// Seeds every configured target with a "no reply yet" placeholder.
    pub fn new(targets: &[Target], started_at: DateTime<Local>) -> Self {
        let results = targets
            .iter()
            .map(|target| {
                (
                    target.address.clone(),
                    ProbeResult::placeholder(target, started_at),
                )
            })
            .collect();

        Self {
            results,
            hops: BTreeMap::new(),
        }
    }

    pub fn record_result(&mut self, result: ProbeResult) {
        self.results.insert(result.key().to_string(), result);
    }

    pub fn record_hop(&mut self, hop: HopObservation) {
        self.hops.insert(hop.ttl, hop);
    }

    pub fn results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.values()
    }

    pub fn hops(&self) -> impl Iterator<Item = &HopObservation> {
        self.hops.values()
    }

    pub fn result(&self, address: &str) -> Option<&ProbeResult> {
        self.results.get(address)
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }
}
