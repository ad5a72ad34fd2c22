use crate::error::ProbeError;
use checknet_model::ProbeBudget;
use std::net::IpAddr;
use std::ops::ControlFlow;
use std::time::Duration;

/// Parameters for one probe cycle.
#[derive(Debug, Clone)]
pub struct EchoSettings {
    /// Replies to wait for. `Unbounded` runs until the timeout, or forever without one.
    pub budget: ProbeBudget,
    /// Deadline for the whole cycle.
    pub timeout: Option<Duration>,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    pub from: String,
    pub seq: Option<u32>,
    pub rtt: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EchoStatistics {
    pub packets_received: u32,
    pub max_rtt: Option<Duration>,
}

impl EchoStatistics {
    pub fn record(&mut self, reply: &EchoReply) {
        self.packets_received += 1;
        self.max_rtt = Some(self.max_rtt.map_or(reply.rtt, |max| max.max(reply.rtt)));
    }
}

/// Runs one blocking probe cycle against an already-resolved address.
///
/// `on_reply` is called for every reply as it arrives; returning `Break`
/// ends the cycle early. The statistics cover the whole cycle.
pub trait EchoProber: Send + Sync {
    fn run(
        &self,
        addr: IpAddr,
        settings: &EchoSettings,
        on_reply: &mut dyn FnMut(&EchoReply) -> ControlFlow<()>,
    ) -> Result<EchoStatistics, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_track_count_and_max() {
        let mut stats = EchoStatistics::default();
        for ms in [4, 9, 2] {
            stats.record(&EchoReply {
                from: "1.1.1.1".to_string(),
                seq: None,
                rtt: Duration::from_millis(ms),
            });
        }
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.max_rtt, Some(Duration::from_millis(9)));
    }
}
