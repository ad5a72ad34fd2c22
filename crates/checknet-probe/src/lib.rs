//! Per-target reachability probing.

pub mod echo;
pub mod error;
pub mod ping;
pub mod resolve;
pub mod task;

pub use echo::{EchoProber, EchoReply, EchoSettings, EchoStatistics};
pub use error::ProbeError;
pub use ping::{parse_reply_line, SystemPinger};
pub use resolve::{Resolver, SystemResolver};
pub use task::{ProbeSettings, ProbeTask};
