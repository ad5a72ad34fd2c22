//! Reference path tracing.

pub mod parser;
pub mod runner;
pub mod task;

pub use parser::{parse_traceroute_n, ParsedTrace};
pub use runner::{PathTracer, SystemTracer, TraceError, TraceSettings};
pub use task::TraceTask;
