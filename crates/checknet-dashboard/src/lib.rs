//! Aggregation and rendering of probe and trace events.

pub mod aggregator;
pub mod render;
pub mod view;

pub use aggregator::{run_bounded, run_dashboard, Outcome};
pub use render::{
    format_hop_line, format_result_line, format_timestamp, write_snapshot, RenderOptions,
};
pub use view::AggregatedView;
