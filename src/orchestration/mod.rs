pub mod collector;
pub mod orchestrator;

pub use collector::{collect, Collected};
pub use orchestrator::{build_sources, report_formats, run, RunReport};
