pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod types;

// Stage entry points, re-exported for callers that only need the core
pub use pipeline::processing::{dedup, normalize, summary};
pub use pipeline::{Pipeline, PipelineResult};
