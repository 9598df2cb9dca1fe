pub mod batch;
pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod sinks;
pub mod sources;
pub mod transform;
pub mod xml;

pub use batch::{Batch, BatchError, BatchInput, BatchOptions, BatchOutcome};
