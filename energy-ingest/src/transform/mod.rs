//! Turning parsed interval readings into a cumulative register series.

mod merge;
mod register_codes;

pub use merge::merge_with_snapshot;
pub use register_codes::{resolve_register_codes, RegisterCodes};
