mod interval;
mod measurement;
mod meter;
mod snapshot;

pub use interval::ParsedInterval;
pub use measurement::Measurement;
pub use meter::{MeterData, MeterModel};
pub use snapshot::RegisterSnapshot;
