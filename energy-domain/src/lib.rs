pub mod domain;
pub mod query;

pub use domain::{Measurement, MeterData, MeterModel, ParsedInterval, RegisterSnapshot};
