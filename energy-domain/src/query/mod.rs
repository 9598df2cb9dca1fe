mod meter_queries;

pub use meter_queries::{load_profile, restrict_to_window, total_relative_volume};
