pub mod csv;
pub mod json;

use std::{fmt, io, str::FromStr};

use energy_domain::MeterModel;
use serde::Deserialize;
use time::{format_description::FormatItem, macros::format_description, PrimitiveDateTime};

pub use self::csv::CsvSink;
pub use self::json::JsonSink;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const TIMESTAMP_FORMAT_FRACTIONAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Consumer of a finished batch.
pub trait MeterSink {
    fn write_model(&mut self, model: &MeterModel) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    #[default]
    Json,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv; charset=utf-8",
            OutputFormat::Json => "application/json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        })
    }
}

/// Render a model into an in-memory buffer.
pub fn render(model: &MeterModel, format: OutputFormat) -> Result<Vec<u8>, SinkError> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Csv => CsvSink::new(&mut out).write_model(model)?,
        OutputFormat::Json => JsonSink::new(&mut out).write_model(model)?,
    }
    Ok(out)
}

/// Whole seconds always; a fraction only when the timestamp carries one, with
/// trailing zeros dropped.
fn format_timestamp(ts: PrimitiveDateTime) -> Result<String, SinkError> {
    let format = if ts.nanosecond() == 0 {
        TIMESTAMP_FORMAT
    } else {
        TIMESTAMP_FORMAT_FRACTIONAL
    };
    Ok(ts.format(format)?)
}
