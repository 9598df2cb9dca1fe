use std::io::Write;

use energy_domain::MeterModel;
use serde::Serialize;

use super::{format_timestamp, MeterSink, SinkError};

const HEADER: [&str; 4] = ["meter_id", "timestamp", "relative", "absolute"];

#[derive(Serialize)]
struct CsvRow<'a> {
    meter_id: &'a str,
    timestamp: String,
    relative: f64,
    absolute: Option<f64>,
}

/// One row per measurement, meters and timestamps ascending. An unset
/// absolute value is written as an empty field.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        Self { writer }
    }
}

impl<W: Write> MeterSink for CsvSink<W> {
    fn write_model(&mut self, model: &MeterModel) -> Result<(), SinkError> {
        self.writer.write_record(HEADER)?;
        for data in model.meters() {
            for m in data.measurements() {
                self.writer.serialize(CsvRow {
                    meter_id: data.meter_id(),
                    timestamp: format_timestamp(m.ts())?,
                    relative: m.relative_volume(),
                    absolute: m.absolute_value(),
                })?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}
