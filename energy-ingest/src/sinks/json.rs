use std::io::Write;

use energy_domain::{MeterData, MeterModel};
use serde::Serialize;

use super::{format_timestamp, MeterSink, SinkError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeterModelBody<'a> {
    all_meter_data: Vec<MeterDataBody<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeterDataBody<'a> {
    sensor_id: &'a str,
    measurements: Vec<MeasurementBody>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeasurementBody {
    timestamp: String,
    relative_value: f64,
    absolute_value: Option<f64>,
}

impl<'a> MeterDataBody<'a> {
    fn from_data(data: &'a MeterData) -> Result<Self, SinkError> {
        let measurements = data
            .measurements()
            .map(|m| {
                Ok(MeasurementBody {
                    timestamp: format_timestamp(m.ts())?,
                    relative_value: m.relative_volume(),
                    absolute_value: m.absolute_value(),
                })
            })
            .collect::<Result<Vec<_>, SinkError>>()?;
        Ok(Self {
            sensor_id: data.meter_id(),
            measurements,
        })
    }
}

/// `{"allMeterData": [{"sensorId": .., "measurements": [..]}]}`
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> MeterSink for JsonSink<W> {
    fn write_model(&mut self, model: &MeterModel) -> Result<(), SinkError> {
        let body = MeterModelBody {
            all_meter_data: model
                .meters()
                .map(MeterDataBody::from_data)
                .collect::<Result<_, _>>()?,
        };
        serde_json::to_writer(&mut self.writer, &body)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_domain::Measurement;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn json_shape_matches_upload_response() {
        let mut model = MeterModel::new();
        model.add("x_ID735", Measurement::interval(datetime!(2019-03-10 23:00), 0.5).with_absolute(66990.1));

        let mut out = Vec::new();
        JsonSink::new(&mut out).write_model(&model).expect("write");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");

        assert_eq!(
            value,
            json!({
                "allMeterData": [{
                    "sensorId": "x_ID735",
                    "measurements": [{
                        "timestamp": "2019-03-10T23:00:00",
                        "relativeValue": 0.5,
                        "absoluteValue": 66990.1
                    }]
                }]
            })
        );
    }

    #[test]
    fn unset_absolute_is_null() {
        let mut model = MeterModel::new();
        model.add("m", Measurement::interval(datetime!(2019-03-10 23:00), 0.5));

        let mut out = Vec::new();
        JsonSink::new(&mut out).write_model(&model).expect("write");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert!(value["allMeterData"][0]["measurements"][0]["absoluteValue"].is_null());
    }
}
