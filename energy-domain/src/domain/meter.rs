use std::collections::{btree_map, BTreeMap};

use time::PrimitiveDateTime;

use super::Measurement;

/// Time-sorted measurements of one meter, at most one per timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterData {
    meter_id: String,
    measurements: BTreeMap<PrimitiveDateTime, Measurement>,
}

impl MeterData {
    pub fn new(meter_id: impl Into<String>) -> Self {
        Self {
            meter_id: meter_id.into(),
            measurements: BTreeMap::new(),
        }
    }

    /// Insert by timestamp. A measurement already stored at the same timestamp
    /// is replaced and handed back.
    pub fn add(&mut self, measurement: Measurement) -> Option<Measurement> {
        self.measurements.insert(measurement.ts(), measurement)
    }

    pub fn meter_id(&self) -> &str {
        &self.meter_id
    }

    pub fn get(&self, ts: PrimitiveDateTime) -> Option<&Measurement> {
        self.measurements.get(&ts)
    }

    /// Measurements in ascending timestamp order.
    pub fn measurements(&self) -> impl DoubleEndedIterator<Item = &Measurement> + '_ {
        self.measurements.values()
    }

    /// Measurements with `start <= ts < end`, ascending.
    pub fn range(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> impl DoubleEndedIterator<Item = &Measurement> + '_ {
        // BTreeMap::range panics on an inverted range.
        let end = end.max(start);
        self.measurements.range(start..end).map(|(_, m)| m)
    }

    pub fn first(&self) -> Option<&Measurement> {
        self.measurements.values().next()
    }

    pub fn last(&self) -> Option<&Measurement> {
        self.measurements.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// All meters touched by one processing batch, keyed by meter/document id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterModel {
    meters: BTreeMap<String, MeterData>,
}

impl MeterModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a measurement to its meter, creating the meter on first use.
    pub fn add(&mut self, meter_id: &str, measurement: Measurement) -> Option<Measurement> {
        match self.meters.entry(meter_id.to_string()) {
            btree_map::Entry::Occupied(mut e) => e.get_mut().add(measurement),
            btree_map::Entry::Vacant(e) => e.insert(MeterData::new(meter_id)).add(measurement),
        }
    }

    pub fn extend<I>(&mut self, meter_id: &str, measurements: I)
    where
        I: IntoIterator<Item = Measurement>,
    {
        for m in measurements {
            self.add(meter_id, m);
        }
    }

    pub fn meter(&self, meter_id: &str) -> Option<&MeterData> {
        self.meters.get(meter_id)
    }

    /// Meters in ascending id order.
    pub fn meters(&self) -> impl Iterator<Item = &MeterData> + '_ {
        self.meters.values()
    }

    pub fn meter_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.meters.keys().map(String::as_str)
    }

    pub fn total_measurements(&self) -> usize {
        self.meters.values().map(MeterData::len).sum()
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn meter_data_replaces_same_timestamp() {
        let mut data = MeterData::new("ID735");
        let ts = datetime!(2024-01-01 00:00);

        assert!(data.add(Measurement::interval(ts, 1.0).with_absolute(1.0)).is_none());
        let replaced = data.add(Measurement::interval(ts, 2.0).with_absolute(2.0));

        assert_eq!(replaced.map(|m| m.relative_volume()), Some(1.0));
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(ts).map(|m| m.relative_volume()), Some(2.0));
    }

    #[test]
    fn meter_data_reads_back_in_timestamp_order() {
        let mut data = MeterData::new("ID742");
        data.add(Measurement::interval(datetime!(2024-01-01 00:30), 3.0));
        data.add(Measurement::interval(datetime!(2024-01-01 00:00), 1.0));
        data.add(Measurement::interval(datetime!(2024-01-01 00:15), 2.0));

        let order: Vec<f64> = data.measurements().map(|m| m.relative_volume()).collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
        assert_eq!(data.first().map(|m| m.ts()), Some(datetime!(2024-01-01 00:00)));
        assert_eq!(data.last().map(|m| m.ts()), Some(datetime!(2024-01-01 00:30)));
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut data = MeterData::new("m");
        data.add(Measurement::interval(datetime!(2024-01-01 00:00), 1.0));
        let hits = data.range(datetime!(2024-01-02 00:00), datetime!(2024-01-01 00:00));
        assert_eq!(hits.count(), 0);
    }

    #[test]
    fn model_creates_meters_lazily() {
        let mut model = MeterModel::new();
        assert!(model.is_empty());

        model.add("ID742", Measurement::interval(datetime!(2024-01-01 00:00), 1.0));
        model.add("ID735", Measurement::interval(datetime!(2024-01-01 00:00), 1.0));
        model.add("ID742", Measurement::interval(datetime!(2024-01-01 00:15), 1.0));

        assert_eq!(model.len(), 2);
        assert_eq!(model.meter("ID742").map(MeterData::len), Some(2));
        assert_eq!(model.total_measurements(), 3);
        assert_eq!(model.meter_ids().collect::<Vec<_>>(), vec!["ID735", "ID742"]);
        assert!(model.meter("ID999").is_none());
    }

    #[test]
    fn model_dedup_keeps_later_insert() {
        let mut model = MeterModel::new();
        let ts = datetime!(2024-03-01 12:00);
        model.add("m", Measurement::interval(ts, 1.0).with_absolute(100.0));
        model.add("m", Measurement::interval(ts, 4.0).with_absolute(400.0));

        let data = model.meter("m").expect("meter present");
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(ts).and_then(|m| m.absolute_value()), Some(400.0));
    }
}
