use time::PrimitiveDateTime;

/// A single interval reading.
///
/// `ts` is a naive local date-time; no timezone is attached anywhere in the
/// ingestion path. The relative volume is fixed at construction, the absolute
/// (cumulative register) value is filled in exactly once by the merge step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    ts: PrimitiveDateTime,
    relative_volume: f64,
    absolute_value: Option<f64>,
}

impl Measurement {
    /// A reading as it comes out of an interval file, absolute value unset.
    pub fn interval(ts: PrimitiveDateTime, relative_volume: f64) -> Self {
        Self {
            ts,
            relative_volume,
            absolute_value: None,
        }
    }

    /// Consume this reading and return it with the cumulative value assigned.
    ///
    /// Returns the reading unchanged when an absolute value is already present.
    pub fn with_absolute(self, absolute_value: f64) -> Self {
        if self.absolute_value.is_some() {
            return self;
        }
        Self {
            absolute_value: Some(absolute_value),
            ..self
        }
    }

    pub fn ts(&self) -> PrimitiveDateTime {
        self.ts
    }

    pub fn relative_volume(&self) -> f64 {
        self.relative_volume
    }

    pub fn absolute_value(&self) -> Option<f64> {
        self.absolute_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn interval_reading_starts_without_absolute() {
        let m = Measurement::interval(datetime!(2024-01-01 00:15), 0.25);
        assert_eq!(m.ts(), datetime!(2024-01-01 00:15));
        assert_eq!(m.relative_volume(), 0.25);
        assert!(m.absolute_value().is_none());
    }

    #[test]
    fn absolute_is_assigned_only_once() {
        let m = Measurement::interval(datetime!(2024-01-01 00:15), 0.25).with_absolute(10.25);
        assert_eq!(m.absolute_value(), Some(10.25));

        let again = m.with_absolute(99.0);
        assert_eq!(again.absolute_value(), Some(10.25));
        assert_eq!(again.relative_volume(), 0.25);
    }
}
