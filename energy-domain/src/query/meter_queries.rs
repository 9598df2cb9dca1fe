use time::PrimitiveDateTime;

use crate::domain::{Measurement, MeterData, MeterModel};

/// Time-ordered load profile for a single meter over `[start, end)`.
///
/// An unknown meter yields an empty profile.
pub fn load_profile<'a>(
    model: &'a MeterModel,
    meter_id: &str,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Vec<&'a Measurement> {
    model
        .meter(meter_id)
        .map(|data| data.range(start, end).collect())
        .unwrap_or_default()
}

/// Copy of `model` holding only measurements in `[start, end)`. Meters with
/// nothing in the window are left out.
pub fn restrict_to_window(
    model: &MeterModel,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> MeterModel {
    let mut windowed = MeterModel::new();
    for meter_id in model.meter_ids() {
        windowed.extend(meter_id, load_profile(model, meter_id, start, end).into_iter().copied());
    }
    windowed
}

/// Energy consumed by one meter over `[start, end)`, summed from the interval
/// deltas rather than differencing absolute values.
pub fn total_relative_volume(
    data: &MeterData,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> f64 {
    data.range(start, end).map(Measurement::relative_volume).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample_model() -> MeterModel {
        let mut model = MeterModel::new();
        model.extend(
            "ID742",
            [
                Measurement::interval(datetime!(2024-01-01 00:00), 1.0),
                Measurement::interval(datetime!(2024-01-01 00:15), 2.0),
                Measurement::interval(datetime!(2024-01-01 00:30), 3.0),
                Measurement::interval(datetime!(2024-01-01 00:45), 4.0),
            ],
        );
        model
    }

    #[test]
    fn load_profile_window_is_half_open() {
        let model = sample_model();
        let profile = load_profile(
            &model,
            "ID742",
            datetime!(2024-01-01 00:15),
            datetime!(2024-01-01 00:45),
        );

        let ts: Vec<_> = profile.iter().map(|m| m.ts()).collect();
        assert_eq!(ts, vec![datetime!(2024-01-01 00:15), datetime!(2024-01-01 00:30)]);
    }

    #[test]
    fn load_profile_for_unknown_meter_is_empty() {
        let model = sample_model();
        let profile = load_profile(
            &model,
            "ID735",
            datetime!(2024-01-01 00:00),
            datetime!(2024-01-02 00:00),
        );
        assert!(profile.is_empty());
    }

    #[test]
    fn restricted_model_drops_meters_outside_the_window() {
        let mut model = sample_model();
        model.add("ID735", Measurement::interval(datetime!(2024-01-02 00:00), 9.0));

        let windowed = restrict_to_window(&model, datetime!(2024-01-01 00:30), datetime!(2024-01-01 01:00));
        assert_eq!(windowed.meter_ids().collect::<Vec<_>>(), vec!["ID742"]);
        assert_eq!(windowed.total_measurements(), 2);
        assert_eq!(
            windowed.meter("ID742").and_then(|d| d.first()).map(|m| m.ts()),
            Some(datetime!(2024-01-01 00:30))
        );
    }

    #[test]
    fn total_relative_volume_sums_deltas_in_window() {
        let model = sample_model();
        let data = model.meter("ID742").expect("meter present");
        let total = total_relative_volume(data, datetime!(2024-01-01 00:00), datetime!(2024-01-01 00:30));
        assert_eq!(total, 3.0);
    }
}
