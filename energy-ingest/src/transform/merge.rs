use energy_domain::{Measurement, RegisterSnapshot};

use super::RegisterCodes;

/// Prefix-sum the relative volumes onto the snapshot seed.
///
/// The seed is the sum of both registers (a missing code counts as 0.0). The
/// result depends on the order of `readings`; it is walked strictly left to
/// right and never re-sorted.
pub fn merge_with_snapshot(
    readings: &[Measurement],
    snapshot: &RegisterSnapshot,
    codes: RegisterCodes,
) -> Vec<Measurement> {
    let seed = snapshot.value_or_zero(codes.first) + snapshot.value_or_zero(codes.second);
    if snapshot.get(codes.first).is_none() || snapshot.get(codes.second).is_none() {
        tracing::debug!(
            first_register = codes.first,
            second_register = codes.second,
            seed,
            "snapshot lacks a seed register, counting it as zero"
        );
    }

    let mut total = seed;
    readings
        .iter()
        .map(|m| {
            total += m.relative_volume();
            Measurement::interval(m.ts(), m.relative_volume()).with_absolute(total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::resolve_register_codes;
    use time::macros::datetime;

    fn readings(relatives: &[f64]) -> Vec<Measurement> {
        let start = datetime!(2024-01-01 00:00);
        relatives
            .iter()
            .enumerate()
            .map(|(i, v)| Measurement::interval(start + time::Duration::minutes(15 * i as i64), *v))
            .collect()
    }

    fn absolutes(merged: &[Measurement]) -> Vec<f64> {
        merged.iter().filter_map(Measurement::absolute_value).collect()
    }

    #[test]
    fn prefix_sum_from_zero_seed() {
        let snapshot = RegisterSnapshot::new();
        let merged = merge_with_snapshot(&readings(&[1.0, 2.0, 3.0]), &snapshot, resolve_register_codes(None));
        assert_eq!(absolutes(&merged), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn missing_codes_contribute_nothing() {
        let merged = merge_with_snapshot(
            &readings(&[5.0]),
            &RegisterSnapshot::new(),
            resolve_register_codes(Some("ID742")),
        );
        assert_eq!(absolutes(&merged), vec![5.0]);
    }

    #[test]
    fn seed_is_sum_of_both_registers() {
        let mut snapshot = RegisterSnapshot::new();
        snapshot.insert("1-1:2.8.1", 100.0);
        snapshot.insert("1-1:2.8.2", 50.0);
        snapshot.insert("1-1:1.8.1", 9999.0);

        let input = readings(&[0.5, 0.25]);
        let merged = merge_with_snapshot(&input, &snapshot, resolve_register_codes(Some("a_ID735")));

        assert_eq!(absolutes(&merged), vec![150.5, 150.75]);
        for (m, orig) in merged.iter().zip(&input) {
            assert_eq!(m.ts(), orig.ts());
            assert_eq!(m.relative_volume(), orig.relative_volume());
        }
    }

    #[test]
    fn order_of_readings_is_respected() {
        let mut input = readings(&[1.0, 10.0]);
        input.reverse();
        let merged = merge_with_snapshot(&input, &RegisterSnapshot::new(), resolve_register_codes(None));
        assert_eq!(absolutes(&merged), vec![10.0, 11.0]);
        assert_eq!(merged[0].ts(), datetime!(2024-01-01 00:15));
    }

    #[test]
    fn empty_readings_merge_to_empty() {
        let merged = merge_with_snapshot(&[], &RegisterSnapshot::new(), resolve_register_codes(None));
        assert!(merged.is_empty());
    }
}
