use std::collections::HashMap;

/// Absolute register readings keyed by OBIS code.
///
/// Inserting an existing code overwrites it, both within one ESL document and
/// when several documents are unioned into one batch snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterSnapshot {
    values: HashMap<String, f64>,
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value for `code`, if any.
    pub fn insert(&mut self, code: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(code.into(), value)
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.values.get(code).copied()
    }

    /// Value for `code`, or 0.0 when the register is not present.
    pub fn value_or_zero(&self, code: &str) -> f64 {
        self.get(code).unwrap_or(0.0)
    }

    /// Apply every entry of `later` on top of `self`; `later` wins on conflicts.
    pub fn merge_from(&mut self, later: RegisterSnapshot) {
        self.values.extend(later.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for RegisterSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut snapshot = RegisterSnapshot::new();
        for (code, value) in iter {
            snapshot.insert(code, value);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_code_reads_as_zero() {
        let snapshot = RegisterSnapshot::new();
        assert_eq!(snapshot.get("1-1:1.8.1"), None);
        assert_eq!(snapshot.value_or_zero("1-1:1.8.1"), 0.0);
    }

    #[test]
    fn merge_from_lets_the_later_document_win() {
        let mut combined: RegisterSnapshot =
            [("1-1:1.8.1".to_string(), 1.0), ("1-1:1.8.2".to_string(), 2.0)]
                .into_iter()
                .collect();
        let later: RegisterSnapshot = [("1-1:1.8.1".to_string(), 5.0)].into_iter().collect();

        combined.merge_from(later);

        assert_eq!(combined.len(), 2);
        assert_eq!(combined.get("1-1:1.8.1"), Some(5.0));
        assert_eq!(combined.get("1-1:1.8.2"), Some(2.0));
    }
}
