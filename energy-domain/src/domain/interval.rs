use super::Measurement;

/// Outcome of reading one interval (SDAT) document.
///
/// `readings` keeps the order of the observations in the document; it is
/// expected to be chronological but nothing re-sorts it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInterval {
    pub document_id: Option<String>,
    pub readings: Vec<Measurement>,
}

impl ParsedInterval {
    pub fn new(document_id: Option<String>, readings: Vec<Measurement>) -> Self {
        Self {
            document_id,
            readings,
        }
    }

    /// The degenerate result used when a file has to be abandoned.
    pub fn empty(document_id: Option<String>) -> Self {
        Self::new(document_id, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
