//! Interval readings from SDAT (ebIX-style) metering documents.

use energy_domain::{Measurement, ParsedInterval};
use time::{format_description::FormatItem, macros::format_description, Duration, PrimitiveDateTime};

use super::{ParseIssue, Parsed};
use crate::xml::{NameMatch, Node, XmlDocument};

pub const STROM_NAMESPACE: &str = "http://www.strom.ch";
pub const DEFAULT_RESOLUTION_MINUTES: i64 = 15;

const LOCAL_DATE_TIME: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute][optional [:[second][optional [.[subsecond]]]]]"
);

/// Parse an ISO-8601 shaped local date-time.
///
/// A trailing `Z` or numeric offset is dropped, not applied: SDAT timestamps
/// are kept as naive local time.
pub fn parse_local_datetime(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
        .unwrap_or(trimmed);
    PrimitiveDateTime::parse(strip_offset(trimmed), LOCAL_DATE_TIME)
}

fn strip_offset(s: &str) -> &str {
    let Some(t) = s.find('T') else {
        return s;
    };
    match s[t..].find(|c: char| c == '+' || c == '-') {
        Some(p) => &s[..t + p],
        None => s,
    }
}

/// `start + (sequence - 1) * resolution`; `sequence` is 1-based.
pub fn observation_timestamp(
    start: PrimitiveDateTime,
    sequence: i64,
    resolution_minutes: i64,
) -> Option<PrimitiveDateTime> {
    let seconds = sequence
        .checked_sub(1)?
        .checked_mul(resolution_minutes)?
        .checked_mul(60)?;
    start.checked_add(Duration::seconds(seconds))
}

#[derive(Debug, Clone)]
pub struct SdatParser {
    namespace: String,
    default_resolution_minutes: i64,
}

impl Default for SdatParser {
    fn default() -> Self {
        Self::new(STROM_NAMESPACE)
    }
}

/// Parse with the standard namespace and defaults.
pub fn parse_sdat(bytes: &[u8]) -> Parsed<ParsedInterval> {
    SdatParser::default().parse(bytes)
}

impl SdatParser {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            default_resolution_minutes: DEFAULT_RESOLUTION_MINUTES,
        }
    }

    pub fn with_default_resolution(mut self, minutes: i64) -> Self {
        self.default_resolution_minutes = minutes;
        self
    }

    fn name<'a>(&'a self, local: &'a str) -> NameMatch<'a> {
        NameMatch::qualified(&self.namespace, local)
    }

    /// Extract the document id and the ordered interval readings.
    ///
    /// Never fails: a malformed document or a missing interval start yields an
    /// empty reading list, and single bad values are defaulted. Every such
    /// event is listed in the returned issues.
    pub fn parse(&self, bytes: &[u8]) -> Parsed<ParsedInterval> {
        let doc = match XmlDocument::parse(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                metrics::counter!("sdat_malformed_documents_total").increment(1);
                return Parsed {
                    value: ParsedInterval::empty(None),
                    issues: vec![ParseIssue::MalformedDocument(e.to_string())],
                };
            }
        };

        let mut issues = Vec::new();
        let document_id = self.document_id(&doc);
        match &document_id {
            Some(id) => tracing::debug!(document_id = %id, "sdat document id found"),
            None => tracing::debug!("sdat document has no DocumentID under InstanceDocument"),
        }

        let Some(start) = self.interval_start(&doc, &mut issues) else {
            issues.push(ParseIssue::MissingRequiredAnchor("Interval/StartDateTime"));
            metrics::counter!("sdat_parse_issues_total").increment(issues.len() as u64);
            return Parsed {
                value: ParsedInterval::empty(document_id),
                issues,
            };
        };

        let resolution = self.resolution_minutes(&doc, &mut issues);
        let readings = self.observations(&doc, start, resolution, &mut issues);

        tracing::debug!(
            readings = readings.len(),
            resolution_minutes = resolution,
            issues = issues.len(),
            "sdat document parsed"
        );
        if !issues.is_empty() {
            metrics::counter!("sdat_parse_issues_total").increment(issues.len() as u64);
        }

        Parsed {
            value: ParsedInterval::new(document_id, readings),
            issues,
        }
    }

    /// First `DocumentID` sitting directly under `InstanceDocument`.
    fn document_id(&self, doc: &XmlDocument) -> Option<String> {
        let wrapper = self.name("InstanceDocument");
        doc.elements_named(self.name("DocumentID"))
            .find(|n| n.parent().is_some_and(|p| p.is(wrapper)))
            .map(|n| n.text().trim().to_string())
    }

    /// First parsable `StartDateTime` whose parent is `Interval`.
    fn interval_start(&self, doc: &XmlDocument, issues: &mut Vec<ParseIssue>) -> Option<PrimitiveDateTime> {
        let interval = self.name("Interval");
        for node in doc
            .elements_named(self.name("StartDateTime"))
            .filter(|n| n.parent().is_some_and(|p| p.is(interval)))
        {
            let raw = node.text();
            match parse_local_datetime(&raw) {
                Ok(ts) => return Some(ts),
                Err(e) => issues.push(ParseIssue::UnparsableField {
                    field: "StartDateTime",
                    value: raw.trim().to_string(),
                    context: e.to_string(),
                }),
            }
        }
        None
    }

    /// `Resolution/Resolution` (or a bare `Resolution` value) in minutes.
    ///
    /// Any integer is taken as written, zero and negative steps included.
    fn resolution_minutes(&self, doc: &XmlDocument, issues: &mut Vec<ParseIssue>) -> i64 {
        let outer_name = self.name("Resolution");
        let Some(outer) = doc.first_named(outer_name) else {
            return self.default_resolution_minutes;
        };
        let value_node = match outer.first_descendant(outer_name) {
            Some(inner) => inner,
            None if outer.children().next().is_none() => outer,
            None => return self.default_resolution_minutes,
        };

        let raw = value_node.text();
        match raw.trim().parse::<i64>() {
            Ok(minutes) => minutes,
            Err(_) => {
                issues.push(ParseIssue::UnparsableField {
                    field: "Resolution",
                    value: raw.trim().to_string(),
                    context: format!("defaulting to {} minutes", self.default_resolution_minutes),
                });
                self.default_resolution_minutes
            }
        }
    }

    fn observations(
        &self,
        doc: &XmlDocument,
        start: PrimitiveDateTime,
        resolution: i64,
        issues: &mut Vec<ParseIssue>,
    ) -> Vec<Measurement> {
        let mut readings = Vec::new();

        for (i, obs) in doc.elements_named(self.name("Observation")).enumerate() {
            let position = i + 1;
            let volume = self.child_value(obs, "Volume", position, 0.0, issues);
            let sequence = self.child_value(obs, "Sequence", position, 0i64, issues);

            match observation_timestamp(start, sequence, resolution) {
                Some(ts) => readings.push(Measurement::interval(ts, volume)),
                None => issues.push(ParseIssue::TimestampOutOfRange { sequence }),
            }
        }

        readings
    }

    fn child_value<T: std::str::FromStr>(
        &self,
        obs: Node<'_>,
        local: &'static str,
        position: usize,
        default: T,
        issues: &mut Vec<ParseIssue>,
    ) -> T {
        let Some(node) = obs.first_descendant(self.name(local)) else {
            tracing::trace!(observation = position, field = local, "field missing, using default");
            return default;
        };
        let raw = node.text();
        match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                issues.push(ParseIssue::UnparsableField {
                    field: local,
                    value: raw.trim().to_string(),
                    context: format!("observation {position}"),
                });
                default
            }
        }
    }
}
