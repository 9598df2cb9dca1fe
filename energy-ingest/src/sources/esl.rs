use energy_domain::RegisterSnapshot;

use super::{ParseIssue, Parsed};
use crate::xml::{NameMatch, XmlDocument};

const VALUE_ROW: NameMatch<'static> = NameMatch::Local("ValueRow");

/// Read the register snapshot out of one ESL export.
///
/// Every `ValueRow` carrying both an `obis` and a `value` attribute
/// contributes one entry; a later row for the same code overwrites an earlier
/// one. Rows missing either attribute are skipped silently, rows with a
/// non-numeric value are skipped and reported. A document that is not
/// well-formed yields an empty snapshot.
pub fn parse_esl(bytes: &[u8]) -> Parsed<RegisterSnapshot> {
    let doc = match XmlDocument::parse(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            metrics::counter!("esl_malformed_documents_total").increment(1);
            return Parsed {
                value: RegisterSnapshot::new(),
                issues: vec![ParseIssue::MalformedDocument(e.to_string())],
            };
        }
    };

    let mut snapshot = RegisterSnapshot::new();
    let mut issues = Vec::new();

    for (i, row) in doc.elements_named(VALUE_ROW).enumerate() {
        let (Some(obis), Some(raw)) = (row.attribute("obis"), row.attribute("value")) else {
            continue;
        };
        if obis.is_empty() || raw.is_empty() {
            continue;
        }

        match raw.trim().parse::<f64>() {
            Ok(value) => {
                snapshot.insert(obis, value);
            }
            Err(_) => {
                metrics::counter!("esl_rows_skipped_total").increment(1);
                issues.push(ParseIssue::UnparsableField {
                    field: "value",
                    value: raw.to_string(),
                    context: format!("ValueRow {} ({obis})", i + 1),
                });
            }
        }
    }

    tracing::debug!(registers = snapshot.len(), skipped = issues.len(), "esl document parsed");
    Parsed {
        value: snapshot,
        issues,
    }
}
