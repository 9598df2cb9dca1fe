//! One processing batch: ESL snapshots plus SDAT files in, meter model out.
//!
//! A batch owns its `MeterModel` and `RegisterSnapshot`; nothing is shared
//! between batches, so concurrent batches only need their own `Batch::run`.

use energy_domain::{MeterModel, RegisterSnapshot};

use crate::sources::{parse_esl, FileKind, ParseIssue, SdatParser, SourceFile};
use crate::transform::{merge_with_snapshot, resolve_register_codes};

pub const DEFAULT_FALLBACK_METER_ID: &str = "unknown_sensor";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("no SDAT or ESL files provided")]
    NoInput,
    #[error("no measurements could be extracted from {files} file(s)")]
    NoData { files: usize },
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub namespace: String,
    pub default_resolution_minutes: i64,
    /// Meter id used for SDAT files without a usable DocumentID.
    pub fallback_meter_id: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            namespace: crate::sources::sdat::STROM_NAMESPACE.to_string(),
            default_resolution_minutes: crate::sources::sdat::DEFAULT_RESOLUTION_MINUTES,
            fallback_meter_id: DEFAULT_FALLBACK_METER_ID.to_string(),
        }
    }
}

/// Files of one batch. ESL files are applied in the given order, later
/// files overriding earlier ones register by register.
#[derive(Debug, Clone, Default)]
pub struct BatchInput {
    pub esl_files: Vec<SourceFile>,
    pub sdat_files: Vec<SourceFile>,
}

impl BatchInput {
    pub fn is_empty(&self) -> bool {
        self.esl_files.is_empty() && self.sdat_files.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.esl_files.len() + self.sdat_files.len()
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub filename: String,
    pub kind: FileKind,
    /// Meter the readings were filed under; `None` for ESL files.
    pub meter_id: Option<String>,
    /// Registers read (ESL) or readings merged (SDAT).
    pub records: usize,
    pub issues: Vec<ParseIssue>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub model: MeterModel,
    pub snapshot: RegisterSnapshot,
    pub files: Vec<FileReport>,
}

impl BatchOutcome {
    /// Fail with [`BatchError::NoData`] when no meter received a measurement.
    pub fn require_data(self) -> Result<Self, BatchError> {
        if self.model.is_empty() {
            Err(BatchError::NoData {
                files: self.files.len(),
            })
        } else {
            Ok(self)
        }
    }

    pub fn issue_count(&self) -> usize {
        self.files.iter().map(|f| f.issues.len()).sum()
    }
}

pub struct Batch {
    sdat: SdatParser,
    fallback_meter_id: String,
}

impl Batch {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            sdat: SdatParser::new(options.namespace)
                .with_default_resolution(options.default_resolution_minutes),
            fallback_meter_id: options.fallback_meter_id,
        }
    }

    pub fn run(&self, input: BatchInput) -> Result<BatchOutcome, BatchError> {
        if input.is_empty() {
            tracing::warn!("batch started without SDAT or ESL files");
            return Err(BatchError::NoInput);
        }

        let mut files = Vec::with_capacity(input.file_count());
        let snapshot = combine_snapshots(&input.esl_files, &mut files);
        if !input.esl_files.is_empty() {
            tracing::info!(
                files = input.esl_files.len(),
                registers = snapshot.len(),
                "esl snapshots combined"
            );
        }

        let mut model = MeterModel::new();
        for file in &input.sdat_files {
            let report = self.apply_sdat(file, &snapshot, &mut model);
            files.push(report);
        }

        let total = model.total_measurements();
        metrics::counter!("batch_measurements_total").increment(total as u64);
        tracing::info!(
            sdat_files = input.sdat_files.len(),
            meters = model.len(),
            measurements = total,
            "batch processed"
        );

        Ok(BatchOutcome {
            model,
            snapshot,
            files,
        })
    }

    fn apply_sdat(&self, file: &SourceFile, snapshot: &RegisterSnapshot, model: &mut MeterModel) -> FileReport {
        let parsed = self.sdat.parse(&file.bytes);
        metrics::counter!("sdat_files_parsed_total").increment(1);
        log_issues(file, FileKind::Sdat, &parsed.issues);

        let interval = parsed.value;
        let meter_id = match interval.document_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                tracing::warn!(
                    file = %file.filename,
                    fallback = %self.fallback_meter_id,
                    "sdat file has no DocumentID, using fallback meter id"
                );
                self.fallback_meter_id.clone()
            }
        };

        let codes = resolve_register_codes(Some(&meter_id));
        let merged = merge_with_snapshot(&interval.readings, snapshot, codes);
        let records = merged.len();
        model.extend(&meter_id, merged);

        tracing::info!(
            file = %file.filename,
            meter_id = %meter_id,
            readings = records,
            first_register = codes.first,
            second_register = codes.second,
            "sdat file merged"
        );

        FileReport {
            filename: file.filename.clone(),
            kind: FileKind::Sdat,
            meter_id: Some(meter_id),
            records,
            issues: parsed.issues,
        }
    }
}

/// Union the snapshots of all ESL files, later files winning.
pub fn combine_snapshots(esl_files: &[SourceFile], reports: &mut Vec<FileReport>) -> RegisterSnapshot {
    let mut combined = RegisterSnapshot::new();
    for file in esl_files {
        let parsed = parse_esl(&file.bytes);
        metrics::counter!("esl_files_parsed_total").increment(1);
        log_issues(file, FileKind::Esl, &parsed.issues);

        reports.push(FileReport {
            filename: file.filename.clone(),
            kind: FileKind::Esl,
            meter_id: None,
            records: parsed.value.len(),
            issues: parsed.issues,
        });
        combined.merge_from(parsed.value);
    }
    combined
}

fn log_issues(file: &SourceFile, kind: FileKind, issues: &[ParseIssue]) {
    for issue in issues {
        match issue {
            ParseIssue::MalformedDocument(_) | ParseIssue::MissingRequiredAnchor(_) => {
                tracing::error!(file = %file.filename, %kind, %issue, "file yielded no data")
            }
            _ => tracing::warn!(file = %file.filename, %kind, %issue, "value skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sdat(id: Option<&str>, volumes: &[f64]) -> Vec<u8> {
        let id = id
            .map(|id| format!("<rsm:DocumentID>{id}</rsm:DocumentID>"))
            .unwrap_or_default();
        let observations: String = volumes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                format!(
                    "<rsm:Observation><rsm:Position><rsm:Sequence>{}</rsm:Sequence></rsm:Position>\
                     <rsm:Volume>{v}</rsm:Volume></rsm:Observation>",
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<rsm:Doc xmlns:rsm="http://www.strom.ch">
<rsm:Header><rsm:InstanceDocument>{id}</rsm:InstanceDocument></rsm:Header>
<rsm:Data><rsm:Interval><rsm:StartDateTime>2024-01-01T00:00:00Z</rsm:StartDateTime></rsm:Interval>
<rsm:Resolution><rsm:Resolution>15</rsm:Resolution></rsm:Resolution>{observations}</rsm:Data></rsm:Doc>"#
        )
        .into_bytes()
    }

    fn esl(rows: &[(&str, &str)]) -> Vec<u8> {
        let rows: String = rows
            .iter()
            .map(|(obis, value)| format!(r#"<ValueRow obis="{obis}" value="{value}"/>"#))
            .collect();
        format!("<ESLBillingData><Meter><TimePeriod>{rows}</TimePeriod></Meter></ESLBillingData>").into_bytes()
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = Batch::new(BatchOptions::default()).run(BatchInput::default()).unwrap_err();
        assert_eq!(err, BatchError::NoInput);
    }

    #[test]
    fn later_esl_file_wins_across_files() {
        let input = BatchInput {
            esl_files: vec![
                SourceFile::new("a.xml", esl(&[("1-1:1.8.1", "10"), ("1-1:1.8.2", "20")])),
                SourceFile::new("b.xml", esl(&[("1-1:1.8.1", "100")])),
            ],
            sdat_files: vec![SourceFile::new("s.xml", sdat(Some("x_ID742"), &[1.0]))],
        };
        let outcome = Batch::new(BatchOptions::default()).run(input).expect("batch");

        assert_eq!(outcome.snapshot.get("1-1:1.8.1"), Some(100.0));
        let data = outcome.model.meter("x_ID742").expect("meter");
        assert_eq!(data.first().and_then(|m| m.absolute_value()), Some(121.0));
    }

    #[test]
    fn missing_document_id_uses_fallback_meter() {
        let input = BatchInput {
            esl_files: vec![],
            sdat_files: vec![SourceFile::new("anon.xml", sdat(None, &[2.0, 3.0]))],
        };
        let outcome = Batch::new(BatchOptions::default()).run(input).expect("batch");

        let data = outcome.model.meter(DEFAULT_FALLBACK_METER_ID).expect("fallback meter");
        assert_eq!(data.len(), 2);
        assert_eq!(outcome.files[0].meter_id.as_deref(), Some(DEFAULT_FALLBACK_METER_ID));
    }

    #[test]
    fn overlapping_files_for_one_meter_are_deduplicated() {
        let input = BatchInput {
            esl_files: vec![],
            sdat_files: vec![
                SourceFile::new("day1.xml", sdat(Some("m_ID735"), &[1.0, 1.0])),
                SourceFile::new("day1-corrected.xml", sdat(Some("m_ID735"), &[5.0])),
            ],
        };
        let outcome = Batch::new(BatchOptions::default()).run(input).expect("batch");

        let data = outcome.model.meter("m_ID735").expect("meter");
        assert_eq!(data.len(), 2);
        let first = data.get(datetime!(2024-01-01 00:00)).expect("first slot");
        assert_eq!(first.relative_volume(), 5.0);
        assert_eq!(first.absolute_value(), Some(5.0));
    }

    #[test]
    fn malformed_sdat_is_isolated_to_its_file() {
        let input = BatchInput {
            esl_files: vec![SourceFile::new("broken-esl.xml", b"<ESL>".to_vec())],
            sdat_files: vec![
                SourceFile::new("broken.xml", b"<rsm:Doc xmlns:rsm=\"http://www.strom.ch\">".to_vec()),
                SourceFile::new("good.xml", sdat(Some("ID742"), &[1.0])),
            ],
        };
        let outcome = Batch::new(BatchOptions::default()).run(input).expect("batch");

        assert_eq!(outcome.model.len(), 1);
        assert!(outcome.model.meter("ID742").is_some());
        assert_eq!(outcome.files.len(), 3);
        assert_eq!(outcome.issue_count(), 2);
        let broken = outcome.files.iter().find(|f| f.filename == "broken.xml").expect("report");
        assert_eq!(broken.records, 0);
        assert!(matches!(broken.issues.as_slice(), [ParseIssue::MalformedDocument(_)]));
    }

    #[test]
    fn esl_only_batch_has_no_data() {
        let input = BatchInput {
            esl_files: vec![SourceFile::new("a.xml", esl(&[("1-1:1.8.1", "10")]))],
            sdat_files: vec![],
        };
        let outcome = Batch::new(BatchOptions::default()).run(input).expect("batch");
        assert_eq!(outcome.snapshot.len(), 1);
        assert_eq!(outcome.require_data().unwrap_err(), BatchError::NoData { files: 1 });
    }
}
