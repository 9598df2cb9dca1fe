pub mod directory;
pub mod esl;
pub mod http_upload;
pub mod sdat;

use std::fmt;

pub use directory::DirectorySource;
pub use esl::parse_esl;
pub use http_upload::UploadServer;
pub use sdat::{parse_sdat, SdatParser};

/// One uploaded or scanned file. The filename is only used for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Sdat,
    Esl,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Sdat => "sdat",
            FileKind::Esl => "esl",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Something that hands over a set of already-loaded files.
#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    async fn load(&self) -> Result<Vec<SourceFile>, SourceError>;
}

/// A recoverable problem found while reading one file.
///
/// None of these abort a batch; they are collected per file and reported.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseIssue {
    /// The file is not well-formed XML; nothing was extracted from it.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// An element the readings cannot be placed without is missing.
    #[error("missing required element {0}")]
    MissingRequiredAnchor(&'static str),
    /// A single value was unusable and has been skipped or defaulted.
    #[error("unparsable {field} {value:?} ({context})")]
    UnparsableField {
        field: &'static str,
        value: String,
        context: String,
    },
    #[error("timestamp out of range for sequence {sequence}")]
    TimestampOutOfRange { sequence: i64 },
}

/// A parser result together with the issues tolerated while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub issues: Vec<ParseIssue>,
}

impl<T> Parsed<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            issues: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
