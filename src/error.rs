//! Error and warning types for folio-pdf.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for folio-pdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a generation request.
#[derive(Error, Debug)]
pub enum Error {
    /// The description is structurally invalid (geometry, colors, unknown kinds, missing fields).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The description is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error when reading the description or writing the output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The composed pages could not be turned into output bytes.
    #[error("Finalization error: {0}")]
    Finalization(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Category of a non-fatal problem encountered while composing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    DataSource,
    MergeRegion,
    AlignmentRegion,
    Image,
    Chart,
    Overlay,
    OffFrame,
    TocDrift,
    Font,
    HeadingKey,
}

/// A degraded-but-continued condition. Warnings never abort the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Warning {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// A content block could not be built; it is replaced by an inline marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementError {
    pub kind: WarningKind,
    pub message: String,
}

impl ElementError {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        ElementError {
            kind,
            message: message.into(),
        }
    }

    pub fn into_warning(self) -> Warning {
        Warning::new(self.kind, self.message)
    }
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_message() {
        let err = Error::config("content frame width is 0");
        assert_eq!(err.to_string(), "Configuration error: content frame width is 0");
    }

    #[test]
    fn warning_serializes_camel_case_kind() {
        let w = Warning::new(WarningKind::TocDrift, "heading moved");
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"kind":"tocDrift","message":"heading moved"}"#);
    }
}
