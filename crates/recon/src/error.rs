use std::fmt;

/// Fatal run errors. Any of these aborts before a single send or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// The row store could not be read (connect, auth, or parse failure).
    SourceUnavailable(String),
    /// One or more required header names are absent from the header row.
    MissingRequiredField { fields: Vec<String> },
    /// Another run on the same service instance has not finished yet.
    RunInProgress,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable(msg) => write!(f, "source unavailable: {msg}"),
            Self::MissingRequiredField { fields } => {
                write!(f, "missing required column(s): {}", fields.join(", "))
            }
            Self::RunInProgress => write!(f, "a reconciliation run is already in progress"),
        }
    }
}

impl std::error::Error for ReconError {}

/// Errors reported by a [`crate::RowStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Read failed; fatal when raised from `fetch_all`.
    Unavailable(String),
    /// A single cell write was refused. Recoverable per row.
    WriteRejected { range: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            Self::WriteRejected { range, reason } => {
                write!(f, "write to {range} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for ReconError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::SourceUnavailable(msg),
            other => Self::SourceUnavailable(other.to_string()),
        }
    }
}

/// A notification could not be delivered to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError(pub String);

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send failed: {}", self.0)
    }
}

impl std::error::Error for SendError {}
