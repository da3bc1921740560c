use crate::artifact::ArtifactKind;
use crate::types::Sha256Digest;

/// Error type reported by pluggable backends (stores, decoders, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad failure class, for callers that branch on recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Storage or network unavailable. Nothing changed; retrying may help.
    Transient,
    /// Content is of a version or kind this crate does not handle.
    Format,
    /// Persisted data failed verification and was discarded.
    Integrity,
    /// The external decoder rejected the content.
    Decode,
}

/// Persisted artifact did not match its recorded metadata.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IntegrityViolation {
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u32, actual: u64 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("metadata invalid: {0}")]
    MalformedMetadata(#[source] serde_json::Error),

    #[error("artifact encoding invalid: {0}")]
    MalformedEncoding(#[source] base64::DecodeError),
}

/// Session manager errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Persistence adapter operation failed.
    #[error("Storage error during {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// Artifact content matched none of the recognised kinds.
    #[error("Artifact is of an unsupported type: {0:?}")]
    UnknownArtifact(ArtifactKind),

    /// Decoder failed on recognised content.
    #[error("Artifact decode failed: {0}")]
    Decode(#[source] BoxError),

    /// Persisted artifact failed the integrity gate; the session was cleared.
    #[error("Artifact integrity check failed: {0}")]
    Integrity(#[from] IntegrityViolation),

    /// Persisted credentials could not be parsed and were removed.
    #[error("Stored credentials invalid: {0}")]
    CorruptCredentials(#[source] serde_json::Error),

    /// Auth provider response carried no state value.
    #[error("Auth start response has no state")]
    MissingState,

    /// Artifact size does not fit the metadata's 32-bit size field.
    #[error("Artifact of {size} bytes is too large")]
    ArtifactTooLarge { size: usize },
}

impl SessionError {
    pub(crate) fn store(operation: &'static str, source: BoxError) -> Self {
        Self::Store { operation, source }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store { .. } => ErrorKind::Transient,
            Self::UnknownArtifact(_) | Self::MissingState | Self::ArtifactTooLarge { .. } => {
                ErrorKind::Format
            }
            Self::Integrity(_) | Self::CorruptCredentials(_) => ErrorKind::Integrity,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("Catalog fetch failed: {0}")]
    Transport(#[source] BoxError),

    #[error("Unsupported catalog version {0}")]
    UnsupportedVersion(i32),

    #[error("Catalog truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("Catalog string at offset {offset} is not UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("Negative {field} {value} at offset {offset}")]
    NegativeLength {
        field: &'static str,
        value: i32,
        offset: usize,
    },

    #[error("Duplicate song id {0}")]
    DuplicateId(i32),

    #[error("Duplicate shortname {0:?}")]
    DuplicateShortname(String),
}

impl CatalogError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transient,
            _ => ErrorKind::Format,
        }
    }

    /// A later `ensure_loaded` may succeed without the resource changing.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Missing or invalid configuration.
#[derive(Debug, thiserror::Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);
