//! Imported artifact: decoder seam, metadata, and decode dispatch.

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{BoxError, SessionError};
use crate::integrity::sha256_hex;
use crate::types::Sha256Digest;

/// Content kind reported by [`ArtifactDecoder::detect_type`].
///
/// Wrapped kinds must pass through [`ArtifactDecoder::unwrap`] before
/// structural parsing. Plain kinds are parsed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    WrappedA,
    WrappedB,
    PlainA,
    PlainB,
    Unknown,
}

impl ArtifactKind {
    #[must_use]
    pub fn is_wrapped(self) -> bool {
        matches!(self, Self::WrappedA | Self::WrappedB)
    }

    /// Platform flag threaded into [`ArtifactDecoder::parse`].
    #[must_use]
    pub fn is_platform_b(self) -> bool {
        matches!(self, Self::WrappedB | Self::PlainB)
    }
}

/// Domain-specific artifact decoding, supplied by the consumer.
///
/// # Example
///
/// ```rust,ignore
/// impl ArtifactDecoder for SaveCodec {
///     type Profile = RbProfile;
///
///     fn detect_type(&self, bytes: &[u8]) -> ArtifactKind {
///         save_detection::detect(bytes)
///     }
///
///     fn unwrap<'a>(&self, inner: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>, BoxError> {
///         Ok(Box::new(EncryptedReader::new(inner)?))
///     }
///
///     fn parse(&self, reader: &mut dyn Read, is_platform_b: bool) -> Result<RbProfile, BoxError> {
///         RbProfile::read(reader, is_platform_b)
///     }
/// }
/// ```
pub trait ArtifactDecoder: Send + Sync + 'static {
    /// Structured representation produced by [`parse`](Self::parse).
    type Profile: Clone + Send + Sync + 'static;

    /// Identify the content kind from the bytes themselves.
    fn detect_type(&self, bytes: &[u8]) -> ArtifactKind;

    /// Streaming transform that strips the outer layer of a wrapped artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapper header is invalid.
    fn unwrap<'a>(&self, inner: Box<dyn Read + 'a>) -> Result<Box<dyn Read + 'a>, BoxError>;

    /// Decode the structural content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed.
    fn parse(
        &self,
        reader: &mut dyn Read,
        is_platform_b: bool,
    ) -> Result<Self::Profile, BoxError>;
}

/// Integrity and provenance record stored next to the artifact bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ArtifactMetadata {
    /// Where the bytes came from (file name, cloud slot, ...).
    #[serde(rename = "Source", default)]
    pub source: Option<String>,
    #[serde(rename = "Size")]
    pub size: u32,
    #[serde(rename = "Sha256")]
    pub sha256: Sha256Digest,
    #[serde(rename = "LastModified", with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    #[serde(rename = "LoadedAt", with = "time::serde::rfc3339")]
    pub loaded_at: OffsetDateTime,
}

impl ArtifactMetadata {
    /// Describe `bytes` as loaded now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ArtifactTooLarge`] if the length does not fit in `u32`.
    pub fn describe(
        bytes: &[u8],
        source: impl Into<String>,
        last_modified: OffsetDateTime,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            source: Some(source.into()),
            size: checked_size(bytes.len())?,
            sha256: sha256_hex(bytes),
            last_modified,
            loaded_at: OffsetDateTime::now_utc(),
        })
    }
}

fn checked_size(len: usize) -> Result<u32, SessionError> {
    u32::try_from(len).map_err(|_| SessionError::ArtifactTooLarge { size: len })
}

/// Detect the kind of `bytes` and decode them with the matching path.
///
/// The kind always comes from the content. `Unknown` is reported as-is and
/// never retried as another kind.
pub(crate) fn decode<D: ArtifactDecoder>(
    decoder: &D,
    bytes: &[u8],
) -> Result<D::Profile, SessionError> {
    let kind = decoder.detect_type(bytes);
    match kind {
        ArtifactKind::WrappedA | ArtifactKind::WrappedB => {
            let mut reader = decoder
                .unwrap(Box::new(Cursor::new(bytes)))
                .map_err(SessionError::Decode)?;
            decoder
                .parse(&mut reader, kind.is_platform_b())
                .map_err(SessionError::Decode)
        }
        ArtifactKind::PlainA | ArtifactKind::PlainB => decoder
            .parse(&mut Cursor::new(bytes), kind.is_platform_b())
            .map_err(SessionError::Decode),
        ArtifactKind::Unknown => Err(SessionError::UnknownArtifact(kind)),
    }
}
