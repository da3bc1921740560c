//! Auth-provider response bodies the session consumes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Reply to an auth start request: where to send the user, and the state to
/// hold until the callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct StartAuthResponse {
    #[serde(rename = "loginUri", default)]
    pub login_uri: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ErrorResponse {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} error {}: {}",
            self.source.as_deref().unwrap_or("provider"),
            self.code,
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

/// Remote save slot description, used as the `last_modified` input to an import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SavegameMetaResponse {
    #[serde(rename = "lastModified", with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub size: u32,
}
