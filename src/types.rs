use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Anti-forgery cookie issued when an authentication handshake starts.
///
/// Sent to the auth provider alongside the redirect and handed back by
/// [`SessionManager::verify_and_consume`](crate::SessionManager::verify_and_consume)
/// once the callback state checks out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct HandshakeCookie(pub String);

impl HandshakeCookie {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Upper-case hex SHA-256 digest, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Sha256Digest(pub String);

impl Sha256Digest {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Account profile returned by the auth provider on redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GamerProfile {
    #[serde(default)]
    pub gamertag: Option<String>,
    #[serde(default)]
    pub xuid: Option<String>,
    #[serde(default, rename = "picture")]
    pub picture_uri: Option<String>,
}

impl GamerProfile {
    #[must_use]
    pub fn new(gamertag: impl Into<String>, xuid: impl Into<String>) -> Self {
        Self {
            gamertag: Some(gamertag.into()),
            xuid: Some(xuid.into()),
            picture_uri: None,
        }
    }

    #[must_use]
    pub fn with_picture_uri(mut self, uri: impl Into<String>) -> Self {
        self.picture_uri = Some(uri.into());
        self
    }
}

/// Bearer ticket with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Ticket {
    #[serde(rename = "jwt")]
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}

impl Ticket {
    #[must_use]
    pub fn new(token: impl Into<String>, expiry: OffsetDateTime) -> Self {
        Self {
            token: token.into(),
            expiry,
        }
    }

    /// Whether the ticket is no longer usable at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry <= now
    }
}

/// Credentials committed after a successful handshake redemption.
///
/// Persisted as JSON under [`Slot::Credentials`](crate::storage::Slot::Credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Credentials {
    pub profile: GamerProfile,
    #[serde(rename = "access")]
    pub access_ticket: Ticket,
    #[serde(rename = "refresh")]
    pub refresh_ticket: Ticket,
}

impl Credentials {
    #[must_use]
    pub fn new(profile: GamerProfile, access_ticket: Ticket, refresh_ticket: Ticket) -> Self {
        Self {
            profile,
            access_ticket,
            refresh_ticket,
        }
    }

    /// The access ticket has lapsed but the refresh ticket can still renew it.
    #[must_use]
    pub fn needs_refresh_at(&self, now: OffsetDateTime) -> bool {
        self.access_ticket.is_expired_at(now) && !self.refresh_ticket.is_expired_at(now)
    }
}
