/// Persisted keys owned by the session. The names are stable on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Pending handshake cookie.
    AuthenticationCookie,
    /// Pending handshake state from the auth initiator.
    AuthenticationState,
    /// JSON-encoded [`Credentials`](crate::Credentials).
    Credentials,
    /// Base64-encoded artifact bytes.
    Artifact,
    /// JSON-encoded [`ArtifactMetadata`](crate::ArtifactMetadata).
    ArtifactMetadata,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::AuthenticationCookie,
        Slot::AuthenticationState,
        Slot::Credentials,
        Slot::Artifact,
        Slot::ArtifactMetadata,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::AuthenticationCookie => "AuthenticationCookie",
            Self::AuthenticationState => "AuthenticationState",
            Self::Credentials => "XboxLogin",
            Self::Artifact => "LoadedSave",
            Self::ArtifactMetadata => "LoadedSaveMetadata",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
