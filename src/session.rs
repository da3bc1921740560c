use time::OffsetDateTime;

use crate::api::StartAuthResponse;
use crate::artifact::{self, ArtifactDecoder, ArtifactMetadata};
use crate::error::{IntegrityViolation, SessionError};
use crate::integrity;
use crate::keygen;
use crate::storage::{KeyValueStore, Slot, Storage, decode_bytes};
use crate::types::{Credentials, HandshakeCookie};

/// Length of the anti-forgery cookie issued by [`SessionManager::start_handshake`].
pub const HANDSHAKE_COOKIE_LEN: usize = 32;

const ARTIFACT_SLOTS: [Slot; 2] = [Slot::Artifact, Slot::ArtifactMetadata];

/// Bytes, metadata and decoded profile. Always replaced as a unit.
#[derive(Debug, Clone)]
struct LoadedArtifact<P> {
    bytes: Vec<u8>,
    metadata: ArtifactMetadata,
    profile: P,
}

/// Owner of the client session: auth handshake, credentials, loaded artifact.
///
/// Every mutating operation takes `&mut self`, so one manager can only run
/// one operation at a time. Share it behind an async mutex or an actor task
/// if several call sites need it.
///
/// ```rust,ignore
/// let mut session = SessionManager::new(MemoryStore::new(), SaveCodec);
///
/// let cookie = session.start_handshake().await?;
/// session.save_pending_state(start_response.state).await?;
/// // ... redirect, callback arrives ...
/// if let Some(cookie) = session.verify_and_consume(&callback.state).await? {
///     let creds = provider.redeem(cookie).await?;
///     session.commit_credentials(creds).await?;
/// }
/// ```
pub struct SessionManager<S, D: ArtifactDecoder> {
    storage: Storage<S>,
    decoder: D,
    pending_cookie: Option<HandshakeCookie>,
    pending_state: Option<String>,
    credentials: Option<Credentials>,
    artifact: Option<LoadedArtifact<D::Profile>>,
}

impl<S: KeyValueStore, D: ArtifactDecoder> SessionManager<S, D> {
    /// Create an empty session over `store`. Nothing is read until a
    /// `load_*`/`reload_*` call.
    #[must_use]
    pub fn new(store: S, decoder: D) -> Self {
        Self {
            storage: Storage::new(store),
            decoder,
            pending_cookie: None,
            pending_state: None,
            credentials: None,
            artifact: None,
        }
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &S {
        self.storage.inner()
    }

    /// Decoded profile of the loaded artifact.
    #[must_use]
    pub fn profile(&self) -> Option<&D::Profile> {
        self.artifact.as_ref().map(|a| &a.profile)
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&ArtifactMetadata> {
        self.artifact.as_ref().map(|a| &a.metadata)
    }

    #[must_use]
    pub fn artifact_bytes(&self) -> Option<&[u8]> {
        self.artifact.as_ref().map(|a| a.bytes.as_slice())
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// A handshake was started by this manager and not yet resolved.
    ///
    /// Only covers handshakes started in this process. A handshake persisted
    /// by an earlier manager is reported by
    /// [`handshake_in_storage`](Self::handshake_in_storage).
    #[must_use]
    pub fn has_pending_handshake(&self) -> bool {
        self.pending_cookie.is_some()
    }

    /// A handshake cookie and state are both persisted, whoever started them.
    /// Unreadable slots count as absent.
    pub async fn handshake_in_storage(&self) -> bool {
        let cookie = self.read_or_absent(Slot::AuthenticationCookie).await;
        let state = self.read_or_absent(Slot::AuthenticationState).await;
        cookie.is_some() && state.is_some()
    }

    /// State value saved for the pending handshake by this manager.
    #[must_use]
    pub fn pending_state(&self) -> Option<&str> {
        self.pending_state.as_deref()
    }

    // ── Handshake ──────────────────────────────────────────────────────

    /// Start an auth handshake. Returns the cookie to send to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the cookie cannot be persisted.
    pub async fn start_handshake(&mut self) -> Result<HandshakeCookie, SessionError> {
        let cookie = HandshakeCookie(keygen::generate_key(HANDSHAKE_COOKIE_LEN));
        self.storage
            .set(Slot::AuthenticationCookie, cookie.as_str())
            .await
            .map_err(|e| SessionError::store("handshake cookie write", e))?;
        self.pending_cookie = Some(cookie.clone());
        Ok(cookie)
    }

    /// Persist the state value the auth initiator handed back, replacing any
    /// earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the state cannot be persisted.
    pub async fn save_pending_state(&mut self, state: impl Into<String>) -> Result<(), SessionError> {
        let state = state.into();
        self.storage
            .set(Slot::AuthenticationState, state.as_str())
            .await
            .map_err(|e| SessionError::store("handshake state write", e))?;
        self.pending_state = Some(state);
        Ok(())
    }

    /// [`save_pending_state`](Self::save_pending_state) from a provider start response.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingState`] if the response has no state.
    pub async fn save_pending_state_from(
        &mut self,
        response: &StartAuthResponse,
    ) -> Result<(), SessionError> {
        let state = response.state.clone().ok_or(SessionError::MissingState)?;
        self.save_pending_state(state).await
    }

    /// Check a callback's state against the pending handshake.
    ///
    /// On a match both handshake slots are deleted and the cookie is returned,
    /// so a replayed callback finds nothing. On a mismatch the pending
    /// handshake is left in place for the genuine callback.
    ///
    /// The state slot is deleted first: once it is gone no callback can match,
    /// so a failure to delete the cookie afterwards is logged, not reported.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the state slot cannot be deleted.
    /// Nothing is consumed in that case. Unreadable slots count as absent.
    pub async fn verify_and_consume(
        &mut self,
        callback_state: &str,
    ) -> Result<Option<HandshakeCookie>, SessionError> {
        let cookie = self.read_or_absent(Slot::AuthenticationCookie).await;
        let expected_state = self.read_or_absent(Slot::AuthenticationState).await;

        let (Some(cookie), Some(expected_state)) = (cookie, expected_state) else {
            return Ok(None);
        };
        if expected_state != callback_state {
            tracing::warn!("Auth state mismatch");
            return Ok(None);
        }

        self.storage
            .remove(Slot::AuthenticationState)
            .await
            .map_err(|e| SessionError::store("handshake consume", e))?;
        if let Err(e) = self.storage.remove(Slot::AuthenticationCookie).await {
            tracing::warn!(error = %e, "Consumed handshake cookie left in storage");
        }
        self.pending_cookie = None;
        self.pending_state = None;
        Ok(Some(HandshakeCookie(cookie)))
    }

    // ── Credentials ────────────────────────────────────────────────────

    /// Persist redeemed credentials and make them current.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if they cannot be persisted; the
    /// in-memory credentials are then unchanged.
    pub async fn commit_credentials(&mut self, credentials: Credentials) -> Result<(), SessionError> {
        self.storage
            .set_json(Slot::Credentials, &credentials)
            .await
            .map_err(|e| SessionError::store("credentials write", e))?;
        self.credentials = Some(credentials);
        Ok(())
    }

    /// Restore credentials from storage. `Ok(false)` if none are stored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CorruptCredentials`] if the stored value does
    /// not parse. The slot is deleted and no credentials are kept in memory.
    pub async fn load_credentials(&mut self) -> Result<bool, SessionError> {
        let Some(raw) = self.read_or_absent(Slot::Credentials).await else {
            return Ok(false);
        };

        match serde_json::from_str::<Credentials>(&raw) {
            Ok(credentials) => {
                self.credentials = Some(credentials);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored credentials unreadable, discarding");
                self.credentials = None;
                self.storage.remove_all(&[Slot::Credentials]).await;
                Err(SessionError::CorruptCredentials(e))
            }
        }
    }

    // ── Artifact ───────────────────────────────────────────────────────

    /// Decode `bytes` and, on success, make them the loaded artifact.
    ///
    /// The kind is detected from the content. Nothing changes in memory
    /// unless decoding and persisting both succeed.
    ///
    /// # Errors
    ///
    /// - [`SessionError::ArtifactTooLarge`] if the size does not fit the metadata
    /// - [`SessionError::UnknownArtifact`] for unrecognised content
    /// - [`SessionError::Decode`] if the decoder rejects it
    /// - [`SessionError::Store`] if it cannot be persisted; the previously
    ///   loaded artifact is written back, or both slots are deleted if there
    ///   was none, so storage never pairs new bytes with old metadata
    pub async fn import_artifact(
        &mut self,
        bytes: Vec<u8>,
        source: impl Into<String>,
        last_modified: OffsetDateTime,
    ) -> Result<ArtifactMetadata, SessionError> {
        let metadata = ArtifactMetadata::describe(&bytes, source, last_modified)?;

        let profile = artifact::decode(&self.decoder, &bytes).inspect_err(|e| {
            tracing::warn!(error = %e, source = ?metadata.source, "Artifact import rejected");
        })?;

        if let Err(e) = self.persist_artifact(&bytes, &metadata).await {
            tracing::error!(error = %e, "Artifact could not be persisted");
            self.restore_persisted_artifact().await;
            return Err(e);
        }

        tracing::info!(
            size = metadata.size,
            sha256 = %metadata.sha256,
            "Artifact imported"
        );
        self.artifact = Some(LoadedArtifact {
            bytes,
            metadata: metadata.clone(),
            profile,
        });
        Ok(metadata)
    }

    /// Restore the persisted artifact. `Ok(None)` if nothing is stored.
    ///
    /// The stored bytes must match the stored size and digest before they are
    /// decoded. Any mismatch, unparsable metadata, or decode failure clears
    /// the whole session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Store`] if storage cannot be read (session untouched)
    /// - [`SessionError::Integrity`] on tampered or corrupt storage
    /// - [`SessionError::UnknownArtifact`] / [`SessionError::Decode`] if the
    ///   verified bytes no longer decode
    pub async fn reload_artifact(&mut self) -> Result<Option<ArtifactMetadata>, SessionError> {
        let encoded = self
            .storage
            .get(Slot::Artifact)
            .await
            .map_err(|e| SessionError::store("artifact read", e))?;
        let raw_metadata = self
            .storage
            .get(Slot::ArtifactMetadata)
            .await
            .map_err(|e| SessionError::store("artifact metadata read", e))?;
        let (Some(encoded), Some(raw_metadata)) = (encoded, raw_metadata) else {
            return Ok(None);
        };

        let verified = Self::verify_persisted(&encoded, &raw_metadata);
        let (bytes, metadata) = match verified {
            Ok(pair) => pair,
            Err(violation) => {
                tracing::error!(error = %violation, "Persisted artifact failed integrity check");
                self.clear_session().await;
                return Err(violation.into());
            }
        };

        let profile = match artifact::decode(&self.decoder, &bytes) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "Persisted artifact no longer decodes");
                self.clear_session().await;
                return Err(e);
            }
        };

        tracing::info!(size = metadata.size, "Artifact reloaded");
        self.artifact = Some(LoadedArtifact {
            bytes,
            metadata: metadata.clone(),
            profile,
        });
        Ok(Some(metadata))
    }

    /// Forget everything, in memory and in storage. Never fails; storage
    /// errors are logged.
    pub async fn clear_session(&mut self) {
        self.pending_cookie = None;
        self.pending_state = None;
        self.credentials = None;
        self.artifact = None;

        let failed = self.storage.remove_all(&Slot::ALL).await;
        if failed > 0 {
            tracing::warn!(failed, "Session cleared with slots left in storage");
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    async fn read_or_absent(&self, slot: Slot) -> Option<String> {
        self.storage.get(slot).await.unwrap_or_else(|e| {
            tracing::warn!(slot = %slot, error = %e, "Slot read failed, treating as absent");
            None
        })
    }

    /// Metadata goes first: a rejected metadata write leaves both slots as they were.
    async fn persist_artifact(
        &self,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
    ) -> Result<(), SessionError> {
        self.storage
            .set_json(Slot::ArtifactMetadata, metadata)
            .await
            .map_err(|e| SessionError::store("artifact metadata write", e))?;
        self.storage
            .set_bytes(Slot::Artifact, bytes)
            .await
            .map_err(|e| SessionError::store("artifact write", e))
    }

    /// Bring storage back in line with the in-memory artifact after a failed write.
    async fn restore_persisted_artifact(&self) {
        let Some(prior) = &self.artifact else {
            self.storage.remove_all(&ARTIFACT_SLOTS).await;
            return;
        };
        if let Err(e) = self
            .storage
            .set_json(Slot::ArtifactMetadata, &prior.metadata)
            .await
        {
            tracing::warn!(error = %e, "Previous artifact metadata not restored");
        }
        if let Err(e) = self.storage.set_bytes(Slot::Artifact, &prior.bytes).await {
            tracing::warn!(error = %e, "Previous artifact bytes not restored");
        }
    }

    fn verify_persisted(
        encoded: &str,
        raw_metadata: &str,
    ) -> Result<(Vec<u8>, ArtifactMetadata), IntegrityViolation> {
        let metadata: ArtifactMetadata =
            serde_json::from_str(raw_metadata).map_err(IntegrityViolation::MalformedMetadata)?;
        let bytes = decode_bytes(encoded).map_err(IntegrityViolation::MalformedEncoding)?;
        integrity::verify(&bytes, &metadata)?;
        Ok((bytes, metadata))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use time::macros::datetime;

    use super::*;
    use crate::artifact::testing::{ToyDecoder, ToyProfile, plain, wrapped};
    use crate::error::{BoxError, ErrorKind};
    use crate::storage::MemoryStore;
    use crate::types::{GamerProfile, Ticket};

    const MODIFIED: OffsetDateTime = datetime!(2025-06-01 10:00 UTC);

    fn manager(store: &MemoryStore) -> SessionManager<MemoryStore, ToyDecoder> {
        SessionManager::new(store.clone(), ToyDecoder)
    }

    fn credentials() -> Credentials {
        Credentials::new(
            GamerProfile::new("Dave", "2535400000000000"),
            Ticket::new("access", datetime!(2026-01-01 00:00 UTC)),
            Ticket::new("refresh", datetime!(2026-02-01 00:00 UTC)),
        )
    }

    /// Memory store whose writes or removals of one key fail while armed.
    #[derive(Clone)]
    struct Faulty {
        inner: MemoryStore,
        failing_key: &'static str,
        fail_removes: bool,
        armed: Arc<AtomicBool>,
    }

    impl Faulty {
        fn failing_writes(inner: &MemoryStore, failing_key: &'static str) -> Self {
            Self {
                inner: inner.clone(),
                failing_key,
                fail_removes: false,
                armed: Arc::new(AtomicBool::new(true)),
            }
        }

        fn failing_removes(inner: &MemoryStore, failing_key: &'static str) -> Self {
            Self {
                fail_removes: true,
                ..Self::failing_writes(inner, failing_key)
            }
        }

        fn disarm(&self) {
            self.armed.store(false, Ordering::SeqCst);
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }

        fn fails(&self, key: &str) -> bool {
            self.armed.load(Ordering::SeqCst) && key == self.failing_key
        }
    }

    impl KeyValueStore for Faulty {
        async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Option<String>) -> Result<(), BoxError> {
            if !self.fail_removes && self.fails(key) {
                return Err("quota exceeded".into());
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), BoxError> {
            if self.fail_removes && self.fails(key) {
                return Err("storage locked".into());
            }
            self.inner.remove(key).await
        }

        async fn clear(&self) -> Result<(), BoxError> {
            self.inner.clear().await
        }
    }

    /// Store that is entirely unavailable.
    struct Offline;

    impl KeyValueStore for Offline {
        async fn get(&self, _key: &str) -> Result<Option<String>, BoxError> {
            Err("storage offline".into())
        }

        async fn set(&self, _key: &str, _value: Option<String>) -> Result<(), BoxError> {
            Err("storage offline".into())
        }

        async fn remove(&self, _key: &str) -> Result<(), BoxError> {
            Err("storage offline".into())
        }

        async fn clear(&self) -> Result<(), BoxError> {
            Err("storage offline".into())
        }
    }

    // ── Handshake ──────────────────────────────────────────────────

    #[tokio::test]
    async fn handshake_round_trip_consumes_once() {
        let store = MemoryStore::new();
        let mut session = manager(&store);

        let cookie = session.start_handshake().await.unwrap();
        assert_eq!(cookie.as_str().len(), HANDSHAKE_COOKIE_LEN);
        assert!(session.has_pending_handshake());
        session.save_pending_state("state-1").await.unwrap();

        assert_eq!(session.pending_state(), Some("state-1"));

        let redeemed = session.verify_and_consume("state-1").await.unwrap();
        assert_eq!(redeemed, Some(cookie));
        assert!(!session.has_pending_handshake());
        assert_eq!(session.pending_state(), None);
        assert!(store.peek("AuthenticationCookie").is_none());
        assert!(store.peek("AuthenticationState").is_none());

        // replayed callback
        assert_eq!(session.verify_and_consume("state-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn handshake_mismatch_leaves_pending_intact() {
        let store = MemoryStore::new();
        let mut session = manager(&store);

        let cookie = session.start_handshake().await.unwrap();
        session.save_pending_state("expected").await.unwrap();

        assert_eq!(session.verify_and_consume("forged").await.unwrap(), None);
        assert_eq!(store.peek("AuthenticationCookie").as_deref(), Some(cookie.as_str()));
        assert_eq!(store.peek("AuthenticationState").as_deref(), Some("expected"));

        assert_eq!(
            session.verify_and_consume("expected").await.unwrap(),
            Some(cookie)
        );
    }

    #[tokio::test]
    async fn handshake_survives_reload_of_manager() {
        let store = MemoryStore::new();
        let cookie = {
            let mut first = manager(&store);
            let cookie = first.start_handshake().await.unwrap();
            first.save_pending_state("s").await.unwrap();
            cookie
        };

        // redirect came back into a fresh process
        let mut second = manager(&store);
        assert!(!second.has_pending_handshake());
        assert!(second.handshake_in_storage().await);
        assert_eq!(second.verify_and_consume("s").await.unwrap(), Some(cookie));
        assert!(!second.handshake_in_storage().await);
    }

    #[tokio::test]
    async fn consume_state_removal_failure_consumes_nothing() {
        let inner = MemoryStore::new();
        let store = Faulty::failing_removes(&inner, "AuthenticationState");
        let mut session = SessionManager::new(store, ToyDecoder);
        let cookie = session.start_handshake().await.unwrap();
        session.save_pending_state("s").await.unwrap();

        let err = session.verify_and_consume("s").await.unwrap_err();
        assert!(matches!(err, SessionError::Store { .. }));
        assert!(session.has_pending_handshake());
        assert_eq!(inner.peek("AuthenticationCookie").as_deref(), Some(cookie.as_str()));
        assert_eq!(inner.peek("AuthenticationState").as_deref(), Some("s"));

        // the callback can be retried once storage recovers
        session.store().disarm();
        assert_eq!(session.verify_and_consume("s").await.unwrap(), Some(cookie));
    }

    #[tokio::test]
    async fn consume_cookie_removal_failure_still_redeems_once() {
        let inner = MemoryStore::new();
        let store = Faulty::failing_removes(&inner, "AuthenticationCookie");
        let mut session = SessionManager::new(store, ToyDecoder);
        let cookie = session.start_handshake().await.unwrap();
        session.save_pending_state("s").await.unwrap();

        assert_eq!(session.verify_and_consume("s").await.unwrap(), Some(cookie));
        assert!(!session.has_pending_handshake());
        assert!(inner.peek("AuthenticationState").is_none());
        assert!(inner.peek("AuthenticationCookie").is_some());

        // state is gone, so a replay cannot match the leftover cookie
        assert_eq!(session.verify_and_consume("s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn verify_without_handshake_is_absent() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        assert_eq!(session.verify_and_consume("anything").await.unwrap(), None);

        // state without cookie
        session.save_pending_state("s").await.unwrap();
        assert_eq!(session.verify_and_consume("s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn verify_with_offline_store_is_absent() {
        let mut session = SessionManager::new(Offline, ToyDecoder);
        assert_eq!(session.verify_and_consume("s").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pending_state_is_overwritten() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        let cookie = session.start_handshake().await.unwrap();
        session.save_pending_state("old").await.unwrap();
        session.save_pending_state("new").await.unwrap();

        assert_eq!(session.verify_and_consume("old").await.unwrap(), None);
        assert_eq!(session.verify_and_consume("new").await.unwrap(), Some(cookie));
    }

    #[tokio::test]
    async fn pending_state_from_start_response() {
        let store = MemoryStore::new();
        let mut session = manager(&store);

        let resp: StartAuthResponse =
            serde_json::from_str(r#"{"loginUri":"https://login","state":"abc"}"#).unwrap();
        session.save_pending_state_from(&resp).await.unwrap();
        assert_eq!(store.peek("AuthenticationState").as_deref(), Some("abc"));

        let empty: StartAuthResponse = serde_json::from_str("{}").unwrap();
        let err = session.save_pending_state_from(&empty).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingState));
    }

    #[tokio::test]
    async fn start_handshake_fails_when_store_offline() {
        let mut session = SessionManager::new(Offline, ToyDecoder);
        let err = session.start_handshake().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(!session.has_pending_handshake());
    }

    // ── Credentials ────────────────────────────────────────────────

    #[tokio::test]
    async fn credentials_commit_and_load() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        session.commit_credentials(credentials()).await.unwrap();
        assert_eq!(session.credentials(), Some(&credentials()));

        let mut fresh = manager(&store);
        assert!(fresh.load_credentials().await.unwrap());
        assert_eq!(fresh.credentials(), Some(&credentials()));
    }

    #[tokio::test]
    async fn load_credentials_absent() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        assert!(!session.load_credentials().await.unwrap());
        assert!(session.credentials().is_none());
    }

    #[tokio::test]
    async fn load_credentials_corrupt_is_discarded() {
        let store = MemoryStore::new();
        store.poke("XboxLogin", r#"{"profile": 12"#);

        let mut session = manager(&store);
        let err = session.load_credentials().await.unwrap_err();
        assert!(matches!(err, SessionError::CorruptCredentials(_)));
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(session.credentials().is_none());
        assert!(store.peek("XboxLogin").is_none());
    }

    #[tokio::test]
    async fn load_credentials_offline_is_absent() {
        let mut session = SessionManager::new(Offline, ToyDecoder);
        assert!(!session.load_credentials().await.unwrap());
    }

    // ── Artifact import ────────────────────────────────────────────

    #[tokio::test]
    async fn import_sets_artifact_and_persists() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        let bytes = wrapped(b"WRPA", "band profile");

        let meta = session
            .import_artifact(bytes.clone(), "save.dat", MODIFIED)
            .await
            .unwrap();
        assert_eq!(meta.size as usize, bytes.len());
        assert_eq!(meta.sha256, integrity::sha256_hex(&bytes));
        assert_eq!(meta.last_modified, MODIFIED);
        assert_eq!(meta.source.as_deref(), Some("save.dat"));

        assert_eq!(
            session.profile(),
            Some(&ToyProfile {
                platform_b: false,
                body: "band profile".into()
            })
        );
        assert_eq!(session.artifact_bytes(), Some(bytes.as_slice()));
        assert_eq!(store.peek("LoadedSave"), Some(STANDARD.encode(&bytes)));
        assert!(store.peek("LoadedSaveMetadata").unwrap().contains("\"Sha256\""));
    }

    #[tokio::test]
    async fn import_unknown_keeps_prior_state() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        session
            .import_artifact(plain(b"PLNB", "first"), "a", MODIFIED)
            .await
            .unwrap();
        let persisted = store.peek("LoadedSave");

        let err = session
            .import_artifact(b"GARBAGE".to_vec(), "b", MODIFIED)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(session.profile().unwrap().body, "first");
        assert_eq!(session.metadata().unwrap().source.as_deref(), Some("a"));
        assert_eq!(store.peek("LoadedSave"), persisted);
    }

    #[tokio::test]
    async fn import_decode_failure_keeps_prior_state() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        session
            .import_artifact(plain(b"PLNA", "first"), "a", MODIFIED)
            .await
            .unwrap();

        let err = session
            .import_artifact(wrapped(b"WRPB", "corrupt body"), "b", MODIFIED)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
        assert_eq!(session.profile().unwrap().body, "first");
    }

    #[tokio::test]
    async fn import_persist_failure_leaves_memory_untouched() {
        let inner = MemoryStore::new();
        let store = Faulty::failing_writes(&inner, "LoadedSaveMetadata");
        let mut session = SessionManager::new(store, ToyDecoder);

        let err = session
            .import_artifact(plain(b"PLNA", "x"), "a", MODIFIED)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store { .. }));
        assert!(session.profile().is_none());
        assert!(session.metadata().is_none());
        assert!(inner.peek("LoadedSave").is_none());
        assert!(inner.peek("LoadedSaveMetadata").is_none());
    }

    #[tokio::test]
    async fn import_bytes_write_failure_removes_new_metadata() {
        let inner = MemoryStore::new();
        let store = Faulty::failing_writes(&inner, "LoadedSave");
        let mut session = SessionManager::new(store, ToyDecoder);

        let err = session
            .import_artifact(plain(b"PLNA", "x"), "a", MODIFIED)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store { .. }));
        assert!(session.profile().is_none());
        // metadata written before the failure was rolled back
        assert!(inner.peek("LoadedSaveMetadata").is_none());
        assert!(inner.is_empty());
    }

    async fn assert_prior_artifact_survives(failing_key: &'static str) {
        let inner = MemoryStore::new();
        let store = Faulty::failing_writes(&inner, failing_key);
        store.disarm();
        let mut session = SessionManager::new(store, ToyDecoder);
        let first = session
            .import_artifact(plain(b"PLNA", "first"), "a", MODIFIED)
            .await
            .unwrap();

        session.store().arm();
        let err = session
            .import_artifact(plain(b"PLNB", "second"), "b", MODIFIED)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store { .. }));
        assert_eq!(session.profile().unwrap().body, "first");
        assert_eq!(session.metadata(), Some(&first));

        let mut fresh = manager(&inner);
        let reloaded = fresh.reload_artifact().await.unwrap().unwrap();
        assert_eq!(reloaded, first);
        assert_eq!(
            fresh.profile(),
            Some(&ToyProfile {
                platform_b: false,
                body: "first".into(),
            })
        );
    }

    #[tokio::test]
    async fn import_metadata_write_failure_keeps_prior_artifact() {
        assert_prior_artifact_survives("LoadedSaveMetadata").await;
    }

    #[tokio::test]
    async fn import_bytes_write_failure_keeps_prior_artifact() {
        assert_prior_artifact_survives("LoadedSave").await;
    }

    // ── Artifact reload ────────────────────────────────────────────

    #[tokio::test]
    async fn reload_matches_import() {
        let store = MemoryStore::new();
        let imported = manager(&store)
            .import_artifact(wrapped(b"WRPB", "profile"), "cloud", MODIFIED)
            .await
            .unwrap();

        let mut session = manager(&store);
        let reloaded = session.reload_artifact().await.unwrap().unwrap();
        assert_eq!(reloaded.size, imported.size);
        assert_eq!(reloaded.sha256, imported.sha256);
        assert_eq!(reloaded, imported);
        assert!(session.profile().unwrap().platform_b);
    }

    #[tokio::test]
    async fn reload_nothing_persisted() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        assert_eq!(session.reload_artifact().await.unwrap(), None);

        // bytes without metadata
        store.poke("LoadedSave", STANDARD.encode(b"PLNAx"));
        assert_eq!(session.reload_artifact().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reload_detects_flipped_byte_and_clears() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        session.commit_credentials(credentials()).await.unwrap();
        session
            .import_artifact(plain(b"PLNA", "genuine"), "a", MODIFIED)
            .await
            .unwrap();

        let mut bytes = STANDARD.decode(store.peek("LoadedSave").unwrap()).unwrap();
        bytes[6] ^= 0x20;
        store.poke("LoadedSave", STANDARD.encode(&bytes));

        let err = session.reload_artifact().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Integrity(IntegrityViolation::DigestMismatch { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(session.profile().is_none());
        assert!(session.metadata().is_none());
        assert!(session.credentials().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reload_detects_truncation() {
        let store = MemoryStore::new();
        let mut session = manager(&store);
        session
            .import_artifact(plain(b"PLNA", "genuine"), "a", MODIFIED)
            .await
            .unwrap();
        store.poke("LoadedSave", STANDARD.encode(b"PLNA"));

        let err = session.reload_artifact().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Integrity(IntegrityViolation::SizeMismatch { .. })
        ));
        assert!(session.profile().is_none());
    }

    #[tokio::test]
    async fn reload_malformed_metadata_clears() {
        let store = MemoryStore::new();
        store.poke("LoadedSave", STANDARD.encode(b"PLNAx"));
        store.poke("LoadedSaveMetadata", "not json");
        store.poke("XboxLogin", "{}");

        let mut session = manager(&store);
        let err = session.reload_artifact().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Integrity(IntegrityViolation::MalformedMetadata(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reload_malformed_encoding_clears() {
        let store = MemoryStore::new();
        manager(&store)
            .import_artifact(plain(b"PLNA", "x"), "a", MODIFIED)
            .await
            .unwrap();
        store.poke("LoadedSave", "%%%");

        let err = manager(&store).reload_artifact().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Integrity(IntegrityViolation::MalformedEncoding(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reload_decode_failure_clears() {
        let store = MemoryStore::new();
        // consistent size and digest, but content the decoder rejects
        let bytes = plain(b"PLNA", "corrupt inside");
        let meta = ArtifactMetadata::describe(&bytes, "a", MODIFIED).unwrap();
        store.poke("LoadedSave", STANDARD.encode(&bytes));
        store.poke("LoadedSaveMetadata", serde_json::to_string(&meta).unwrap());

        let mut session = manager(&store);
        let err = session.reload_artifact().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(session.profile().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reload_unknown_kind_clears() {
        let store = MemoryStore::new();
        let bytes = b"????".to_vec();
        let meta = ArtifactMetadata::describe(&bytes, "a", MODIFIED).unwrap();
        store.poke("LoadedSave", STANDARD.encode(&bytes));
        store.poke("LoadedSaveMetadata", serde_json::to_string(&meta).unwrap());

        let err = manager(&store).reload_artifact().await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownArtifact(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reload_offline_is_transient_and_keeps_state() {
        let mut session = SessionManager::new(Offline, ToyDecoder);
        let err = session.reload_artifact().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    // ── Clear ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn clear_session_is_total_and_idempotent() {
        let store = MemoryStore::new();
        store.poke("unrelated", "kept");
        let mut session = manager(&store);
        session.start_handshake().await.unwrap();
        session.save_pending_state("s").await.unwrap();
        session.commit_credentials(credentials()).await.unwrap();
        session
            .import_artifact(plain(b"PLNA", "x"), "a", MODIFIED)
            .await
            .unwrap();

        session.clear_session().await;
        assert!(!session.has_pending_handshake());
        assert!(session.credentials().is_none());
        assert!(session.profile().is_none());
        assert_eq!(store.len(), 1);

        session.clear_session().await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clear_session_never_fails_offline() {
        let mut session = SessionManager::new(Offline, ToyDecoder);
        session.clear_session().await;
        assert!(session.profile().is_none());
    }
}
