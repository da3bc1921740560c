#![doc = include_str!("../README.md")]

pub mod api;
pub mod artifact;
pub mod catalog;
pub mod error;
pub mod integrity;
pub mod keygen;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;

// Re-exports for convenient access
pub use api::{ErrorResponse, SavegameMetaResponse, StartAuthResponse};
pub use artifact::{ArtifactDecoder, ArtifactKind, ArtifactMetadata};
pub use catalog::{Catalog, CatalogEntry, CatalogLoader};
pub use error::{BoxError, CatalogError, ConfigError, ErrorKind, IntegrityViolation, SessionError};
pub use keygen::{generate_key, generate_key_with};
pub use session::{HANDSHAKE_COOKIE_LEN, SessionManager};
pub use storage::{KeyValueStore, MemoryStore, Slot, Storage};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::Transport;
pub use types::{Credentials, GamerProfile, HandshakeCookie, Sha256Digest, Ticket};
