//! Key/value persistence behind the session manager.
//!
//! The session never talks to a backend directly. It goes through
//! [`Storage`], which names every slot it touches ([`Slot`]) and handles the
//! string encodings the slots use (plain, JSON, base64).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use profile_vault::storage::{KeyValueStore, MemoryStore};
//!
//! // 1. Implement KeyValueStore for your backend, or use MemoryStore
//! let store = MemoryStore::new();
//!
//! // 2. Hand it to the session manager
//! let session = profile_vault::SessionManager::new(store, decoder);
//! ```

mod adapter;
mod memory;
mod slots;
mod traits;

pub use adapter::Storage;
pub(crate) use adapter::decode_bytes;
pub use memory::MemoryStore;
pub use slots::Slot;
pub use traits::KeyValueStore;
