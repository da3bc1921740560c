use std::future::Future;

use crate::error::BoxError;

/// Consumer-provided string key/value persistence.
///
/// Calls from one caller must be applied in order. No ordering is assumed
/// across callers.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for LocalStorage {
///     async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
///         self.js.invoke("localStorage.getItem", key).await
///     }
///
///     async fn set(&self, key: &str, value: Option<String>) -> Result<(), BoxError> {
///         self.js.invoke_void("localStorage.setItem", (key, value)).await
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), BoxError> {
///         self.js.invoke_void("localStorage.removeItem", key).await
///     }
///
///     async fn clear(&self) -> Result<(), BoxError> {
///         self.js.invoke_void("localStorage.clear", ()).await
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value. `None` if the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, BoxError>> + Send;

    /// Write a value. Writing `None` behaves like [`remove`](Self::remove).
    fn set(
        &self,
        key: &str,
        value: Option<String>,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Delete a key. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Delete every key.
    fn clear(&self) -> impl Future<Output = Result<(), BoxError>> + Send;
}
