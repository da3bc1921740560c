use std::future::Future;

use crate::error::BoxError;

/// Fetches static resources by path.
pub trait Transport: Send + Sync + 'static {
    /// Fetch the whole resource at `path`.
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use url::Url;

    use super::Transport;
    use crate::error::{BoxError, ConfigError};

    /// [`Transport`] resolving paths against a base URL over HTTP.
    ///
    /// ```rust,ignore
    /// let transport = HttpTransport::new("https://app.example.com/".parse()?);
    /// let catalog = CatalogLoader::new(transport);
    /// ```
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        base_url: Url,
        http: reqwest::Client,
    }

    impl HttpTransport {
        #[must_use]
        pub fn new(base_url: Url) -> Self {
            Self {
                base_url,
                http: reqwest::Client::new(),
            }
        }

        /// Create a transport from environment variables.
        ///
        /// # Required env vars
        /// - `PROFILE_VAULT_BASE_URL`: origin the app's static resources are served from
        ///
        /// # Errors
        ///
        /// Returns [`ConfigError`] if the variable is missing or not a URL.
        pub fn from_env() -> Result<Self, ConfigError> {
            let raw = std::env::var("PROFILE_VAULT_BASE_URL")
                .map_err(|_| ConfigError("PROFILE_VAULT_BASE_URL is required".into()))?;
            let base_url: Url = raw
                .parse()
                .map_err(|e| ConfigError(format!("PROFILE_VAULT_BASE_URL: {e}")))?;
            Ok(Self::new(base_url))
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        #[must_use]
        pub fn base_url(&self) -> &Url {
            &self.base_url
        }

        /// Absolute URL `path` resolves to.
        ///
        /// # Errors
        ///
        /// Returns an error if `path` cannot be joined onto the base URL.
        pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
            self.base_url.join(path)
        }

        /// Checks HTTP response status; errors name the URL and status.
        fn ensure_success(response: &reqwest::Response) -> Result<(), BoxError> {
            if response.status().is_success() {
                return Ok(());
            }
            Err(format!("GET {} returned {}", response.url(), response.status()).into())
        }
    }

    impl Transport for HttpTransport {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, BoxError> {
            let url = self.resolve(path)?;
            let response = self.http.get(url).send().await?;
            Self::ensure_success(&response)?;
            Ok(response.bytes().await?.to_vec())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn transport() -> HttpTransport {
            HttpTransport::new("https://app.example.com/static/".parse().unwrap())
        }

        #[test]
        fn resolves_relative_paths() {
            assert_eq!(
                transport().resolve("songCache.bin").unwrap().as_str(),
                "https://app.example.com/static/songCache.bin"
            );
            assert_eq!(
                transport().resolve("/songCache.bin").unwrap().as_str(),
                "https://app.example.com/songCache.bin"
            );
        }

        #[test]
        fn with_http_client_keeps_base() {
            let t = transport().with_http_client(reqwest::Client::new());
            assert_eq!(t.base_url().as_str(), "https://app.example.com/static/");
        }
    }
}
