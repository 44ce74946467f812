//! Shared HTTP context.
//!
//! One [`HttpClient`] is built at startup and handed to every component that
//! talks to the network; nothing reaches for a global session. The [`Fetch`]
//! trait is the seam the scrapers use, so tests can serve fixture HTML.

use crate::error::FetchError;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, instrument};

/// GET access to pages and binary resources.
pub trait Fetch {
    /// Fetch a page body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch a resource as raw bytes, with its own timeout.
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

/// A reqwest client carrying the relay's user agent and page timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    page_timeout: Duration,
}

impl HttpClient {
    /// Build the shared client.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - Sent on every request, including backend calls
    /// * `page_timeout` - Timeout for [`Fetch::get_text`]; image fetches pass their own
    ///
    /// # Returns
    ///
    /// The client, or the reqwest error if the TLS backend cannot be initialised.
    pub fn new(user_agent: &str, page_timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::from_builder(Client::builder().user_agent(user_agent), page_timeout)
    }

    /// A client for loopback test servers that ignores proxy settings.
    #[cfg(test)]
    pub fn loopback() -> Self {
        Self::from_builder(
            Client::builder().user_agent("haber_relay-test").no_proxy(),
            Duration::from_secs(5),
        )
        .expect("test client")
    }

    fn from_builder(builder: ClientBuilder, page_timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = builder
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            inner,
            page_timeout,
        })
    }

    /// The underlying client, for POSTs made by the generator and transports.
    pub fn client(&self) -> &Client {
        &self.inner
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        let http = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self
            .inner
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

impl Fetch for HttpClient {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self
            .get(url, self.page_timeout)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .get(url, timeout)
            .await?
            .bytes()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
        debug!(bytes = bytes.len(), "Fetched binary");
        Ok(bytes.to_vec())
    }
}
