use std::time::Duration;

use reqwest::{Client, Url};

use crate::{StreamError, resolver::ChainInfoResolver};

/// Default total timeout for one lookup, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default maximum number of retry attempts.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);

/// Builder for a [`ChainInfoResolver`].
#[derive(Debug, Clone)]
pub struct ChainInfoResolverBuilder {
    endpoint: String,
    client: Option<Client>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
}

impl ChainInfoResolverBuilder {
    /// Resolves against the chain API at `endpoint`, e.g. `https://api.example.com`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }

    /// A resolver that gives up after the first failed call.
    #[must_use]
    pub fn fragile(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Reuse an existing HTTP client instead of creating one.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Build the resolver.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidEndpoint`] if the endpoint is not an absolute URL.
    pub fn build(self) -> Result<ChainInfoResolver, StreamError> {
        let base = self.endpoint.trim().trim_end_matches('/');
        let get_info = Url::parse(&format!("{base}/v1/chain/get_info"))
            .map_err(|e| StreamError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;

        debug!(
            url = %get_info,
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            "Building ChainInfoResolver"
        );

        Ok(ChainInfoResolver {
            client: self.client.unwrap_or_default(),
            get_info,
            call_timeout: self.call_timeout,
            max_retries: self.max_retries,
            min_delay: self.min_delay,
        })
    }
}
