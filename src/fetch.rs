//! Resource fetching
//!
//! [`Fetcher`] retrieves a resource's bytes over HTTP and hashes them in the
//! same step, so every dedup decision is content-addressed.

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{FetchError, Result};
use crate::retry::with_retry;
use crate::types::{ContentHash, FetchedResource, Resource};
use std::time::Duration;
use tracing::debug;

/// Per-fetch wait policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Total time that may be spent backing off between retries
    pub max_wait_time: Duration,
    /// Do not retry transient failures
    pub fail_fast: bool,
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_wait_time: config.max_wait_time,
            fail_fast: config.fail_fast,
        }
    }
}

/// HTTP fetcher for resources
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    /// Retry policy for one fetch under the given options
    fn retry_policy(&self, options: FetchOptions) -> RetryConfig {
        if options.fail_fast {
            RetryConfig {
                max_attempts: 0,
                ..self.retry.clone()
            }
        } else {
            RetryConfig {
                max_total_wait: Some(options.max_wait_time),
                ..self.retry.clone()
            }
        }
    }

    /// Fetch a resource's full content and hash it
    ///
    /// Transient failures are retried within `options.max_wait_time` unless
    /// `options.fail_fast` is set. Bytes are only returned once the whole
    /// body has been read.
    pub async fn fetch(
        &self,
        resource: &Resource,
        options: FetchOptions,
    ) -> std::result::Result<FetchedResource, FetchError> {
        let url = url::Url::parse(&resource.url).map_err(|e| FetchError::InvalidUrl {
            url: resource.url.clone(),
            reason: e.to_string(),
        })?;

        let policy = self.retry_policy(options);
        let content = with_retry(&policy, || self.fetch_once(url.clone())).await?;
        let hash = ContentHash::of(&content);
        debug!(url = %resource.url, bytes = content.len(), %hash, "Fetched resource");

        Ok(FetchedResource {
            resource: resource.clone(),
            content,
            hash,
        })
    }

    async fn fetch_once(&self, url: url::Url) -> std::result::Result<Vec<u8>, FetchError> {
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Body {
            url: url_str.clone(),
            reason: e.to_string(),
        })?;
        if body.is_empty() {
            return Err(FetchError::EmptyBody { url: url_str });
        }
        Ok(body.to_vec())
    }
}
