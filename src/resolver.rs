//! Downloader resolution
//!
//! Mapping a submission URL to a site-specific extraction strategy lives
//! outside this crate. The pipeline only sees the two seams defined here:
//! a [`ResourceResolver`] that picks a [`Downloader`] for a URL, and the
//! downloader that lists the resources behind a submission.

use crate::error::{ExtractionError, ResolutionError};
use crate::types::{Resource, Submission};
use async_trait::async_trait;
use std::sync::Arc;

/// Credentials a downloader may need to talk to the platform or a host site
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    /// Bearer token for authenticated API calls, if any
    pub access_token: Option<String>,
}

/// A site-specific capability that enumerates downloadable resources
///
/// # Examples
///
/// ```
/// use submission_dl::resolver::{AuthContext, Downloader};
/// use submission_dl::error::ExtractionError;
/// use submission_dl::types::{Resource, Submission};
///
/// struct Gallery;
///
/// #[async_trait::async_trait]
/// impl Downloader for Gallery {
///     fn module_name(&self) -> &str {
///         "Gallery"
///     }
///
///     async fn find_resources(
///         &self,
///         submission: &Submission,
///         _auth: &AuthContext,
///     ) -> Result<Vec<Resource>, ExtractionError> {
///         Ok(vec![
///             Resource::new(format!("{}/1.jpg", submission.url)),
///             Resource::new(format!("{}/2.jpg", submission.url)),
///         ])
///     }
/// }
/// ```
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Module identifier, matched case-insensitively against the disabled-module set
    fn module_name(&self) -> &str;

    /// List the resources behind a submission
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionError`] when the site cannot be read or has
    /// nothing downloadable; the submission is then skipped.
    async fn find_resources(
        &self,
        submission: &Submission,
        auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError>;
}

/// Picks the downloader responsible for a submission URL
pub trait ResourceResolver: Send + Sync {
    /// Resolve a URL to a downloader
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when no strategy matches.
    fn resolve(&self, url: &str) -> Result<Arc<dyn Downloader>, ResolutionError>;
}

/// Downloader that treats the submission URL itself as the only resource
#[derive(Clone, Copy, Debug, Default)]
pub struct Direct;

#[async_trait]
impl Downloader for Direct {
    fn module_name(&self) -> &str {
        "Direct"
    }

    async fn find_resources(
        &self,
        submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        Ok(vec![Resource::new(submission.url.clone())])
    }
}

/// Resolver that hands every http(s) URL to [`Direct`]
///
/// Hosts with real site strategies put this last in their own resolver as a
/// fallback; tests use it on its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectResolver;

impl ResourceResolver for DirectResolver {
    fn resolve(&self, url: &str) -> Result<Arc<dyn Downloader>, ResolutionError> {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(Arc::new(Direct)),
            Ok(parsed) => Err(ResolutionError::new(
                url,
                format!("unsupported scheme {}", parsed.scheme()),
            )),
            Err(e) => Err(ResolutionError::new(url, e.to_string())),
        }
    }
}
