//! Submission filtering
//!
//! [`FilterChain`] evaluates the cheap metadata checks that decide whether a
//! submission is worth resolving at all. [`UrlFilter`] and [`ResourceFilter`]
//! are the content-level seams, with [`DownloadFilter`] as the default
//! extension/domain based implementation of both.

use crate::config::{DELETED_AUTHOR, FilterConfig};
use crate::types::{Resource, SkipReason, Submission};
use std::sync::Arc;
use tracing::debug;

/// URL-level content filter, applied to the submission URL
pub trait UrlFilter: Send + Sync {
    /// Returns true if content at this URL may be downloaded
    fn check_url(&self, url: &str) -> bool;
}

/// Resource-level content filter, applied to each resolved resource
pub trait ResourceFilter: Send + Sync {
    /// Returns true if this resource may be downloaded
    fn check_resource(&self, resource: &Resource) -> bool;
}

/// Outcome of the filter chain
#[derive(Clone, Debug, PartialEq)]
pub enum FilterDecision {
    /// Continue with resolution
    Proceed,
    /// Stop; nothing is fetched for this submission
    Skip(SkipReason),
}

/// Ordered metadata checks over a submission
///
/// Checks run in a fixed order and stop at the first failure:
/// excluded id, skipped subreddit, ignored author, score bounds, ratio
/// bounds, URL filter, empty URL. Nothing here touches the network or disk.
pub struct FilterChain {
    config: FilterConfig,
    url_filter: Arc<dyn UrlFilter>,
}

impl FilterChain {
    /// Create a filter chain
    ///
    /// Case-insensitive name sets in `config` are normalized here.
    pub fn new(config: FilterConfig, url_filter: Arc<dyn UrlFilter>) -> Self {
        Self {
            config: config.normalized(),
            url_filter,
        }
    }

    /// Whether a downloader module is disabled (case-insensitive)
    pub fn is_module_disabled(&self, module: &str) -> bool {
        self.config.disable_module.contains(&module.to_lowercase())
    }

    /// Decide whether a submission should be processed
    pub fn should_process(&self, submission: &Submission) -> FilterDecision {
        match self.first_failure(submission) {
            Some(reason) => {
                debug!(submission_id = %submission.id, %reason, "Submission filtered");
                FilterDecision::Skip(reason)
            }
            None => FilterDecision::Proceed,
        }
    }

    fn first_failure(&self, s: &Submission) -> Option<SkipReason> {
        let c = &self.config;

        if c.exclude_id.contains(&s.id) {
            return Some(SkipReason::ExcludedId);
        }

        if c.skip_subreddit.contains(&s.subreddit.to_lowercase()) {
            return Some(SkipReason::SkippedSubreddit {
                subreddit: s.subreddit.clone(),
            });
        }

        let author_ignored = match &s.author {
            Some(name) => c.ignore_user.contains(name),
            None => c.ignore_user.contains(DELETED_AUTHOR),
        };
        if author_ignored {
            return Some(SkipReason::IgnoredAuthor {
                author: s.author.clone(),
            });
        }

        if let Some(min) = c.min_score
            && s.score < min
        {
            return Some(SkipReason::ScoreBelowMinimum { score: s.score, min });
        }

        if let Some(max) = c.max_score
            && s.score > max
        {
            return Some(SkipReason::ScoreAboveMaximum { score: s.score, max });
        }

        let below = c.min_score_ratio.is_some_and(|min| s.upvote_ratio < min);
        let above = c.max_score_ratio.is_some_and(|max| s.upvote_ratio > max);
        if below || above {
            return Some(SkipReason::RatioOutOfBounds {
                ratio: s.upvote_ratio,
            });
        }

        if !self.url_filter.check_url(&s.url) {
            return Some(SkipReason::UrlFiltered { url: s.url.clone() });
        }

        if s.url.trim().is_empty() {
            return Some(SkipReason::EmptyUrl);
        }

        None
    }
}

/// Extension and domain based content filter
///
/// Rejects URLs whose file extension is excluded or whose host is (or is a
/// subdomain of) an excluded domain. URLs that do not parse are accepted here
/// and left to the empty-URL check and the resolver.
#[derive(Clone, Debug, Default)]
pub struct DownloadFilter {
    excluded_extensions: Vec<String>,
    excluded_domains: Vec<String>,
}

impl DownloadFilter {
    /// Build a filter from explicit lists
    pub fn new(excluded_extensions: Vec<String>, excluded_domains: Vec<String>) -> Self {
        Self {
            excluded_extensions: excluded_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_domains: excluded_domains
                .into_iter()
                .map(|d| d.to_lowercase())
                .collect(),
        }
    }

    /// Build a filter from the filter configuration
    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.excluded_extensions.clone(),
            config.excluded_domains.clone(),
        )
    }

    fn extension_excluded(&self, extension: Option<String>) -> bool {
        extension.is_some_and(|ext| self.excluded_extensions.contains(&ext))
    }

    fn domain_excluded(&self, url: &str) -> bool {
        if self.excluded_domains.is_empty() {
            return false;
        }
        let Some(host) = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return false;
        };
        self.excluded_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

impl UrlFilter for DownloadFilter {
    fn check_url(&self, url: &str) -> bool {
        if self.domain_excluded(url) {
            debug!(url, "URL rejected by domain filter");
            return false;
        }
        if self.extension_excluded(Resource::new(url).file_extension()) {
            debug!(url, "URL rejected by extension filter");
            return false;
        }
        true
    }
}

impl ResourceFilter for DownloadFilter {
    fn check_resource(&self, resource: &Resource) -> bool {
        if self.domain_excluded(&resource.url) {
            debug!(url = %resource.url, "Resource rejected by domain filter");
            return false;
        }
        if self.extension_excluded(resource.file_extension()) {
            debug!(url = %resource.url, "Resource rejected by extension filter");
            return false;
        }
        true
    }
}
