//! Core downloader implementation split into focused submodules.
//!
//! The `SubmissionDownloader` struct and its methods are organized by domain:
//! - [`processor`] - Per-submission pipeline (filter, resolve, fetch, dedup, write)
//! - [`run_loop`] - Iteration over submission sources, cooldowns and finalization

mod processor;
mod run_loop;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use processor::SubmissionProcessor;
pub use run_loop::SubmissionStream;

use crate::config::Config;
use crate::dedup::DedupIndex;
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, Fetcher};
use crate::filter::{DownloadFilter, FilterChain, ResourceFilter, UrlFilter};
use crate::formatter::{DefaultPathFormatter, PathFormatter};
use crate::resolver::{AuthContext, DirectResolver, ResourceResolver};
use crate::types::{Event, ProcessOutcome, Submission};
use processor::ProcessorParts;
use std::sync::Arc;

/// External collaborators plugged into the pipeline
///
/// Site resolution, path layout and content filtering are supplied by the
/// host application. [`Collaborators::defaults`] wires the built-in
/// implementations.
#[derive(Clone)]
pub struct Collaborators {
    /// Picks a downloader for each submission URL
    pub resolver: Arc<dyn ResourceResolver>,
    /// Maps resources to destination paths
    pub formatter: Arc<dyn PathFormatter>,
    /// URL-level content filter (last step of the filter chain)
    pub url_filter: Arc<dyn UrlFilter>,
    /// Resource-level content filter
    pub resource_filter: Arc<dyn ResourceFilter>,
    /// Credentials handed to downloaders
    pub auth: AuthContext,
}

impl Collaborators {
    /// [`DirectResolver`], [`DefaultPathFormatter`] and a [`DownloadFilter`] built from `config`
    pub fn defaults(config: &Config) -> Self {
        let content_filter = Arc::new(DownloadFilter::from_config(&config.filter));
        Self {
            resolver: Arc::new(DirectResolver),
            formatter: Arc::new(DefaultPathFormatter),
            url_filter: content_filter.clone(),
            resource_filter: content_filter,
            auth: AuthContext::default(),
        }
    }
}

/// Bulk downloader for one run over a set of submission sources
pub struct SubmissionDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing)
    pub(crate) config: Arc<Config>,
    /// Pipeline state, including the dedup index
    pub(crate) processor: SubmissionProcessor,
}

impl SubmissionDownloader {
    /// Create a downloader with the built-in collaborators
    ///
    /// See [`with_collaborators`](Self::with_collaborators).
    pub async fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::defaults(&config);
        Self::with_collaborators(config, collaborators).await
    }

    /// Create a downloader with host-supplied collaborators
    ///
    /// This:
    /// - Validates the configuration
    /// - Creates the download directory
    /// - Opens the dedup index (loading persisted hashes and scanning existing files as configured)
    /// - Builds the HTTP fetcher
    /// - Sets up the event broadcast channel
    pub async fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let index = DedupIndex::open(&config).await?;
        let fetcher = Fetcher::new(&config.fetch)?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            download_dir = %config.download_dir.display(),
            known_hashes = index.hash_count(),
            keep_hashes = config.dedup.keep_hashes,
            keep_hashes_db = config.dedup.keep_hashes_db,
            "Submission downloader initialized"
        );

        let processor = SubmissionProcessor::new(ProcessorParts {
            filters: FilterChain::new(config.filter.clone(), collaborators.url_filter),
            resolver: collaborators.resolver,
            formatter: collaborators.formatter,
            resource_filter: collaborators.resource_filter,
            auth: collaborators.auth,
            fetcher,
            fetch_options: FetchOptions::from(&config.fetch),
            dedup: config.dedup.clone(),
            download_dir: config.download_dir.clone(),
            index,
            event_tx: event_tx.clone(),
        });

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            processor,
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it will receive a
    /// `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use submission_dl::{Config, SubmissionDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = SubmissionDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "pipeline event");
    ///         }
    ///     });
    ///
    ///     let summary = downloader.run(Vec::new()).await?;
    ///     println!("{} files written", summary.files_written);
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Pipeline state for this run
    pub fn processor(&self) -> &SubmissionProcessor {
        &self.processor
    }

    /// Process a single submission outside of [`run`](Self::run)
    ///
    /// The hash index is only persisted by `run`.
    pub async fn process(&mut self, submission: &Submission) -> ProcessOutcome {
        self.processor.process(submission).await
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
