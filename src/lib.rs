//! # submission-dl
//!
//! Bulk downloader core for content linked from platform submissions.
//!
//! ## Design Philosophy
//!
//! submission-dl is designed to be:
//! - **Policy-driven** - Ordered filters decide what is worth fetching before any I/O happens
//! - **Content-addressed** - Every resource is hashed; duplicates are skipped, hardlinked or rewritten
//! - **Library-first** - Site resolution, path layout and submission listing are pluggable traits
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use submission_dl::{Config, Submission, SubmissionDownloader, SubmissionStream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.dedup.keep_hashes_db = true;
//!     config.dedup.make_hard_links = true;
//!
//!     let downloader = SubmissionDownloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let listing: Vec<Submission> = Vec::new(); // from the platform client
//!     let source: SubmissionStream = futures::stream::iter(listing.into_iter().map(Ok)).boxed();
//!
//!     let summary = downloader.run(vec![source]).await?;
//!     println!("{} files written", summary.files_written);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// SQLite hash database
pub mod db;
/// Duplicate detection index and hash stores
pub mod dedup;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Resource fetching
pub mod fetch;
/// Submission and content filters
pub mod filter;
/// Destination path formatting
pub mod formatter;
/// Downloader resolution seams
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Atomic writes and hardlinks
pub mod writer;

// Re-export commonly used types
pub use config::{Config, DedupConfig, FetchConfig, FilterConfig, RetryConfig, RunConfig};
pub use db::HashDatabase;
pub use dedup::{DedupDecision, DedupIndex, DuplicateAction, HashFileStore, HashStore};
pub use downloader::{Collaborators, SubmissionDownloader, SubmissionProcessor, SubmissionStream};
pub use error::{
    DatabaseError, Error, ExtractionError, FetchError, PersistenceError, ResolutionError, Result,
    SourceError, WriteError,
};
pub use fetch::{FetchOptions, Fetcher};
pub use filter::{DownloadFilter, FilterChain, FilterDecision, ResourceFilter, UrlFilter};
pub use formatter::{DefaultPathFormatter, PathFormatter};
pub use resolver::{AuthContext, Direct, DirectResolver, Downloader, ResourceResolver};
pub use types::{
    ContentHash, Event, FetchedResource, ProcessOutcome, Resource, ResourceSkip, ResourceTally,
    RunSummary, SkipReason, Submission,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Processes `sources` until they are exhausted or a termination signal
/// arrives, then persists the hash index either way. A signal takes effect
/// once the submission in flight has been finished.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use submission_dl::{Config, SubmissionDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = SubmissionDownloader::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     let summary = run_with_shutdown(downloader, Vec::new()).await?;
///     println!("{:?}", summary);
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    downloader: SubmissionDownloader,
    sources: Vec<SubmissionStream>,
) -> Result<RunSummary> {
    downloader.run_until(sources, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
