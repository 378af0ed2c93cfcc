//! Shared test helpers for creating SubmissionDownloader instances in tests.

use crate::config::Config;
use crate::downloader::{Collaborators, SubmissionDownloader, SubmissionStream};
use crate::error::{ExtractionError, ResolutionError, SourceError};
use crate::resolver::{AuthContext, Downloader, ResourceResolver};
use crate::types::{Event, Resource, Submission};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Creation timestamp used for test submissions (2020-09-13T12:26:40Z)
pub(crate) const CREATED_UTC: f64 = 1_600_000_000.0;

/// Submission in r/pics with a positive score and the given URL
pub(crate) fn submission(id: &str, url: &str) -> Submission {
    Submission {
        id: id.to_string(),
        subreddit: "pics".to_string(),
        author: Some("poster".to_string()),
        title: Some(format!("Submission {}", id)),
        score: 10,
        upvote_ratio: 0.95,
        url: url.to_string(),
        created_utc: CREATED_UTC,
    }
}

/// Config rooted in `dir` with no cooldown and no fetch retries
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download_dir = dir.join("downloads");
    config.fetch.fail_fast = true;
    config.fetch.request_timeout = Duration::from_secs(5);
    config.run.sequence_cooldown = Duration::ZERO;
    config
}

/// Downloader using the built-in collaborators
pub(crate) async fn create_test_downloader(config: Config) -> SubmissionDownloader {
    SubmissionDownloader::new(config).await.unwrap()
}

/// Downloader whose resolver always hands out `downloader`
pub(crate) async fn create_downloader_with(
    config: Config,
    downloader: Arc<dyn Downloader>,
) -> SubmissionDownloader {
    let mut collaborators = Collaborators::defaults(&config);
    collaborators.resolver = Arc::new(FixedResolver(downloader));
    SubmissionDownloader::with_collaborators(config, collaborators)
        .await
        .unwrap()
}

/// Stream that yields `items` in order
pub(crate) fn source(items: Vec<Result<Submission, SourceError>>) -> SubmissionStream {
    futures::stream::iter(items).boxed()
}

/// Everything currently buffered on an event receiver
pub(crate) fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Resolver that returns the same downloader for every URL
pub(crate) struct FixedResolver(pub(crate) Arc<dyn Downloader>);

impl ResourceResolver for FixedResolver {
    fn resolve(&self, _url: &str) -> Result<Arc<dyn Downloader>, ResolutionError> {
        Ok(Arc::clone(&self.0))
    }
}

/// Downloader that lists a fixed set of URLs for every submission
pub(crate) struct StaticDownloader {
    pub(crate) module: &'static str,
    pub(crate) urls: Vec<String>,
}

#[async_trait]
impl Downloader for StaticDownloader {
    fn module_name(&self) -> &str {
        self.module
    }

    async fn find_resources(
        &self,
        _submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        Ok(self.urls.iter().cloned().map(Resource::new).collect())
    }
}

/// Downloader that fails extraction for every submission
pub(crate) struct FailingDownloader;

#[async_trait]
impl Downloader for FailingDownloader {
    fn module_name(&self) -> &str {
        "Failing"
    }

    async fn find_resources(
        &self,
        _submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        Err(ExtractionError::new("Failing", "gallery is private"))
    }
}

/// Downloader that panics when asked for resources of `panic_on`
pub(crate) struct PanickingDownloader {
    pub(crate) panic_on: &'static str,
}

#[async_trait]
impl Downloader for PanickingDownloader {
    fn module_name(&self) -> &str {
        "Direct"
    }

    async fn find_resources(
        &self,
        submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        if submission.id == self.panic_on {
            panic!("downloader bug triggered by {}", submission.id);
        }
        Ok(vec![Resource::new(submission.url.clone())])
    }
}

/// Downloader that lists `{url}/1.jpg` .. `{url}/{count}.jpg` for each submission
pub(crate) struct GalleryDownloader {
    pub(crate) count: usize,
}

#[async_trait]
impl Downloader for GalleryDownloader {
    fn module_name(&self) -> &str {
        "Gallery"
    }

    async fn find_resources(
        &self,
        submission: &Submission,
        _auth: &AuthContext,
    ) -> Result<Vec<Resource>, ExtractionError> {
        Ok((1..=self.count)
            .map(|n| Resource::new(format!("{}/{}.jpg", submission.url, n)))
            .collect())
    }
}
