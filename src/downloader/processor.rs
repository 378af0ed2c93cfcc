//! Per-submission processing: filter, resolve, then fetch and write each resource.

use crate::config::DedupConfig;
use crate::dedup::{DedupDecision, DedupIndex, DuplicateAction};
use crate::error::WriteError;
use crate::fetch::{FetchOptions, Fetcher};
use crate::filter::{FilterChain, FilterDecision, ResourceFilter};
use crate::formatter::PathFormatter;
use crate::resolver::{AuthContext, ResourceResolver};
use crate::types::{
    Event, FetchedResource, ProcessOutcome, Resource, ResourceSkip, ResourceTally, SkipReason,
    Submission,
};
use crate::writer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// What the resource loop does after handling one resource
#[derive(Debug, PartialEq, Eq)]
enum ResourceFlow {
    /// Move on to the next resource
    Continue,
    /// A fetch failed; drop the remaining resources
    Abort,
    /// Duplicate content was handled without writing; stop this submission
    Duplicate,
}

/// Collaborators and state needed to process submissions
pub(crate) struct ProcessorParts {
    pub(crate) filters: FilterChain,
    pub(crate) resolver: Arc<dyn ResourceResolver>,
    pub(crate) formatter: Arc<dyn PathFormatter>,
    pub(crate) resource_filter: Arc<dyn ResourceFilter>,
    pub(crate) auth: AuthContext,
    pub(crate) fetcher: Fetcher,
    pub(crate) fetch_options: FetchOptions,
    pub(crate) dedup: DedupConfig,
    pub(crate) download_dir: PathBuf,
    pub(crate) index: DedupIndex,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

/// Runs the pipeline for one submission at a time
///
/// Owns the [`DedupIndex`] for the run; every resource passes through it
/// strictly in order, so no locking is involved.
pub struct SubmissionProcessor {
    filters: FilterChain,
    resolver: Arc<dyn ResourceResolver>,
    formatter: Arc<dyn PathFormatter>,
    resource_filter: Arc<dyn ResourceFilter>,
    auth: AuthContext,
    fetcher: Fetcher,
    fetch_options: FetchOptions,
    dedup: DedupConfig,
    download_dir: PathBuf,
    index: DedupIndex,
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl SubmissionProcessor {
    pub(crate) fn new(parts: ProcessorParts) -> Self {
        Self {
            filters: parts.filters,
            resolver: parts.resolver,
            formatter: parts.formatter,
            resource_filter: parts.resource_filter,
            auth: parts.auth,
            fetcher: parts.fetcher,
            fetch_options: parts.fetch_options,
            dedup: parts.dedup,
            download_dir: parts.download_dir,
            index: parts.index,
            event_tx: parts.event_tx,
        }
    }

    /// The dedup index for this run
    pub fn index(&self) -> &DedupIndex {
        &self.index
    }

    pub(crate) fn index_mut(&mut self) -> &mut DedupIndex {
        &mut self.index
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Process one submission to completion
    ///
    /// Filtered submissions return before any network or disk access.
    /// Resolution and extraction failures skip the submission. Resources are
    /// then handled one by one: a fetch failure abandons the rest of them, a
    /// write failure only loses that resource.
    pub async fn process(&mut self, submission: &Submission) -> ProcessOutcome {
        if let FilterDecision::Skip(reason) = self.filters.should_process(submission) {
            self.emit(Event::SubmissionSkipped {
                id: submission.id.clone(),
                reason: reason.clone(),
            });
            return ProcessOutcome::Skipped(reason);
        }

        let downloader = match self.resolver.resolve(&submission.url) {
            Ok(downloader) => downloader,
            Err(e) => {
                error!(submission_id = %submission.id, url = %submission.url, error = %e, "Could not resolve downloader");
                self.emit(Event::SubmissionFailed {
                    id: submission.id.clone(),
                    error: e.to_string(),
                });
                return ProcessOutcome::Unresolved;
            }
        };

        let module = downloader.module_name();
        if self.filters.is_module_disabled(module) {
            let reason = SkipReason::DisabledModule {
                module: module.to_string(),
            };
            debug!(submission_id = %submission.id, %reason, "Submission skipped");
            self.emit(Event::SubmissionSkipped {
                id: submission.id.clone(),
                reason: reason.clone(),
            });
            return ProcessOutcome::Skipped(reason);
        }

        let resources = match downloader.find_resources(submission, &self.auth).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(submission_id = %submission.id, module, error = %e, "Failed to extract resources");
                self.emit(Event::SubmissionFailed {
                    id: submission.id.clone(),
                    error: e.to_string(),
                });
                return ProcessOutcome::ExtractionFailed;
            }
        };
        debug!(submission_id = %submission.id, module, count = resources.len(), "Resources found");

        let formatter = Arc::clone(&self.formatter);
        let base_dir = self.download_dir.clone();
        let mut tally = ResourceTally::default();

        for (destination, resource) in
            formatter.format_resource_paths(submission, resources, &base_dir)
        {
            match self
                .handle_resource(submission, destination, resource, &mut tally)
                .await
            {
                ResourceFlow::Continue => {}
                ResourceFlow::Abort => return ProcessOutcome::Aborted(tally),
                ResourceFlow::Duplicate => return ProcessOutcome::Duplicate(tally),
            }
        }

        ProcessOutcome::Completed(tally)
    }

    async fn handle_resource(
        &mut self,
        submission: &Submission,
        destination: PathBuf,
        resource: Resource,
        tally: &mut ResourceTally,
    ) -> ResourceFlow {
        if let Some(reason) = self.pre_fetch_skip(&destination, &resource).await {
            debug!(submission_id = %submission.id, url = %resource.url, ?reason, "Resource skipped");
            self.emit(Event::ResourceSkipped {
                id: submission.id.clone(),
                url: resource.url.clone(),
                reason,
            });
            tally.skipped += 1;
            return ResourceFlow::Continue;
        }

        let fetched = match self.fetcher.fetch(&resource, self.fetch_options).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(submission_id = %submission.id, url = %resource.url, error = %e, "Failed to fetch resource; skipping remaining resources");
                self.emit(Event::FetchFailed {
                    id: submission.id.clone(),
                    url: resource.url.clone(),
                    error: e.to_string(),
                });
                return ResourceFlow::Abort;
            }
        };

        if let DedupDecision::Duplicate { canonical, action } =
            self.index.decide(&fetched.hash, &self.dedup)
        {
            self.index.record_url_hash(&resource.url, &fetched.hash);
            match action {
                DuplicateAction::Skip => {
                    info!(submission_id = %submission.id, hash = %fetched.hash, existing = %canonical.display(), "Duplicate content not downloaded");
                    self.emit(Event::DuplicateSkipped {
                        id: submission.id.clone(),
                        hash: fetched.hash,
                        existing: canonical,
                    });
                    return ResourceFlow::Duplicate;
                }
                DuplicateAction::HardLink => {
                    if link_duplicate(&canonical, &destination).await {
                        info!(submission_id = %submission.id, path = %destination.display(), target = %canonical.display(), "Hardlinked duplicate content");
                        self.emit(Event::HardLinked {
                            id: submission.id.clone(),
                            path: destination,
                            target: canonical,
                        });
                        tally.hardlinked += 1;
                        return ResourceFlow::Duplicate;
                    }
                }
                DuplicateAction::Write => {}
            }
        }

        self.write_resource(submission, destination, fetched, tally)
            .await;
        ResourceFlow::Continue
    }

    /// Checks that skip a resource without fetching it, in order
    async fn pre_fetch_skip(
        &mut self,
        destination: &Path,
        resource: &Resource,
    ) -> Option<ResourceSkip> {
        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Some(ResourceSkip::DestinationExists);
        }
        if !self.resource_filter.check_resource(resource) {
            return Some(ResourceSkip::Filtered);
        }
        if self.index.check_url_exists_or_add(&resource.url) {
            return Some(ResourceSkip::UrlSeen);
        }
        None
    }

    async fn write_resource(
        &mut self,
        submission: &Submission,
        destination: PathBuf,
        fetched: FetchedResource,
        tally: &mut ResourceTally,
    ) {
        let modified = submission.created_system_time();
        if modified.is_none() {
            warn!(submission_id = %submission.id, created_utc = submission.created_utc, "Creation time out of range; keeping current modification time");
        }

        let FetchedResource {
            resource,
            content,
            hash,
        } = fetched;

        if let Err(e) = write_blocking(content, destination.clone(), modified).await {
            error!(submission_id = %submission.id, path = %destination.display(), error = %e, "Failed to write resource");
            self.emit(Event::WriteFailed {
                id: submission.id.clone(),
                path: destination,
                error: e.to_string(),
            });
            tally.write_failed += 1;
            return;
        }

        self.index.record_written(&hash, &destination).await;
        self.index.record_url_hash(&resource.url, &hash);
        tally.written += 1;

        info!(submission_id = %submission.id, path = %destination.display(), %hash, "Downloaded resource");
        self.emit(Event::Downloaded {
            id: submission.id.clone(),
            path: destination,
            hash,
        });
    }
}

async fn write_blocking(
    content: Vec<u8>,
    destination: PathBuf,
    modified: Option<SystemTime>,
) -> Result<(), WriteError> {
    let path = destination.clone();
    tokio::task::spawn_blocking(move || writer::write_atomic(&content, &destination, modified))
        .await
        .map_err(|e| WriteError::Io {
            path,
            source: std::io::Error::other(e),
        })?
}

/// Hardlink `destination` to `canonical`; false means the caller should write a copy
async fn link_duplicate(canonical: &Path, destination: &Path) -> bool {
    let target = canonical.to_path_buf();
    let link = destination.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        if !writer::can_hard_link(&target, &link) {
            return Err("canonical copy missing or on another device".to_string());
        }
        writer::hard_link(&target, &link).map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(())) => true,
        Ok(Err(reason)) => {
            warn!(target = %canonical.display(), path = %destination.display(), %reason, "Cannot hardlink; writing a full copy");
            false
        }
        Err(e) => {
            warn!(target = %canonical.display(), path = %destination.display(), error = %e, "Hardlink task failed; writing a full copy");
            false
        }
    }
}
