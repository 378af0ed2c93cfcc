//! Run loop: pulls submissions from each source in turn and processes them.

use super::SubmissionDownloader;
use crate::error::{Error, Result, SourceError};
use crate::types::{Event, RunSummary, Submission};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tracing::{error, info, warn};

/// A sequence of submissions from the remote platform
///
/// [`SourceError::Transient`] items mark recoverable interruptions; the run
/// loop cools down and polls the same stream again.
pub type SubmissionStream = BoxStream<'static, std::result::Result<Submission, SourceError>>;

impl SubmissionDownloader {
    /// Process every submission from every source, then persist the hash index
    ///
    /// Sources are consumed in order. A transient source error is logged
    /// with the id of the last submission pulled from that source, followed
    /// by `run.sequence_cooldown`; the stream is then polled again, and a
    /// stream that has ended is abandoned in favour of the next source.
    ///
    /// A fatal source error or a panic stops the run. In every case the hash
    /// index is finalized exactly once (failures there are only logged) and
    /// [`Event::RunFinished`] is emitted before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] for a fatal source error and [`Error::Other`]
    /// if processing panicked.
    pub async fn run(self, sources: Vec<SubmissionStream>) -> Result<RunSummary> {
        self.run_until(sources, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops early once `shutdown` completes
    ///
    /// Shutdown is observed between submissions and during a source
    /// cooldown. The submission in flight when `shutdown` fires is finished
    /// first, so every file it commits is in the index that gets persisted.
    pub async fn run_until<S>(
        mut self,
        sources: Vec<SubmissionStream>,
        shutdown: S,
    ) -> Result<RunSummary>
    where
        S: Future<Output = ()> + Send,
    {
        let mut summary = RunSummary::default();
        let shutdown = std::pin::pin!(shutdown);

        let result = AssertUnwindSafe(self.drive(sources, &mut summary, shutdown))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Submission processing panicked; stopping run");
                Err(Error::Other(format!("submission processing panicked: {}", message)))
            });

        if let Err(e) = self.processor.index_mut().finalize().await {
            error!(error = %e, "Failed to persist hash index");
        }

        info!(
            submissions = summary.submissions,
            files_written = summary.files_written,
            hardlinks = summary.hardlinks,
            duplicates = summary.duplicates,
            interruptions = summary.interruptions,
            "Run finished"
        );
        self.emit_event(Event::RunFinished { summary });

        result.map(|()| summary)
    }

    async fn drive<S>(
        &mut self,
        sources: Vec<SubmissionStream>,
        summary: &mut RunSummary,
        mut shutdown: Pin<&mut S>,
    ) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let cooldown = self.config.run.sequence_cooldown;

        for (source, mut stream) in sources.into_iter().enumerate() {
            let mut last_id: Option<String> = None;

            loop {
                let item = tokio::select! {
                    biased;
                    () = shutdown.as_mut() => {
                        warn!(source, last_id = last_id.as_deref().unwrap_or("<none>"), "Shutdown requested; stopping run");
                        return Ok(());
                    }
                    item = stream.next() => item,
                };
                let Some(item) = item else { break };

                match item {
                    Ok(submission) => {
                        last_id = Some(submission.id.clone());
                        let outcome = self.processor.process(&submission).await;
                        summary.record(&outcome);
                    }
                    Err(SourceError::Transient(message)) => {
                        summary.interruptions += 1;
                        warn!(
                            source,
                            last_id = last_id.as_deref().unwrap_or("<none>"),
                            error = %message,
                            cooldown_secs = cooldown.as_secs(),
                            "Submission source interrupted; cooling down before resuming"
                        );
                        self.emit_event(Event::SourceInterrupted {
                            source,
                            last_id: last_id.clone(),
                            error: message,
                        });
                        tokio::select! {
                            biased;
                            () = shutdown.as_mut() => {
                                warn!(source, "Shutdown requested during cooldown; stopping run");
                                return Ok(());
                            }
                            () = tokio::time::sleep(cooldown) => {}
                        }
                    }
                    Err(fatal) => {
                        error!(source, error = %fatal, "Submission source failed");
                        return Err(fatal.into());
                    }
                }
            }
            info!(source, last_id = last_id.as_deref().unwrap_or("<none>"), "Submission source exhausted");
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
