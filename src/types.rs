//! Core types and events

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// A single item enumerated from the remote content platform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Platform-assigned id (e.g. "abc123")
    pub id: String,
    /// Subreddit the submission was posted to
    pub subreddit: String,
    /// Author name, absent when the account was deleted
    pub author: Option<String>,
    /// Submission title
    #[serde(default)]
    pub title: Option<String>,
    /// Net score
    pub score: i64,
    /// Fraction of votes that are upvotes (0.0 to 1.0)
    pub upvote_ratio: f64,
    /// Linked content URL; may be empty for text posts
    pub url: String,
    /// Creation time as seconds since the Unix epoch (UTC)
    pub created_utc: f64,
}

impl Submission {
    /// Creation time in local wall-clock time, truncated to whole seconds
    ///
    /// Returns `None` when the timestamp is out of range.
    pub fn created_local(&self) -> Option<DateTime<Local>> {
        let secs = self.created_utc.floor() as i64;
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(|utc| utc.with_timezone(&Local))
    }

    /// Creation time as a filesystem timestamp
    pub fn created_system_time(&self) -> Option<SystemTime> {
        self.created_local().map(SystemTime::from)
    }
}

/// One downloadable unit of content produced by a downloader for a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Source URL of the content
    pub url: String,
    /// File extension (without dot) when the downloader knows it better than the URL does
    #[serde(default)]
    pub extension: Option<String>,
}

impl Resource {
    /// Create a resource for a URL, deriving nothing
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: None,
        }
    }

    /// File extension of this resource, lowercase and without the dot
    ///
    /// Uses the explicit extension when set, otherwise the last path segment of the URL.
    pub fn file_extension(&self) -> Option<String> {
        if let Some(ext) = &self.extension {
            return Some(ext.trim_start_matches('.').to_lowercase());
        }
        let parsed = url::Url::parse(&self.url).ok()?;
        let segment = parsed.path_segments()?.next_back()?;
        let (_, ext) = segment.rsplit_once('.')?;
        if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Lowercase hex SHA-256 digest of a resource's bytes
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash a byte slice
    pub fn of(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ContentHash(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource whose bytes have been retrieved
#[derive(Clone, Debug)]
pub struct FetchedResource {
    /// The resource that was fetched
    pub resource: Resource,
    /// Complete response body
    pub content: Vec<u8>,
    /// Digest of `content`
    pub hash: ContentHash,
}

/// Why a submission was not processed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Id is in the exclusion list
    ExcludedId,
    /// Subreddit is in the skip list
    SkippedSubreddit {
        /// Subreddit name
        subreddit: String,
    },
    /// Author is ignored (`None` means the deleted-author sentinel matched)
    IgnoredAuthor {
        /// Author name
        author: Option<String>,
    },
    /// Score below the configured minimum
    ScoreBelowMinimum {
        /// Submission score
        score: i64,
        /// Configured minimum
        min: i64,
    },
    /// Score above the configured maximum
    ScoreAboveMaximum {
        /// Submission score
        score: i64,
        /// Configured maximum
        max: i64,
    },
    /// Upvote ratio outside the configured bounds
    RatioOutOfBounds {
        /// Submission upvote ratio
        ratio: f64,
    },
    /// URL rejected by the URL-level content filter
    UrlFiltered {
        /// Rejected URL
        url: String,
    },
    /// Submission has no URL
    EmptyUrl,
    /// Downloader module is disabled
    DisabledModule {
        /// Module name
        module: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ExcludedId => write!(f, "id in exclusion list"),
            SkipReason::SkippedSubreddit { subreddit } => {
                write!(f, "subreddit {} in skip list", subreddit)
            }
            SkipReason::IgnoredAuthor { author } => write!(
                f,
                "author {} is ignored",
                author.as_deref().unwrap_or(crate::config::DELETED_AUTHOR)
            ),
            SkipReason::ScoreBelowMinimum { score, min } => {
                write!(f, "score below minimum ({} < {})", score, min)
            }
            SkipReason::ScoreAboveMaximum { score, max } => {
                write!(f, "score above maximum ({} > {})", score, max)
            }
            SkipReason::RatioOutOfBounds { ratio } => {
                write!(f, "upvote ratio {} out of bounds", ratio)
            }
            SkipReason::UrlFiltered { url } => write!(f, "URL {} filtered", url),
            SkipReason::EmptyUrl => write!(f, "empty URL"),
            SkipReason::DisabledModule { module } => write!(f, "module {} disabled", module),
        }
    }
}

/// Why a single resource was not downloaded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSkip {
    /// Destination file already exists
    DestinationExists,
    /// Rejected by the resource-level content filter
    Filtered,
    /// URL already handled earlier in this run
    UrlSeen,
}

/// Final outcome of processing one submission
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessOutcome {
    /// Filter chain or module policy rejected the submission
    Skipped(SkipReason),
    /// No downloader matched the URL
    Unresolved,
    /// The downloader failed to enumerate resources
    ExtractionFailed,
    /// Resources were handled (some may have been skipped or failed to write)
    Completed(ResourceTally),
    /// A fetch failed; remaining resources were not attempted
    Aborted(ResourceTally),
    /// Content was already downloaded elsewhere; processing stopped at a duplicate
    Duplicate(ResourceTally),
}

/// Per-submission resource counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceTally {
    /// Files written
    pub written: u32,
    /// Hardlinks created
    pub hardlinked: u32,
    /// Resources skipped before fetching
    pub skipped: u32,
    /// Writes that failed
    pub write_failed: u32,
}

/// Counters for a whole run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Submissions pulled from sources
    pub submissions: u64,
    /// Submissions rejected by filters or module policy
    pub skipped: u64,
    /// Submissions that could not be resolved or extracted
    pub failed: u64,
    /// Submissions whose fetch aborted
    pub aborted: u64,
    /// Submissions stopped at a duplicate
    pub duplicates: u64,
    /// Files written
    pub files_written: u64,
    /// Hardlinks created
    pub hardlinks: u64,
    /// Transient source interruptions
    pub interruptions: u64,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &ProcessOutcome) {
        self.submissions += 1;
        let tally = match outcome {
            ProcessOutcome::Skipped(_) => {
                self.skipped += 1;
                return;
            }
            ProcessOutcome::Unresolved | ProcessOutcome::ExtractionFailed => {
                self.failed += 1;
                return;
            }
            ProcessOutcome::Completed(t) => t,
            ProcessOutcome::Aborted(t) => {
                self.aborted += 1;
                t
            }
            ProcessOutcome::Duplicate(t) => {
                self.duplicates += 1;
                t
            }
        };
        self.files_written += u64::from(tally.written);
        self.hardlinks += u64::from(tally.hardlinked);
    }
}

/// Pipeline events broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Submission rejected before any network access
    SubmissionSkipped {
        /// Submission id
        id: String,
        /// Why it was skipped
        reason: SkipReason,
    },

    /// Submission could not be resolved or extracted
    SubmissionFailed {
        /// Submission id
        id: String,
        /// Error message
        error: String,
    },

    /// A resource was skipped before fetching
    ResourceSkipped {
        /// Submission id
        id: String,
        /// Resource URL
        url: String,
        /// Why it was skipped
        reason: ResourceSkip,
    },

    /// A resource could not be fetched
    FetchFailed {
        /// Submission id
        id: String,
        /// Resource URL
        url: String,
        /// Error message
        error: String,
    },

    /// A resource could not be written
    WriteFailed {
        /// Submission id
        id: String,
        /// Destination path
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Content already exists elsewhere and was not written again
    DuplicateSkipped {
        /// Submission id
        id: String,
        /// Content hash
        hash: ContentHash,
        /// Canonical copy
        existing: PathBuf,
    },

    /// Destination was hardlinked to an existing copy
    HardLinked {
        /// Submission id
        id: String,
        /// New link
        path: PathBuf,
        /// Canonical copy
        target: PathBuf,
    },

    /// A file was written
    Downloaded {
        /// Submission id
        id: String,
        /// Destination path
        path: PathBuf,
        /// Content hash
        hash: ContentHash,
    },

    /// A source raised a transient error; the run loop is cooling down
    SourceInterrupted {
        /// Index of the source in the run
        source: usize,
        /// Last submission successfully pulled from the source
        last_id: Option<String>,
        /// Error message
        error: String,
    },

    /// All sources finished and the hash index was persisted
    RunFinished {
        /// Run counters
        summary: RunSummary,
    },
}
