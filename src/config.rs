//! Configuration types for submission-dl

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Sentinel in [`FilterConfig::ignore_user`] that matches submissions whose author is absent
pub const DELETED_AUTHOR: &str = "DELETED";

/// Largest accepted [`RetryConfig::backoff_multiplier`]
pub const MAX_BACKOFF_MULTIPLIER: f64 = 100.0;

/// Main configuration for [`SubmissionDownloader`](crate::SubmissionDownloader)
///
/// Fields are grouped into sub-configs:
/// - [`filter`](FilterConfig): exclusion sets and score bounds
/// - [`fetch`](FetchConfig): network timeouts and retry policy
/// - [`dedup`](DedupConfig): duplicate handling and hash persistence
/// - [`run`](RunConfig): run loop behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Submission filtering
    #[serde(default)]
    pub filter: FilterConfig,

    /// Resource fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Duplicate detection
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Run loop
    #[serde(default)]
    pub run: RunConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            filter: FilterConfig::default(),
            fetch: FetchConfig::default(),
            dedup: DedupConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Config {
    /// Check the configuration for inconsistent settings
    pub fn validate(&self) -> Result<()> {
        let f = &self.filter;
        if let (Some(min), Some(max)) = (f.min_score, f.max_score)
            && min > max
        {
            return Err(Error::config(
                "filter.min_score",
                format!("min_score {} exceeds max_score {}", min, max),
            ));
        }
        for (key, ratio) in [
            ("filter.min_score_ratio", f.min_score_ratio),
            ("filter.max_score_ratio", f.max_score_ratio),
        ] {
            if let Some(r) = ratio
                && !(0.0..=1.0).contains(&r)
            {
                return Err(Error::config(
                    key,
                    format!("upvote ratio {} is outside 0.0..=1.0", r),
                ));
            }
        }
        if let (Some(min), Some(max)) = (f.min_score_ratio, f.max_score_ratio)
            && min > max
        {
            return Err(Error::config(
                "filter.min_score_ratio",
                format!("min_score_ratio {} exceeds max_score_ratio {}", min, max),
            ));
        }
        let multiplier = self.fetch.retry.backoff_multiplier;
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
            return Err(Error::config(
                "fetch.retry.backoff_multiplier",
                format!(
                    "backoff multiplier {} must be between 1.0 and {}",
                    multiplier, MAX_BACKOFF_MULTIPLIER
                ),
            ));
        }
        Ok(())
    }

    /// Directory holding per-hash record files (`keep_hashes` mode)
    pub fn hash_dir(&self) -> PathBuf {
        self.dedup
            .hash_dir
            .clone()
            .unwrap_or_else(|| self.download_dir.join(".hashes"))
    }

    /// SQLite hash database path (`keep_hashes_db` mode)
    pub fn hash_db_path(&self) -> PathBuf {
        self.dedup
            .hash_db_path
            .clone()
            .unwrap_or_else(|| self.download_dir.join("hashes.db"))
    }
}

/// Submission and content filtering policy
///
/// Name sets are matched case-insensitively where noted; construct them with
/// lowercase entries or call [`FilterConfig::normalized`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Submission ids that are never downloaded
    #[serde(default)]
    pub exclude_id: HashSet<String>,

    /// Subreddit names to skip (lowercase)
    #[serde(default)]
    pub skip_subreddit: HashSet<String>,

    /// Author names to skip; include [`DELETED_AUTHOR`] to skip submissions without an author
    #[serde(default)]
    pub ignore_user: HashSet<String>,

    /// Minimum score (inclusive)
    #[serde(default)]
    pub min_score: Option<i64>,

    /// Maximum score (inclusive)
    #[serde(default)]
    pub max_score: Option<i64>,

    /// Minimum upvote ratio (inclusive)
    #[serde(default)]
    pub min_score_ratio: Option<f64>,

    /// Maximum upvote ratio (inclusive)
    #[serde(default)]
    pub max_score_ratio: Option<f64>,

    /// Downloader module names that are disabled (lowercase)
    #[serde(default)]
    pub disable_module: HashSet<String>,

    /// File extensions that are never downloaded (without the leading dot)
    #[serde(default)]
    pub excluded_extensions: Vec<String>,

    /// Domains that are never downloaded from (subdomains included)
    #[serde(default)]
    pub excluded_domains: Vec<String>,
}

// Pattern is a literal; compilation cannot fail
#[allow(clippy::unwrap_used)]
static SUBMISSION_ID_IN_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/comments/([a-zA-Z0-9]+)").unwrap());

impl FilterConfig {
    /// Lowercase the case-insensitive name sets
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.skip_subreddit = self
            .skip_subreddit
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        self.disable_module = self
            .disable_module
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        self.excluded_extensions = self
            .excluded_extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self.excluded_domains = self
            .excluded_domains
            .into_iter()
            .map(|d| d.to_lowercase())
            .collect();
        self
    }

    /// Merge submission ids from an exclusion file into [`exclude_id`](Self::exclude_id)
    ///
    /// One entry per line. Blank lines and `#` comments are ignored, and
    /// permalinks are reduced to the id that follows `/comments/`.
    /// Returns the number of ids read.
    pub fn load_excluded_ids(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = SUBMISSION_ID_IN_URL
                .captures(line)
                .and_then(|c| c.get(1))
                .map_or(line, |m| m.as_str());
            self.exclude_id.insert(id.to_string());
            count += 1;
        }
        tracing::debug!(path = %path.display(), count, "Loaded excluded submission ids");
        Ok(count)
    }
}

/// Resource fetching configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total time the fetcher may spend backing off between retries (default: 120 seconds)
    #[serde(default = "default_max_wait_time", with = "duration_serde")]
    pub max_wait_time: Duration,

    /// Give up on the first transient failure instead of retrying (default: false)
    #[serde(default)]
    pub fail_fast: bool,

    /// Timeout for a single HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Backoff shape for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_wait_time: default_max_wait_time(),
            fail_fast: false,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0, valid: 1.0 to 100.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Stop retrying once this much time has been spent sleeping (None = no budget)
    #[serde(default, with = "optional_duration_serde")]
    pub max_total_wait: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
            max_total_wait: None,
        }
    }
}

/// Duplicate detection configuration
///
/// See [`DedupIndex::decide`](crate::dedup::DedupIndex::decide) for how the
/// flags combine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Persist one record file per hash (default: false)
    #[serde(default)]
    pub keep_hashes: bool,

    /// Persist the hash index in a SQLite database (default: false)
    #[serde(default)]
    pub keep_hashes_db: bool,

    /// Suppress output for content already downloaded (default: false)
    #[serde(default)]
    pub no_dupes: bool,

    /// Hardlink duplicates to the first copy instead of writing them (default: false)
    #[serde(default)]
    pub make_hard_links: bool,

    /// Hash files already present in the download directory at startup (default: false)
    #[serde(default)]
    pub search_existing: bool,

    /// Override for the per-hash record directory (default: `<download_dir>/.hashes`)
    #[serde(default)]
    pub hash_dir: Option<PathBuf>,

    /// Override for the hash database path (default: `<download_dir>/hashes.db`)
    #[serde(default)]
    pub hash_db_path: Option<PathBuf>,
}

impl DedupConfig {
    /// Whether any persisted hash store is enabled
    pub fn persisted(&self) -> bool {
        self.keep_hashes || self.keep_hashes_db
    }
}

/// Run loop configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pause after a transient error from a submission source (default: 60 seconds)
    #[serde(default = "default_sequence_cooldown", with = "duration_serde")]
    pub sequence_cooldown: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sequence_cooldown: default_sequence_cooldown(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_wait_time() -> Duration {
    Duration::from_secs(120)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("submission-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_sequence_cooldown() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
