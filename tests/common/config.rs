//! Test configuration helpers for creating downloaders rooted in a temp dir

use std::path::PathBuf;
use std::time::Duration;
use submission_dl::{Collaborators, Config, SubmissionDownloader};
use tempfile::TempDir;

/// Config rooted in `temp_dir` with fail-fast fetching and no source cooldown
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download_dir = temp_dir.path().join("downloads");
    config.fetch.fail_fast = true;
    config.fetch.request_timeout = Duration::from_secs(5);
    config.run.sequence_cooldown = Duration::ZERO;
    config
}

/// Download directory of a config (convenience for path assertions)
pub fn download_path(config: &Config, relative: &str) -> PathBuf {
    config.download_dir.join(relative)
}

/// Build a downloader with the given collaborators
pub async fn create_downloader(
    config: Config,
    collaborators: Collaborators,
) -> SubmissionDownloader {
    SubmissionDownloader::with_collaborators(config, collaborators)
        .await
        .expect("Failed to create downloader")
}
