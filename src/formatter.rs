//! Destination path formatting

use crate::types::{Resource, Submission};
use std::path::{Path, PathBuf};

/// Maps resolved resources to destination paths
pub trait PathFormatter: Send + Sync {
    /// Pair each resource with its destination under `base_dir`
    ///
    /// The returned iterator is consumed lazily, one resource at a time.
    fn format_resource_paths<'a>(
        &'a self,
        submission: &'a Submission,
        resources: Vec<Resource>,
        base_dir: &'a Path,
    ) -> Box<dyn Iterator<Item = (PathBuf, Resource)> + Send + 'a>;
}

/// `{base}/{subreddit}/{id}.{ext}`, with `_{n}` before the extension for multi-resource submissions
///
/// Path components taken from submission metadata are sanitized so they
/// cannot escape `base_dir`. Resources without a recognizable extension are
/// written without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPathFormatter;

impl PathFormatter for DefaultPathFormatter {
    fn format_resource_paths<'a>(
        &'a self,
        submission: &'a Submission,
        resources: Vec<Resource>,
        base_dir: &'a Path,
    ) -> Box<dyn Iterator<Item = (PathBuf, Resource)> + Send + 'a> {
        let multiple = resources.len() > 1;
        let dir = base_dir.join(sanitize_component(&submission.subreddit));
        let stem = sanitize_component(&submission.id);

        Box::new(resources.into_iter().enumerate().map(move |(i, res)| {
            let mut name = if multiple {
                format!("{}_{}", stem, i + 1)
            } else {
                stem.clone()
            };
            if let Some(ext) = res.file_extension() {
                name.push('.');
                name.push_str(&ext);
            }
            (dir.join(name), res)
        }))
    }
}

/// Replace characters that are unsafe in a single path component
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
