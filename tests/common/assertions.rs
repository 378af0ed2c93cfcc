//! Custom test assertions for pipeline tests

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use submission_dl::Event;
use tokio::sync::broadcast::Receiver;

/// Every event buffered on `rx`
pub fn collect_events(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Assert that a file exists and its modification time is `secs` after the epoch
pub fn assert_mtime(path: &Path, secs: u64) {
    let modified = std::fs::metadata(path)
        .unwrap_or_else(|e| panic!("{} missing: {}", path.display(), e))
        .modified()
        .expect("mtime unsupported");
    assert_eq!(
        modified,
        UNIX_EPOCH + Duration::from_secs(secs),
        "unexpected mtime for {}",
        path.display()
    );
}

/// Assert that two paths are the same physical file
#[cfg(unix)]
pub fn assert_same_file(a: &Path, b: &Path) {
    use std::os::unix::fs::MetadataExt;
    let a_meta = std::fs::metadata(a).expect("first file missing");
    let b_meta = std::fs::metadata(b).expect("second file missing");
    assert_eq!(
        (a_meta.dev(), a_meta.ino()),
        (b_meta.dev(), b_meta.ino()),
        "{} and {} are different files",
        a.display(),
        b.display()
    );
}

/// Count events matching a predicate
pub fn count_events(events: &[Event], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}
