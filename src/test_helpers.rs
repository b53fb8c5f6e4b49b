//! Shared test utilities for the sitepipe test suite.
//!
//! Provides fixture setup, a ready-made [`BuildConfig`] with deterministic
//! template data, and a [`Recorder`] for asserting call order across tasks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let config = config_for(tmp.path());
//! pipeline::build(&config).run(...);
//! assert_file_contains(&tmp.path().join("dist/index.html"), "<title>");
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::{BuildConfig, ProjectConfig};
use crate::task::TaskEvent;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    crate::files::copy_tree(&fixtures, tmp.path()).unwrap();
    tmp
}

/// Stock configuration rooted at `root`, with fixed template data so
/// rendered output does not depend on the clock.
pub fn config_for(root: &Path) -> Arc<BuildConfig> {
    config_with(root, |_| {})
}

/// Like [`config_for`], with a hook to tweak the settings first.
pub fn config_with(root: &Path, tweak: impl FnOnce(&mut ProjectConfig)) -> Arc<BuildConfig> {
    let mut settings = ProjectConfig::default();
    settings.serve.open = false;
    settings.serve.open_dev = false;
    tweak(&mut settings);
    let data = serde_json::json!({
        "pkg": { "name": "fixture-site", "version": "1.0.0" },
        "date": "2024-01-01T00:00:00+00:00",
        "menu": [
            { "name": "Home", "link": "index.html" },
            { "name": "About", "link": "about.html" }
        ]
    });
    Arc::new(BuildConfig::new(root, settings, data))
}

/// Write a file (creating parents) relative to `root`.
pub fn write(root: &Path, rel: &str, content: &str) {
    crate::files::write_relative(root, Path::new(rel), content.as_bytes()).unwrap();
}

/// Read a file relative to `root`. Panics with the path on failure.
pub fn read(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

pub fn assert_file_contains(path: &Path, needle: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    assert!(
        content.contains(needle),
        "{} does not contain {needle:?}:\n{content}",
        path.display()
    );
}

// =========================================================================
// Call-order instrumentation
// =========================================================================

/// Thread-safe call log shared between test tasks.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Task names in the order they started.
pub fn started_order(events: &[TaskEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            TaskEvent::Started { task } => Some(task.clone()),
            _ => None,
        })
        .collect()
}

/// Index of the first event of `kind` for `task`. Panics if absent.
pub fn event_index(events: &[TaskEvent], task: &str, started: bool) -> usize {
    events
        .iter()
        .position(|e| match e {
            TaskEvent::Started { task: t } => started && t == task,
            TaskEvent::Finished { task: t, .. } => !started && t == task,
            TaskEvent::Failed { .. } => false,
        })
        .unwrap_or_else(|| panic!("no {} event for {task}: {events:?}", if started { "start" } else { "finish" }))
}
