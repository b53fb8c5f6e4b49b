//! Filesystem cleaner: removes the generated directories.
//!
//! Deletes the intermediate and output directories wholesale. Absent
//! directories are fine, so `clean` can run on a fresh checkout. There is no
//! partial cleanup.

use crate::config::BuildConfig;
use crate::files;
use crate::task::{Task, TaskError};
use crate::types::DirectoryRole;
use std::sync::Arc;
use tracing::debug;

pub struct Cleaner {
    config: Arc<BuildConfig>,
}

impl Cleaner {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

impl Task for Cleaner {
    fn name(&self) -> &str {
        "clean"
    }

    fn run(&self) -> Result<(), TaskError> {
        for role in [DirectoryRole::Output, DirectoryRole::Intermediate] {
            let path = self.config.dir(role);
            let removed = files::remove_dir_if_exists(&path)
                .map_err(|source| TaskError::Deletion {
                    path: path.clone(),
                    source,
                })?;
            debug!(dir = %path.display(), removed, "cleaned {role} directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{config_for, write};
    use tempfile::TempDir;

    #[test]
    fn removes_dist_and_temp() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dist/index.html", "<p>old</p>");
        write(tmp.path(), "temp/assets/styles/main.css", "a{}");
        write(tmp.path(), "src/index.html", "<p>keep</p>");

        Cleaner::new(config_for(tmp.path())).run().unwrap();

        assert!(!tmp.path().join("dist").exists());
        assert!(!tmp.path().join("temp").exists());
        assert!(tmp.path().join("src/index.html").exists());
    }

    #[test]
    fn absent_directories_are_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let cleaner = Cleaner::new(config_for(tmp.path()));
        cleaner.run().unwrap();
        cleaner.run().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_directory_is_a_deletion_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dist/locked/file.txt", "x");
        let locked = tmp.path().join("dist/locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o500)).unwrap();

        let result = Cleaner::new(config_for(tmp.path())).run();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700)).unwrap();

        // Running as root ignores directory permissions.
        if let Err(err) = result {
            assert!(matches!(err, TaskError::Deletion { .. }));
        }
    }
}
