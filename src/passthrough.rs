//! Static passthrough: `public/**` copied verbatim into the output directory.
//!
//! Paths are not expected to overlap with transformer output; nothing
//! enforces that.

use crate::config::BuildConfig;
use crate::files;
use crate::task::{Task, TaskError};
use crate::types::DirectoryRole;
use std::sync::Arc;
use tracing::debug;

pub struct Passthrough {
    config: Arc<BuildConfig>,
}

impl Passthrough {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

impl Task for Passthrough {
    fn name(&self) -> &str {
        "extra"
    }

    fn run(&self) -> Result<(), TaskError> {
        let from = self.config.dir(DirectoryRole::StaticPublic);
        let to = self.config.dir(DirectoryRole::Output);
        let copied = files::copy_tree(&from, &to)?;
        debug!(copied, from = %from.display(), "copied public files");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{config_for, read, write};
    use tempfile::TempDir;

    #[test]
    fn copies_public_only_file_unmodified() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "public/favicon.ico", "\u{0}\u{1}icon-bytes");
        write(tmp.path(), "public/.well-known/security.txt", "Contact: x");

        Passthrough::new(config_for(tmp.path())).run().unwrap();

        assert_eq!(read(tmp.path(), "dist/favicon.ico"), "\u{0}\u{1}icon-bytes");
        assert_eq!(read(tmp.path(), "dist/.well-known/security.txt"), "Contact: x");
    }

    #[test]
    fn missing_public_directory_copies_nothing() {
        let tmp = TempDir::new().unwrap();
        Passthrough::new(config_for(tmp.path())).run().unwrap();
        assert!(!tmp.path().join("dist").exists());
    }
}
