//! Filesystem helpers shared by the transformers.
//!
//! Every task that reads from one role directory and writes to another goes
//! through [`collect`] and [`write_relative`], so relative path structure is
//! preserved the same way everywhere.

use crate::types::PathPattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A file found under a role directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Path relative to the directory it was collected from.
    pub relative: PathBuf,
}

/// List every regular file under `root` matching `pattern`, sorted by path.
///
/// A missing `root` yields an empty list.
pub fn collect(root: &Path, pattern: &PathPattern) -> io::Result<Vec<SourceFile>> {
    Ok(collect_all(root)?
        .into_iter()
        .filter(|file| pattern.matches(&file.relative))
        .collect())
}

/// List every regular file under `root`, sorted by path.
///
/// Symlinks are followed and listed under their link path. Dangling links
/// and link cycles are skipped with a warning.
pub fn collect_all(root: &Path) -> io::Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_some() || e.path().is_some_and(Path::is_symlink) => {
                warn!(error = %e, "skipping unreadable link");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let relative = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        files.push(SourceFile { path, relative });
    }
    Ok(files)
}

/// Write `bytes` to `target_root/relative`, creating parent directories.
pub fn write_relative(target_root: &Path, relative: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    let dest = target_root.join(relative);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, bytes)?;
    Ok(dest)
}

/// Copy every file under `from` into `to`, preserving structure.
///
/// Returns the number of files copied. A missing `from` copies nothing.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<usize> {
    let files = collect_all(from)?;
    for file in &files {
        let dest = to.join(&file.relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&file.path, &dest)?;
    }
    Ok(files.len())
}

/// Recursively delete `path`. Returns `false` when it did not exist.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        write_relative(root, Path::new(rel), content.as_bytes()).unwrap();
    }

    #[test]
    fn collect_filters_by_pattern_and_sorts() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "assets/scripts/b.js", "b");
        touch(tmp.path(), "assets/scripts/a.js", "a");
        touch(tmp.path(), "assets/scripts/lib/c.js", "c");
        touch(tmp.path(), "index.html", "<p>");

        let pattern = PathPattern::new("assets/scripts/*.js").unwrap();
        let files = collect(tmp.path(), &pattern).unwrap();
        let rels: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("assets/scripts/a.js"),
                PathBuf::from("assets/scripts/b.js")
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn collect_follows_symlinks_and_skips_dangling_ones() {
        use std::os::unix::fs::symlink;

        let shared = TempDir::new().unwrap();
        touch(shared.path(), "theme/base.scss", "a {}");
        touch(shared.path(), "reset.scss", "b {}");
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "main.scss", "c {}");
        symlink(shared.path().join("theme"), tmp.path().join("theme")).unwrap();
        symlink(shared.path().join("reset.scss"), tmp.path().join("reset.scss")).unwrap();
        symlink(tmp.path().join("gone.scss"), tmp.path().join("dangling.scss")).unwrap();

        let rels: Vec<_> = collect_all(tmp.path())
            .unwrap()
            .into_iter()
            .map(|f| f.relative)
            .collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("main.scss"),
                PathBuf::from("reset.scss"),
                PathBuf::from("theme/base.scss"),
            ]
        );
    }

    #[test]
    fn collect_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let pattern = PathPattern::new("**").unwrap();
        assert!(collect(&tmp.path().join("absent"), &pattern).unwrap().is_empty());
    }

    #[test]
    fn copy_tree_preserves_structure() {
        let from = TempDir::new().unwrap();
        let to = TempDir::new().unwrap();
        touch(from.path(), "robots.txt", "User-agent: *");
        touch(from.path(), "nested/deep/file.txt", "deep");

        let copied = copy_tree(from.path(), to.path()).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(to.path().join("robots.txt")).unwrap(), "User-agent: *");
        assert_eq!(fs::read_to_string(to.path().join("nested/deep/file.txt")).unwrap(), "deep");
    }

    #[test]
    fn remove_missing_dir_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(!remove_dir_if_exists(&tmp.path().join("absent")).unwrap());
        touch(tmp.path(), "dist/index.html", "x");
        assert!(remove_dir_if_exists(&tmp.path().join("dist")).unwrap());
        assert!(!tmp.path().join("dist").exists());
    }
}
