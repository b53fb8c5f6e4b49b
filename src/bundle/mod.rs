//! Bundling and minification of the intermediate site into the output.
//!
//! The `useref` task reads every markup page from the intermediate
//! directory, resolves its build blocks (see [`useref`]), minifies the page
//! and every bundle by content type, and writes them to the output
//! directory. Assets are looked up in the block's alternate directories,
//! then along `[bundle] search_path` (by default the intermediate
//! directory, the project root and its parent).
//!
//! Two pages may reference the same bundle target as long as they would
//! produce identical content; the bundle is then written once.

pub mod minify;
pub mod useref;

use crate::config::BuildConfig;
use crate::files;
use crate::task::{Task, TaskError};
use crate::types::{AssetRole, DirectoryRole};
use minify::ContentType;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use useref::{BlockKind, Bundle, display_target};

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("build block opened on line {line} has no matching endbuild")]
    Unterminated { line: usize },
    #[error("unknown build block type `{kind}` on line {line}")]
    UnknownBlockType { kind: String, line: usize },
    #[error("build block on line {line} has no target path")]
    MissingTarget { line: usize },
    #[error("invalid bundle target `{target}`")]
    BadTarget { target: String },
    #[error("asset `{reference}` for bundle `{target}` not found on the search path")]
    MissingAsset { reference: String, target: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A resolved page waiting to be minified and written.
struct Page {
    relative: PathBuf,
    html: String,
}

pub struct Bundler {
    config: Arc<BuildConfig>,
}

impl Bundler {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }

    /// Resolve, minify and write every page and bundle. Returns the
    /// written paths, pages first.
    pub fn bundle_all(&self) -> Result<Vec<PathBuf>, TaskError> {
        let temp = self.config.dir(DirectoryRole::Intermediate);
        let dist = self.config.dir(DirectoryRole::Output);
        let search_path = self.config.search_path();
        let root = self.config.root();

        let sources = files::collect(&temp, self.config.pattern(AssetRole::Markup))?;
        let resolved: Vec<(Page, Vec<Bundle>)> = sources
            .par_iter()
            .map(|file| -> Result<(Page, Vec<Bundle>), TaskError> {
                let html = std::fs::read_to_string(&file.path)?;
                let page = useref::resolve_page(&html, &file.relative, root, &search_path)
                    .map_err(|e| TaskError::transformation(&file.relative, e))?;
                Ok((
                    Page {
                        relative: file.relative.clone(),
                        html: page.html,
                    },
                    page.bundles,
                ))
            })
            .collect::<Result<_, TaskError>>()?;

        let mut bundles: BTreeMap<PathBuf, Bundle> = BTreeMap::new();
        let mut pages = Vec::with_capacity(resolved.len());
        for (page, page_bundles) in resolved {
            for bundle in page_bundles {
                if let Some(existing) = bundles.get(&bundle.target) {
                    if existing.content != bundle.content || existing.kind != bundle.kind {
                        return Err(TaskError::transformation(
                            &page.relative,
                            format!(
                                "bundle `{}` is built with different contents by another page",
                                display_target(&bundle.target)
                            ),
                        ));
                    }
                    continue;
                }
                bundles.insert(bundle.target.clone(), bundle);
            }
            pages.push(page);
        }

        let mut written: Vec<PathBuf> = pages
            .par_iter()
            .map(|page| -> Result<PathBuf, TaskError> {
                let html = minify::minify_markup(&page.html);
                let dest = files::write_relative(&dist, &page.relative, html.as_bytes())?;
                debug!(file = %page.relative.display(), "page bundled");
                Ok(dest)
            })
            .collect::<Result<_, TaskError>>()?;

        let bundle_paths: Vec<PathBuf> = bundles
            .par_iter()
            .map(|(target, bundle)| -> Result<PathBuf, TaskError> {
                let kind = match bundle.kind {
                    BlockKind::Css => ContentType::Style,
                    _ => ContentType::Script,
                };
                let content = minify::minify(kind, &bundle.content)
                    .map_err(|e| TaskError::transformation(target, e))?;
                let dest = files::write_relative(&dist, target, content.as_bytes())?;
                debug!(bundle = %display_target(target), "bundle written");
                Ok(dest)
            })
            .collect::<Result<_, TaskError>>()?;

        info!(pages = written.len(), bundles = bundle_paths.len(), "bundling complete");
        written.extend(bundle_paths);
        Ok(written)
    }
}

impl Task for Bundler {
    fn name(&self) -> &str {
        "useref"
    }

    fn run(&self) -> Result<(), TaskError> {
        self.bundle_all().map(|_| ())
    }
}
