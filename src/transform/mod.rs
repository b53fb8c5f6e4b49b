//! Per-asset transformers.
//!
//! Each asset role has one [`Transform`]: a pure function from one file's
//! bytes to the output bytes. [`AssetTask`] turns a transform into a task by
//! collecting the role's files from the source directory, running the
//! transform on each in parallel, and writing results to the role's target
//! directory with the relative path preserved.
//!
//! | Task | Transform | Target |
//! |------|-----------|--------|
//! | `html` | [`TemplateTransform`] (minijinja) | temp |
//! | `css` | [`StyleTransform`] (grass) | temp |
//! | `js` | [`ScriptTransform`] (pass-through or external command) | temp |
//! | `image` | [`ImageTransform`] (lossless re-encode) | dist |
//! | `font` | [`CopyTransform`] | dist |
//!
//! Transforms share no mutable state, so the five tasks can run
//! concurrently. The first failing file aborts its task; nothing is retried.

mod image;
mod script;
mod style;
mod template;

pub use self::image::ImageTransform;
pub use script::ScriptTransform;
pub use style::{StyleTransform, compile as compile_style};
pub use template::TemplateTransform;

use crate::config::BuildConfig;
use crate::files::{self, SourceFile};
use crate::task::{Task, TaskError};
use crate::types::{AssetRole, DirectoryRole};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("style error: {0}")]
    Style(String),
    #[error("script command failed: {0}")]
    Command(String),
    #[error("script does not parse: {0}")]
    Minify(String),
    #[error("image error: {0}")]
    Image(#[from] ::image::ImageError),
}

/// One external transformation applied to a single file.
pub trait Transform: Send + Sync {
    /// Whether a matched file should be left out (e.g. SCSS partials).
    fn skip(&self, _relative: &Path) -> bool {
        false
    }

    /// Output path relative to the target directory.
    fn output_path(&self, relative: &Path) -> PathBuf {
        relative.to_path_buf()
    }

    fn transform(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError>;
}

/// Copies the file unchanged.
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn transform(&self, _file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        Ok(input)
    }
}

/// Reads one role's files from the source directory, transforms and writes them.
pub struct AssetTask {
    config: Arc<BuildConfig>,
    role: AssetRole,
    transform: Box<dyn Transform>,
}

impl AssetTask {
    pub fn new(config: Arc<BuildConfig>, role: AssetRole, transform: Box<dyn Transform>) -> Self {
        Self {
            config,
            role,
            transform,
        }
    }

    /// The stock transformer for `role`.
    pub fn for_role(config: Arc<BuildConfig>, role: AssetRole) -> Self {
        let settings = config.settings();
        let transform: Box<dyn Transform> = match role {
            AssetRole::Markup => Box::new(TemplateTransform::new(
                config.dir(DirectoryRole::Source),
                config.template_data().clone(),
            )),
            AssetRole::Style => Box::new(StyleTransform::new(
                config.dir(DirectoryRole::Source),
                settings.styles.output_style,
            )),
            AssetRole::Script => Box::new(ScriptTransform::new(
                settings.scripts.command.clone(),
                config.root().to_path_buf(),
            )),
            AssetRole::Image => Box::new(ImageTransform::new(settings.images.jpeg_quality)),
            AssetRole::Font => Box::new(CopyTransform),
        };
        Self::new(config, role, transform)
    }

    pub fn role(&self) -> AssetRole {
        self.role
    }

    /// Transform every matching source file. Returns the written paths.
    pub fn transform_all(&self) -> Result<Vec<PathBuf>, TaskError> {
        let src = self.config.dir(DirectoryRole::Source);
        let target = self.config.dir(self.role.target());
        let sources: Vec<SourceFile> = files::collect(&src, self.config.pattern(self.role))?
            .into_iter()
            .filter(|f| !self.transform.skip(&f.relative))
            .collect();

        sources
            .par_iter()
            .map(|file| self.transform_one(file, &target))
            .collect()
    }

    fn transform_one(&self, file: &SourceFile, target: &Path) -> Result<PathBuf, TaskError> {
        let input = fs::read(&file.path)?;
        let output = self
            .transform
            .transform(file, input)
            .map_err(|e| TaskError::transformation(&file.relative, e))?;
        let dest = files::write_relative(target, &self.transform.output_path(&file.relative), &output)?;
        debug!(task = self.role.task_name(), file = %file.relative.display(), "transformed");
        Ok(dest)
    }
}

impl Task for AssetTask {
    fn name(&self) -> &str {
        self.role.task_name()
    }

    fn run(&self) -> Result<(), TaskError> {
        self.transform_all().map(|_| ())
    }
}
