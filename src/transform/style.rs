//! SCSS compilation with grass.
//!
//! Partials (`_name.scss`) are only ever imported, never compiled on their
//! own. Imports resolve against the importing file's directory first, then
//! the source root.

use super::{Transform, TransformError};
use crate::config::OutputStyle;
use crate::files::SourceFile;
use std::path::{Path, PathBuf};

pub struct StyleTransform {
    src: PathBuf,
    style: OutputStyle,
}

impl StyleTransform {
    pub fn new(src: PathBuf, style: OutputStyle) -> Self {
        Self { src, style }
    }
}

fn grass_style(style: OutputStyle) -> grass::OutputStyle {
    match style {
        OutputStyle::Expanded => grass::OutputStyle::Expanded,
        OutputStyle::Compressed => grass::OutputStyle::Compressed,
    }
}

/// Compile a stylesheet from a string.
pub fn compile(source: String, style: OutputStyle, load_paths: &[&Path]) -> Result<String, TransformError> {
    let mut options = grass::Options::default().style(grass_style(style));
    for path in load_paths {
        options = options.load_path(*path);
    }
    grass::from_string(source, &options).map_err(|e| TransformError::Style(e.to_string()))
}

impl Transform for StyleTransform {
    fn skip(&self, relative: &Path) -> bool {
        relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'))
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        relative.with_extension("css")
    }

    fn transform(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        let source = String::from_utf8(input)?;
        let dir = file.path.parent().unwrap_or(self.src.as_path());
        let css = compile(source, self.style, &[dir, self.src.as_path()])?;
        Ok(css.into_bytes())
    }
}
