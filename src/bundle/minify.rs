//! Output minification by content type.
//!
//! Markup goes through minify-html, which also minifies inline styles and
//! JavaScript-typed inline scripts. Stylesheets are recompiled by grass in
//! compressed mode. Scripts are parsed and minified by minify-js; a script
//! that does not parse is a transformation error, never emitted half-minified.

use crate::config::OutputStyle;
use crate::transform::{TransformError, compile_style};
use minify_js::{Session, TopLevelMode};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markup,
    Style,
    Script,
}

impl ContentType {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(Self::Markup),
            "css" => Some(Self::Style),
            "js" | "mjs" => Some(Self::Script),
            _ => None,
        }
    }
}

/// Collapse whitespace and drop comments in markup.
pub fn minify_markup(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    let minified = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8_lossy(&minified).into_owned()
}

pub fn minify_style(css: &str) -> Result<String, TransformError> {
    compile_style(css.to_string(), OutputStyle::Compressed, &[]).map(|out| out.trim_end().to_string())
}

pub fn minify_script(js: &str) -> Result<String, TransformError> {
    let session = Session::new();
    let mut out = Vec::new();
    minify_js::minify(&session, TopLevelMode::Global, js.as_bytes(), &mut out)
        .map_err(|e| TransformError::Minify(e.to_string()))?;
    Ok(String::from_utf8(out)?)
}

/// Minify `content` according to `kind`.
pub fn minify(kind: ContentType, content: &str) -> Result<String, TransformError> {
    match kind {
        ContentType::Markup => Ok(minify_markup(content)),
        ContentType::Style => minify_style(content),
        ContentType::Script => minify_script(content),
    }
}
