//! Markup templating with minijinja.
//!
//! Pages are rendered with the project template data as context. The loader
//! is rooted at the source directory so `{% extends "layouts/base.html" %}`
//! and `{% include %}` resolve against sources. A fresh environment is built
//! per file: the loader caches templates, and the dev server re-runs this
//! transform after layouts change.
//!
//! Besides the builtins, the minijinja-contrib filters are available, so
//! `{{ date | dateformat(format="[year]-[month]-[day]") }}` formats the
//! build timestamp.

use super::{Transform, TransformError};
use crate::files::SourceFile;
use crate::types::to_slash;
use minijinja::{Environment, Value, path_loader};
use pulldown_cmark::{Parser, html as md_html};
use std::path::PathBuf;

pub struct TemplateTransform {
    src: PathBuf,
    data: serde_json::Value,
}

impl TemplateTransform {
    pub fn new(src: PathBuf, data: serde_json::Value) -> Self {
        Self { src, data }
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(path_loader(&self.src));
        minijinja_contrib::add_to_environment(&mut env);
        env.add_filter("markdown", markdown);
        env
    }
}

/// `{{ text | markdown }}`: render Markdown to (trusted) HTML.
fn markdown(value: String) -> Value {
    let mut out = String::new();
    md_html::push_html(&mut out, Parser::new(&value));
    Value::from_safe_string(out)
}

impl Transform for TemplateTransform {
    fn transform(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        let source = String::from_utf8(input)?;
        let name = to_slash(&file.relative).unwrap_or_else(|| file.relative.display().to_string());
        let rendered = self
            .environment()
            .render_named_str(&name, &source, &self.data)?;
        Ok(rendered.into_bytes())
    }
}
