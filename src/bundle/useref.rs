//! Build-block resolution.
//!
//! Markup marks groups of assets to concatenate with comment pairs:
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/normalize.css/normalize.css">
//! <link rel="stylesheet" href="assets/styles/main.css">
//! <!-- endbuild -->
//! ```
//!
//! The header is `build:TYPE(ALTERNATES) TARGET` where TYPE is `css`, `js`
//! or `remove`, and the optional comma-separated ALTERNATES are directories
//! searched before the configured search path. Each block is replaced by one
//! tag pointing at TARGET (or removed entirely for `remove`), and the
//! referenced files are concatenated into a [`Bundle`].

use super::BundleError;
use crate::types::to_slash;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+([^\s]+?))?\s*-->").expect("valid regex")
});
static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*endbuild\s*-->").expect("valid regex"));
static ASSET_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:script|link)\b[^>]*?\b(?:src|href)\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Css,
    Js,
    Remove,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockKind::Css => "css",
            BlockKind::Js => "js",
            BlockKind::Remove => "remove",
        })
    }
}

/// One `<!-- build:... --> ... <!-- endbuild -->` region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BlockKind,
    /// Extra search directories from `build:js(a,b)`.
    pub alternates: Vec<String>,
    /// Bundle path as written in the header (empty for `remove`).
    pub target: String,
    /// `src`/`href` values inside the block, in document order.
    pub references: Vec<String>,
    /// Byte range of the whole block, markers included.
    pub span: Range<usize>,
}

impl BuildBlock {
    /// The tag that replaces the block.
    pub fn replacement(&self) -> String {
        match self.kind {
            BlockKind::Css => format!(r#"<link rel="stylesheet" href="{}">"#, self.target),
            BlockKind::Js => format!(r#"<script src="{}"></script>"#, self.target),
            BlockKind::Remove => String::new(),
        }
    }
}

fn line_of(html: &str, offset: usize) -> usize {
    html[..offset].matches('\n').count() + 1
}

/// Find every build block in `html`.
pub fn parse_blocks(html: &str) -> Result<Vec<BuildBlock>, BundleError> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start) = BLOCK_START.captures_at(html, pos) {
        let Some(header) = start.get(0) else { break };
        let line = line_of(html, header.start());
        let kind = match &start[1] {
            "css" => BlockKind::Css,
            "js" => BlockKind::Js,
            "remove" => BlockKind::Remove,
            other => {
                return Err(BundleError::UnknownBlockType {
                    kind: other.to_string(),
                    line,
                });
            }
        };
        let target = start.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
        if target.is_empty() && kind != BlockKind::Remove {
            return Err(BundleError::MissingTarget { line });
        }
        let alternates = start
            .get(2)
            .map(|m| {
                m.as_str()
                    .trim_matches(['{', '}'])
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let end = BLOCK_END
            .find_at(html, header.end())
            .ok_or(BundleError::Unterminated { line })?;
        let body = &html[header.end()..end.start()];
        if let Some(nested) = BLOCK_START.find(body) {
            return Err(BundleError::Unterminated {
                line: line_of(html, header.end() + nested.start()),
            });
        }
        let references = ASSET_REF
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect();

        blocks.push(BuildBlock {
            kind,
            alternates,
            target,
            references,
            span: header.start()..end.end(),
        });
        pos = end.end();
    }
    Ok(blocks)
}

/// Replace every block with its single tag.
pub fn rewrite(html: &str, blocks: &[BuildBlock]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&html[cursor..block.span.start]);
        out.push_str(&block.replacement());
        cursor = block.span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Lexically resolve `.`/`..` without touching the filesystem.
/// Returns `None` if the path climbs above its root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(out)
}

/// Turn a `src`/`href`/target value into a path relative to the site root.
///
/// Root-relative values (`/x.css`) ignore the page's directory; query
/// strings and fragments are dropped.
pub fn site_path(reference: &str, page_dir: &Path) -> Option<PathBuf> {
    let clean = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if clean.is_empty() || clean.contains("://") || clean.starts_with("//") {
        return None;
    }
    match clean.strip_prefix('/') {
        Some(rooted) => normalize(Path::new(rooted)),
        None => normalize(&page_dir.join(clean)),
    }
}

/// Find a referenced asset: alternates first, then the search path.
pub fn locate(site_rel: &Path, alternates: &[PathBuf], search_path: &[PathBuf]) -> Option<PathBuf> {
    alternates
        .iter()
        .chain(search_path)
        .map(|dir| dir.join(site_rel))
        .find(|candidate| candidate.is_file())
}

/// A concatenated asset produced by one build block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub kind: BlockKind,
    /// Output path relative to the output directory.
    pub target: PathBuf,
    pub content: String,
}

/// Result of resolving every block in one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPage {
    pub html: String,
    pub bundles: Vec<Bundle>,
}

/// Resolve the blocks of the page at `page_rel` (relative to the site root).
///
/// `root` anchors the alternate directories named in block headers.
pub fn resolve_page(
    html: &str,
    page_rel: &Path,
    root: &Path,
    search_path: &[PathBuf],
) -> Result<ResolvedPage, BundleError> {
    let blocks = parse_blocks(html)?;
    let page_dir = page_rel.parent().unwrap_or(Path::new(""));
    let mut bundles = Vec::new();

    for block in &blocks {
        if block.kind == BlockKind::Remove {
            continue;
        }
        let target = site_path(&block.target, page_dir).ok_or_else(|| BundleError::BadTarget {
            target: block.target.clone(),
        })?;
        let alternates: Vec<PathBuf> = block.alternates.iter().map(|a| root.join(a)).collect();

        let mut parts = Vec::with_capacity(block.references.len());
        for reference in &block.references {
            let asset = site_path(reference, page_dir)
                .and_then(|rel| locate(&rel, &alternates, search_path))
                .ok_or_else(|| BundleError::MissingAsset {
                    reference: reference.clone(),
                    target: block.target.clone(),
                })?;
            let content = std::fs::read_to_string(&asset)?;
            parts.push(content.trim_end().to_string());
        }
        let separator = match block.kind {
            BlockKind::Js => ";\n",
            _ => "\n",
        };
        bundles.push(Bundle {
            kind: block.kind,
            target,
            content: parts.join(separator),
        });
    }

    Ok(ResolvedPage {
        html: rewrite(html, &blocks),
        bundles,
    })
}

/// Display form of a bundle target, `/`-separated.
pub fn display_target(target: &Path) -> String {
    to_slash(target).unwrap_or_else(|| target.display().to_string())
}
