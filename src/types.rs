//! Shared vocabulary types used by every task.
//!
//! Asset roles pick *which* files a transformer reads, directory roles pick
//! *where* they are read from and written to. Both are plain enums so the
//! pipeline wiring in [`crate::pipeline`] reads like the table it implements.

use glob::{MatchOptions, Pattern, PatternError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// The kind of asset a transformer handles. One path pattern per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Markup,
    Style,
    Script,
    Image,
    Font,
}

impl AssetRole {
    pub const ALL: [AssetRole; 5] = [
        AssetRole::Markup,
        AssetRole::Style,
        AssetRole::Script,
        AssetRole::Image,
        AssetRole::Font,
    ];

    /// Task name for the role's transformer (`html`, `css`, ...).
    pub fn task_name(self) -> &'static str {
        match self {
            AssetRole::Markup => "html",
            AssetRole::Style => "css",
            AssetRole::Script => "js",
            AssetRole::Image => "image",
            AssetRole::Font => "font",
        }
    }

    /// Directory the role's transformer writes to.
    ///
    /// Markup, style and script go through the bundling phase, so they land in
    /// the intermediate directory. Images and fonts are final.
    pub fn target(self) -> DirectoryRole {
        match self {
            AssetRole::Markup | AssetRole::Style | AssetRole::Script => DirectoryRole::Intermediate,
            AssetRole::Image | AssetRole::Font => DirectoryRole::Output,
        }
    }
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

/// The four directories a project works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryRole {
    Source,
    Intermediate,
    Output,
    StaticPublic,
}

impl DirectoryRole {
    /// Whether tasks may write into this directory.
    pub fn is_writable(self) -> bool {
        matches!(self, DirectoryRole::Intermediate | DirectoryRole::Output)
    }
}

impl fmt::Display for DirectoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectoryRole::Source => "source",
            DirectoryRole::Intermediate => "intermediate",
            DirectoryRole::Output => "output",
            DirectoryRole::StaticPublic => "public",
        };
        f.write_str(name)
    }
}

/// A glob selecting files relative to a role directory.
///
/// Matching is done on `/`-separated relative paths: `*` stays within one
/// path segment, `**` spans any number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    source: String,
    pattern: Pattern,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PathPattern {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        Ok(Self {
            source: source.to_string(),
            pattern: Pattern::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a path relative to the role directory.
    pub fn matches(&self, relative: &Path) -> bool {
        match to_slash(relative) {
            Some(rel) => self.pattern.matches_with(&rel, MATCH_OPTIONS),
            None => false,
        }
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PathPattern::new(&value)
    }
}

impl From<PathPattern> for String {
    fn from(value: PathPattern) -> Self {
        value.source
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Render a relative path with `/` separators.
///
/// Returns `None` for paths that escape their root (`..`) or are absolute.
pub fn to_slash(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
