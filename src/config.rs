//! Project configuration.
//!
//! Handles loading, validating, and merging `sitepipe.toml`. Stock defaults
//! are serialized to a TOML table and the user's file is laid over them key by
//! key, so a config file only needs the values it changes.
//!
//! ## Config File Location
//!
//! `sitepipe.toml` in the project root, or any file passed with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! [build]
//! src = "src"                 # source role
//! dist = "dist"               # output role
//! temp = "temp"               # intermediate role
//! public = "public"           # static public role
//! node_modules = "node_modules"
//! metadata = "package.json"   # exposed to templates as `pkg`
//!
//! [build.paths]
//! html = "*.html"
//! css = "assets/styles/*.scss"
//! js = "assets/scripts/*.js"
//! image = "assets/images/**"
//! font = "assets/fonts/**"
//!
//! [data]                      # arbitrary template data
//! menu = [{ name = "Home", link = "index.html" }]
//! ```
//!
//! See [`stock_config_toml`] for the full list. Unknown keys are rejected to
//! catch typos early.
//!
//! ## Immutability
//!
//! [`BuildConfig`] is resolved once at startup and shared through an `Arc`.
//! Every task receives it in its constructor; nothing mutates it afterwards.

use crate::types::{AssetRole, DirectoryRole, PathPattern};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Default config file name looked up in the project root.
pub const CONFIG_FILENAME: &str = "sitepipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot read project metadata {path}: {message}")]
    Metadata { path: PathBuf, message: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Contents of `sitepipe.toml`.
///
/// All fields have defaults; user files override only what they name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directory layout and per-role path patterns.
    pub build: BuildSection,
    /// Arbitrary data passed verbatim to templates.
    pub data: toml::Table,
    /// Style compilation settings.
    pub styles: StylesConfig,
    /// Script transformation settings.
    pub scripts: ScriptsConfig,
    /// Image optimization settings.
    pub images: ImagesConfig,
    /// Linter settings.
    pub lint: LintConfig,
    /// Bundling directive resolution settings.
    pub bundle: BundleConfig,
    /// Dev and dist server settings.
    pub serve: ServeConfig,
    /// Publisher settings.
    pub deploy: DeployConfig,
}

/// Directory names (relative to the project root) and path patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub src: String,
    pub dist: String,
    pub temp: String,
    pub public: String,
    /// Dependency directory mounted at `/node_modules` by the dev server.
    pub node_modules: String,
    /// Project metadata file, exposed to templates as `pkg`.
    pub metadata: String,
    pub paths: AssetPaths,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            src: "src".to_string(),
            dist: "dist".to_string(),
            temp: "temp".to_string(),
            public: "public".to_string(),
            node_modules: "node_modules".to_string(),
            metadata: "package.json".to_string(),
            paths: AssetPaths::default(),
        }
    }
}

/// One glob per asset role, relative to the source directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetPaths {
    pub html: PathPattern,
    pub css: PathPattern,
    pub js: PathPattern,
    pub image: PathPattern,
    pub font: PathPattern,
}

impl AssetPaths {
    pub fn get(&self, role: AssetRole) -> &PathPattern {
        match role {
            AssetRole::Markup => &self.html,
            AssetRole::Style => &self.css,
            AssetRole::Script => &self.js,
            AssetRole::Image => &self.image,
            AssetRole::Font => &self.font,
        }
    }
}

fn stock_pattern(source: &str) -> PathPattern {
    PathPattern::new(source).expect("stock pattern must be a valid glob")
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            html: stock_pattern("*.html"),
            css: stock_pattern("assets/styles/*.scss"),
            js: stock_pattern("assets/scripts/*.js"),
            image: stock_pattern("assets/images/**"),
            font: stock_pattern("assets/fonts/**"),
        }
    }
}

/// Output style of the SCSS compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    pub output_style: OutputStyle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// External transpiler reading the script on stdin and writing the
    /// result to stdout. Empty means scripts are passed through unchanged.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG re-encoding quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    /// Apply fixable rules in place.
    pub fix: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self { fix: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Directories (relative to the project root) searched for assets
    /// referenced inside build blocks, in order.
    pub search_path: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            search_path: vec!["temp".to_string(), ".".to_string(), "..".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub host: String,
    pub dev_port: u16,
    pub dist_port: u16,
    /// Open the system browser when the dist server starts.
    pub open: bool,
    /// Open the system browser when the dev server starts.
    pub open_dev: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            dev_port: 3000,
            dist_port: 2080,
            open: true,
            open_dev: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Remote name (resolved with `git remote get-url`) or URL.
    pub remote: String,
    pub branch: String,
    pub message: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "gh-pages".to_string(),
            message: "Update site".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.build;
        for (key, value) in [
            ("build.src", &b.src),
            ("build.dist", &b.dist),
            ("build.temp", &b.temp),
            ("build.public", &b.public),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        for (key, generated) in [("build.temp", &b.temp), ("build.dist", &b.dist)] {
            if overlaps(&b.src, generated) {
                return Err(ConfigError::Validation(format!(
                    "{key} ({generated}) overlaps build.src ({}); generated files would overwrite sources",
                    b.src
                )));
            }
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.deploy.branch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "deploy.branch must not be empty".into(),
            ));
        }
        if self.serve.dev_port == self.serve.dist_port {
            return Err(ConfigError::Validation(
                "serve.dev_port and serve.dist_port must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Lexical containment check between two project-relative directories.
fn overlaps(a: &str, b: &str) -> bool {
    let a = normalize(Path::new(a));
    let b = normalize(Path::new(b));
    a.starts_with(&b) || b.starts_with(&a)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, deserialize, validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ProjectConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// The immutable configuration registry every task is constructed with.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    root: PathBuf,
    settings: ProjectConfig,
    template_data: serde_json::Value,
}

impl BuildConfig {
    /// Load `sitepipe.toml` (or `config_file`) for the project at `root`.
    ///
    /// An explicitly named config file must exist; the default one is
    /// optional.
    pub fn load(root: &Path, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let overlay = match config_file {
            Some(path) => {
                let path = root.join(path);
                let content = fs::read_to_string(&path)?;
                Some(toml::from_str::<toml::Value>(&content)?)
            }
            None => load_raw_config(&root.join(CONFIG_FILENAME))?,
        };
        let settings = resolve_config(overlay)?;
        let data = build_template_data(root, &settings)?;
        Ok(Self::new(root, settings, data))
    }

    /// Assemble a registry from already-resolved parts.
    pub fn new(root: &Path, settings: ProjectConfig, template_data: serde_json::Value) -> Self {
        Self {
            root: root.to_path_buf(),
            settings,
            template_data,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &ProjectConfig {
        &self.settings
    }

    pub fn template_data(&self) -> &serde_json::Value {
        &self.template_data
    }

    /// Absolute path of a directory role.
    pub fn dir(&self, role: DirectoryRole) -> PathBuf {
        let b = &self.settings.build;
        let name = match role {
            DirectoryRole::Source => &b.src,
            DirectoryRole::Intermediate => &b.temp,
            DirectoryRole::Output => &b.dist,
            DirectoryRole::StaticPublic => &b.public,
        };
        self.root.join(name)
    }

    pub fn pattern(&self, role: AssetRole) -> &PathPattern {
        self.settings.build.paths.get(role)
    }

    pub fn node_modules_dir(&self) -> PathBuf {
        self.root.join(&self.settings.build.node_modules)
    }

    /// Bundle asset search path, resolved against the project root.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.settings
            .bundle
            .search_path
            .iter()
            .map(|p| self.root.join(p))
            .collect()
    }
}

/// Build the template context: `[data]`, plus `pkg` and `date`.
///
/// `pkg` comes from the project metadata file (JSON, or TOML by extension).
/// A missing metadata file yields an empty `pkg` and a warning.
pub fn build_template_data(
    root: &Path,
    settings: &ProjectConfig,
) -> Result<serde_json::Value, ConfigError> {
    let mut data = serde_json::Map::new();
    for (key, value) in &settings.data {
        data.insert(key.clone(), serde_json::to_value(value)?);
    }

    let metadata_path = root.join(&settings.build.metadata);
    let pkg = read_metadata(&metadata_path)?;
    data.entry("pkg").or_insert(pkg);
    data.entry("date")
        .or_insert_with(|| serde_json::Value::String(chrono::Local::now().to_rfc3339()));

    Ok(serde_json::Value::Object(data))
}

fn read_metadata(path: &Path) -> Result<serde_json::Value, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "project metadata file not found; `pkg` is empty");
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    let content = fs::read_to_string(path)?;
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    let value = if is_toml {
        let parsed: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Metadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::to_value(parsed)?
    } else {
        serde_json::from_str(&content).map_err(|e| ConfigError::Metadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };
    debug!(path = %path.display(), "loaded project metadata");
    Ok(value)
}

/// Returns a fully-commented stock `sitepipe.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepipe configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Each file only needs the keys it wants to override.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directory layout (relative to the project root)
# ---------------------------------------------------------------------------
[build]
src = "src"            # sources, never written to
dist = "dist"          # final output
temp = "temp"          # intermediate output consumed by bundling
public = "public"      # copied verbatim into dist
node_modules = "node_modules"
# Project metadata, available to templates as `pkg` (.json or .toml).
metadata = "package.json"

# Glob per asset role, relative to `src`.
# `*` stays within a directory, `**` crosses directories.
[build.paths]
html = "*.html"
css = "assets/styles/*.scss"
js = "assets/scripts/*.js"
image = "assets/images/**"
font = "assets/fonts/**"

# ---------------------------------------------------------------------------
# Template data: anything under [data] is passed to templates as-is.
# `pkg` and `date` are added automatically unless defined here.
# ---------------------------------------------------------------------------
[data]
# menu = [{ name = "Home", link = "index.html" }]

[styles]
# "expanded" or "compressed"
output_style = "expanded"

[scripts]
# External transpiler: reads the script on stdin, writes the result to stdout.
# Empty = scripts are copied unchanged.
# command = ["npx", "babel", "--presets", "@babel/preset-env"]
command = []

[images]
jpeg_quality = 85

[lint]
# Apply fixable rules in place.
fix = true

[bundle]
# Where assets referenced inside <!-- build:... --> blocks are looked up.
search_path = ["temp", ".", ".."]

[serve]
host = "127.0.0.1"
dev_port = 3000
dist_port = 2080
# Open the browser when `start` launches the dist server.
open = true
# Open the browser when `serve` launches the dev server.
open_dev = true

[deploy]
remote = "origin"
branch = "gh-pages"
message = "Update site"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_directory_roles() {
        let config = ProjectConfig::default();
        assert_eq!(config.build.src, "src");
        assert_eq!(config.build.dist, "dist");
        assert_eq!(config.build.temp, "temp");
        assert_eq!(config.build.public, "public");
    }

    #[test]
    fn default_config_has_one_pattern_per_role() {
        let paths = AssetPaths::default();
        assert_eq!(paths.get(AssetRole::Markup).as_str(), "*.html");
        assert_eq!(paths.get(AssetRole::Style).as_str(), "assets/styles/*.scss");
        assert_eq!(paths.get(AssetRole::Script).as_str(), "assets/scripts/*.js");
        assert_eq!(paths.get(AssetRole::Image).as_str(), "assets/images/**");
        assert_eq!(paths.get(AssetRole::Font).as_str(), "assets/fonts/**");
    }

    #[test]
    fn stock_config_toml_matches_defaults() {
        let parsed: ProjectConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ProjectConfig::default();
        assert_eq!(parsed.build.src, defaults.build.src);
        assert_eq!(parsed.build.paths.css, defaults.build.paths.css);
        assert_eq!(parsed.serve.dist_port, 2080);
        assert!(parsed.serve.open_dev);
        assert_eq!(parsed.serve.open_dev, defaults.serve.open_dev);
        assert_eq!(parsed.bundle.search_path, defaults.bundle.search_path);
        assert_eq!(parsed.deploy.branch, "gh-pages");
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn sparse_override_keeps_other_defaults() {
        let overlay: toml::Value = toml::from_str(
            r#"
[build.paths]
css = "styles/**/*.scss"

[serve]
dist_port = 8080
"#,
        )
        .unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config.build.paths.css.as_str(), "styles/**/*.scss");
        assert_eq!(config.build.paths.html.as_str(), "*.html");
        assert_eq!(config.serve.dist_port, 8080);
        assert_eq!(config.serve.dev_port, 3000);
        assert!(config.serve.open_dev);
    }

    #[test]
    fn dev_browser_can_be_disabled() {
        let overlay: toml::Value = toml::from_str("[serve]\nopen_dev = false\n").unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert!(!config.serve.open_dev);
        assert!(config.serve.open);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let overlay: toml::Value = toml::from_str("[build]\nsorce = \"src\"\n").unwrap();
        assert!(matches!(resolve_config(Some(overlay)), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn output_overlapping_source_is_rejected() {
        let mut config = ProjectConfig::default();
        config.build.dist = "src/dist".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ProjectConfig::default();
        config.build.temp = "./src".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ProjectConfig::default();
        config.build.src = "site".to_string();
        config.build.dist = "site-dist".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn jpeg_quality_out_of_range_is_rejected() {
        let mut config = ProjectConfig::default();
        config.images.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_returns_defaults_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::load(tmp.path(), None).unwrap();
        assert_eq!(config.dir(DirectoryRole::Output), tmp.path().join("dist"));
        assert_eq!(config.dir(DirectoryRole::Intermediate), tmp.path().join("temp"));
        assert_eq!(config.pattern(AssetRole::Markup).as_str(), "*.html");
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("site.toml"), "[build]\ndist = \"out\"\n").unwrap();
        let config = BuildConfig::load(tmp.path(), Some(Path::new("site.toml"))).unwrap();
        assert_eq!(config.dir(DirectoryRole::Output), tmp.path().join("out"));
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = BuildConfig::load(tmp.path(), Some(Path::new("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        let result = BuildConfig::load(tmp.path(), None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn template_data_includes_pkg_menu_and_date() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("package.json"),
            r#"{"name": "demo-site", "version": "1.2.3"}"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[data]
menu = [{ name = "Home", link = "index.html" }, { name = "About", link = "about.html" }]
"#,
        )
        .unwrap();
        let config = BuildConfig::load(tmp.path(), None).unwrap();
        let data = config.template_data();
        assert_eq!(data["pkg"]["name"], "demo-site");
        assert_eq!(data["menu"][1]["name"], "About");
        assert!(data["date"].is_string());
    }

    #[test]
    fn template_data_reads_toml_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("Cargo.toml"),
            "[package]\nname = \"rusty-site\"\n",
        )
        .unwrap();
        let mut settings = ProjectConfig::default();
        settings.build.metadata = "Cargo.toml".to_string();
        let data = build_template_data(tmp.path(), &settings).unwrap();
        assert_eq!(data["pkg"]["package"]["name"], "rusty-site");
    }

    #[test]
    fn missing_metadata_yields_empty_pkg() {
        let tmp = TempDir::new().unwrap();
        let data = build_template_data(tmp.path(), &ProjectConfig::default()).unwrap();
        assert_eq!(data["pkg"], serde_json::json!({}));
    }

    #[test]
    fn malformed_metadata_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("package.json"), "{ nope").unwrap();
        let result = build_template_data(tmp.path(), &ProjectConfig::default());
        assert!(matches!(result, Err(ConfigError::Metadata { .. })));
    }
}
