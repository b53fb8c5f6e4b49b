//! Script style checker with auto-fix.
//!
//! Runs over the script-role source files only. Whitespace rules are fixed in
//! place when `[lint] fix` is on; rules that need a human (a stray
//! `debugger`, a `var` declaration) are always reported.
//!
//! | rule | fixable |
//! |------|---------|
//! | `no-trailing-spaces` | yes |
//! | `eol-last` | yes |
//! | `no-multiple-empty-lines` | yes |
//! | `linebreak-style` | yes |
//! | `no-debugger` | no |
//! | `no-var` | no |
//!
//! Violations left after fixing fail the task with [`TaskError::Lint`].

use crate::config::BuildConfig;
use crate::files;
use crate::task::{Task, TaskError};
use crate::types::{AssetRole, DirectoryRole};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^.\w$])debugger([^\w$]|$)").expect("valid regex"));
static VAR_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^.\w$])var\s+[A-Za-z_$\[{]").expect("valid regex"));

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintViolation {
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for LintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.file.display(),
            self.line,
            self.message,
            self.rule
        )
    }
}

/// A violation found in a piece of source text, before it is tied to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
    pub fixable: bool,
}

impl Finding {
    fn new(line: usize, rule: &'static str, message: &str, fixable: bool) -> Self {
        Self {
            line,
            rule,
            message: message.to_string(),
            fixable,
        }
    }
}

/// Check `source` against every rule.
pub fn check(source: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let lines: Vec<&str> = source.split('\n').collect();
    let mut blank_run = 0;
    let mut carry = Carry::default();

    for (i, raw) in lines.iter().enumerate() {
        let number = i + 1;
        let is_last = i + 1 == lines.len();
        if raw.ends_with('\r') {
            findings.push(Finding::new(
                number,
                "linebreak-style",
                "Expected linebreaks to be 'LF' but found 'CRLF'",
                true,
            ));
        }
        let line = raw.trim_end_matches('\r');
        if line.ends_with(' ') || line.ends_with('\t') {
            findings.push(Finding::new(
                number,
                "no-trailing-spaces",
                "Trailing spaces not allowed",
                true,
            ));
        }

        if line.trim().is_empty() {
            blank_run += 1;
            // Trailing blank lines are reported by eol-last instead.
            let trailing = lines[i..].iter().all(|l| l.trim().is_empty());
            if blank_run == 2 && !trailing {
                findings.push(Finding::new(
                    number,
                    "no-multiple-empty-lines",
                    "More than 1 blank line not allowed",
                    true,
                ));
            }
            continue;
        }
        blank_run = 0;

        let code = code_only(line, &mut carry);
        if DEBUGGER.is_match(&code) {
            findings.push(Finding::new(
                number,
                "no-debugger",
                "Unexpected 'debugger' statement",
                false,
            ));
        }
        if VAR_DECL.is_match(&code) {
            findings.push(Finding::new(
                number,
                "no-var",
                "Unexpected var, use let or const instead",
                false,
            ));
        }
        if is_last {
            findings.push(Finding::new(
                number,
                "eol-last",
                "Newline required at end of file but not found",
                true,
            ));
        }
    }

    if source.ends_with("\n\n") || (source.ends_with('\n') && source.trim().is_empty()) {
        findings.push(Finding::new(
            lines.len().saturating_sub(1),
            "eol-last",
            "Too many blank lines at the end of file",
            true,
        ));
    }
    findings
}

/// Lexical context carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Carry {
    #[default]
    Code,
    Template,
    BlockComment,
}

/// The code on `line` with string, template-literal and comment contents
/// blanked out, so rules only ever match real code.
fn code_only(line: &str, carry: &mut Carry) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        let state = *carry;
        match state {
            Carry::BlockComment => {
                if c == '*' && next == Some('/') {
                    chars.next();
                    *carry = Carry::Code;
                }
                out.push(' ');
            }
            Carry::Template => match c {
                '\\' => {
                    chars.next();
                    out.push(' ');
                }
                '`' => {
                    *carry = Carry::Code;
                    out.push(c);
                }
                _ => out.push(' '),
            },
            Carry::Code => match (quote, c) {
                (Some(_), '\\') => {
                    chars.next();
                    out.push(' ');
                }
                (Some(q), _) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (Some(_), _) => out.push(' '),
                (None, '\'' | '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (None, '`') => {
                    *carry = Carry::Template;
                    out.push(c);
                }
                (None, '/') if next == Some('/') => break,
                (None, '/') if next == Some('*') => {
                    chars.next();
                    *carry = Carry::BlockComment;
                    out.push(' ');
                }
                (None, _) => out.push(c),
            },
        }
    }
    out
}

/// Apply every fixable rule.
pub fn fix(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in normalized.split('\n') {
        let trimmed = line.trim_end_matches([' ', '\t', '\r']);
        let blank = trimmed.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        out.push(if blank { "" } else { trimmed });
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    let mut fixed = out.join("\n");
    fixed.push('\n');
    fixed
}

/// Outcome of linting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Whether the file was rewritten.
    pub fixed: bool,
    pub remaining: Vec<LintViolation>,
}

/// Lint one file, fixing it in place when `apply_fix` is set.
pub fn lint_file(path: &Path, display: &Path, apply_fix: bool) -> Result<FileReport, TaskError> {
    let source = fs::read_to_string(path)?;
    let mut text = source.clone();
    let mut fixed = false;
    if apply_fix {
        let candidate = fix(&source);
        if candidate != source {
            fs::write(path, &candidate)?;
            let shown = display.display();
            debug!(file = %shown, "applied lint fixes");
            fixed = true;
            text = candidate;
        }
    }
    let remaining = check(&text)
        .into_iter()
        .map(|f| LintViolation {
            file: display.to_path_buf(),
            line: f.line,
            rule: f.rule,
            message: f.message,
        })
        .collect();
    Ok(FileReport { fixed, remaining })
}

/// The `lint` task.
pub struct Linter {
    config: Arc<BuildConfig>,
}

impl Linter {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

impl Task for Linter {
    fn name(&self) -> &str {
        "lint"
    }

    fn run(&self) -> Result<(), TaskError> {
        let src = self.config.dir(DirectoryRole::Source);
        let pattern = self.config.pattern(AssetRole::Script);
        let apply_fix = self.config.settings().lint.fix;

        let mut violations = Vec::new();
        let mut fixed = 0;
        for file in files::collect(&src, pattern)? {
            let report = lint_file(&file.path, &file.relative, apply_fix)?;
            if report.fixed {
                fixed += 1;
            }
            violations.extend(report.remaining);
        }
        info!(fixed, violations = violations.len(), "lint complete");
        if violations.is_empty() {
            Ok(())
        } else {
            Err(TaskError::Lint(violations))
        }
    }
}
