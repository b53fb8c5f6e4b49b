//! CLI output formatting for pipeline runs.
//!
//! Output follows the task graph, not the filesystem: one line when a task
//! starts, one when it finishes or fails. Failure details are printed once,
//! after the pipeline settles, so the concurrent branches of a build do not
//! interleave them.
//!
//! ```text
//! ==> build: series(clean, parallel(series(parallel(html, css, js), useref), image, font, extra))
//! --> clean
//!     clean done in 4ms
//! --> html
//! --> css
//! --> js
//!     js done in 2ms
//! !!! css failed
//!
//! 1 task(s) failed
//! css: assets/styles/main.scss: expected ";".
//! ```
//!
//! Lint failures list each violation on its own indented line:
//!
//! ```text
//! lint: 2 lint violation(s)
//!     assets/scripts/main.js:3: Unexpected var, use let or const instead (no-var)
//!     assets/scripts/main.js:9: Unexpected 'debugger' statement (no-debugger)
//! ```
//!
//! Each `format_*` function is pure and returns lines; `print_*` wrappers
//! write them to stdout or stderr.

use crate::task::{PipelineError, TaskError, TaskEvent, TaskNode};
use std::time::Duration;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `850ms`, `2.4s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

pub fn format_pipeline_header(name: &str, node: &TaskNode) -> String {
    format!("==> {name}: {node}")
}

pub fn format_task_event(event: &TaskEvent) -> String {
    match event {
        TaskEvent::Started { task } => format!("--> {task}"),
        TaskEvent::Finished { task, elapsed } => {
            format!("{}{task} done in {}", indent(1), format_elapsed(*elapsed))
        }
        TaskEvent::Failed { task, .. } => format!("!!! {task} failed"),
    }
}

pub fn format_failures(error: &PipelineError) -> Vec<String> {
    let failures = error.failures();
    let mut lines = vec![format!("{} task(s) failed", failures.len())];
    for failure in failures {
        lines.push(format!("{}: {}", failure.task, failure.error));
        if let TaskError::Lint(violations) = &failure.error {
            lines.extend(violations.iter().map(|v| format!("{}{v}", indent(1))));
        }
    }
    lines
}

pub fn format_summary(name: &str, elapsed: Duration) -> String {
    format!("==> {name} complete in {}", format_elapsed(elapsed))
}

pub fn print_task_event(event: &TaskEvent) {
    println!("{}", format_task_event(event));
}

pub fn print_failures(error: &PipelineError) {
    eprintln!();
    for line in format_failures(error) {
        eprintln!("{line}");
    }
}
