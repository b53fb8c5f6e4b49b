//! Task graph and executor.
//!
//! A pipeline is a tree of [`TaskNode`]s:
//!
//! ```text
//! Sequence ── children run one after another, first failure stops the rest
//! Parallel ── children run concurrently, every child settles before the
//!             node reports, failures are aggregated in child order
//! Leaf     ── one Task
//! ```
//!
//! The [`Executor`] walks the tree. Leaves are blocking calls returning a
//! `Result`; parallel branches run on the rayon pool. Each leaf start,
//! finish and failure is logged and, when a channel is attached, sent as a
//! [`TaskEvent`] so the CLI (or a test) can observe the exact order.

use crate::lint::LintViolation;
use rayon::prelude::*;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Failure of a single task.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A transformation reported a failure on one file.
    #[error("{}: {message}", .file.display())]
    Transformation { file: PathBuf, message: String },
    /// Style violations left after auto-fixing.
    #[error("{} lint violation(s)", .0.len())]
    Lint(Vec<LintViolation>),
    /// A generated directory could not be removed.
    #[error("cannot delete {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Socket or remote failure while serving or publishing.
    #[error("network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TaskError {
    pub fn transformation(file: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        TaskError::Transformation {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

/// A named unit of work with explicit completion.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion. Long-running tasks (servers) return only when
    /// they are shut down.
    fn run(&self) -> Result<(), TaskError>;
}

/// A task built from a closure.
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F> FnTask<F>
where
    F: Fn() -> Result<(), TaskError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn() -> Result<(), TaskError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<(), TaskError> {
        (self.f)()
    }
}

/// Node of the task graph.
#[derive(Clone)]
pub enum TaskNode {
    Leaf(Arc<dyn Task>),
    Sequence(Vec<TaskNode>),
    Parallel(Vec<TaskNode>),
}

impl TaskNode {
    pub fn leaf(task: impl Task + 'static) -> Self {
        TaskNode::Leaf(Arc::new(task))
    }

    /// Leaf task names in depth-first order.
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            TaskNode::Leaf(task) => names.push(task.name().to_string()),
            TaskNode::Sequence(children) | TaskNode::Parallel(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
        }
    }
}

impl fmt::Display for TaskNode {
    /// Compact shape, e.g. `series(clean, parallel(html, css))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, children) = match self {
            TaskNode::Leaf(task) => return f.write_str(task.name()),
            TaskNode::Sequence(children) => ("series", children),
            TaskNode::Parallel(children) => ("parallel", children),
        };
        write!(f, "{label}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskNode({self})")
    }
}

/// Progress notification for one leaf task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Started { task: String },
    Finished { task: String, elapsed: Duration },
    Failed { task: String, error: String },
}

/// A task failure tagged with the task that produced it.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: TaskError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.error)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{}", describe_failures(.0))]
    Failed(Vec<TaskFailure>),
}

impl PipelineError {
    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            PipelineError::Failed(failures) => failures,
        }
    }
}

fn describe_failures(failures: &[TaskFailure]) -> String {
    let details: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!("{} task(s) failed: {}", failures.len(), details.join("; "))
}

/// Walks a [`TaskNode`] tree.
#[derive(Default)]
pub struct Executor {
    events: Option<Sender<TaskEvent>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every [`TaskEvent`] to `events`.
    pub fn with_events(events: Sender<TaskEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }

    pub fn run(&self, node: &TaskNode) -> Result<(), PipelineError> {
        self.run_node(node).map_err(PipelineError::Failed)
    }

    fn run_node(&self, node: &TaskNode) -> Result<(), Vec<TaskFailure>> {
        match node {
            TaskNode::Leaf(task) => self.run_leaf(task.as_ref()),
            TaskNode::Sequence(children) => {
                for child in children {
                    self.run_node(child)?;
                }
                Ok(())
            }
            TaskNode::Parallel(children) => {
                let results: Vec<Result<(), Vec<TaskFailure>>> =
                    children.par_iter().map(|child| self.run_node(child)).collect();
                let failures: Vec<TaskFailure> = results
                    .into_iter()
                    .filter_map(Result::err)
                    .flatten()
                    .collect();
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(failures)
                }
            }
        }
    }

    fn run_leaf(&self, task: &dyn Task) -> Result<(), Vec<TaskFailure>> {
        let name = task.name().to_string();
        info!(task = %name, "starting");
        self.emit(TaskEvent::Started { task: name.clone() });
        let start = Instant::now();
        match task.run() {
            Ok(()) => {
                let elapsed = start.elapsed();
                info!(task = %name, ?elapsed, "finished");
                self.emit(TaskEvent::Finished {
                    task: name,
                    elapsed,
                });
                Ok(())
            }
            Err(err) => {
                error!(task = %name, error = %err, "failed");
                self.emit(TaskEvent::Failed {
                    task: name.clone(),
                    error: err.to_string(),
                });
                Err(vec![TaskFailure {
                    task: name,
                    error: err,
                }])
            }
        }
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}
