//! Development and preview servers.
//!
//! - [`DevServer`] serves the intermediate, source and public directories
//!   with live reload, and re-runs transformers as sources change.
//! - [`DistServer`] serves the finished output directory as-is.
//!
//! Both block until the shared shutdown flag is set (Ctrl+C in the CLI).

mod dev;
mod dist;
pub mod http;
pub mod reload;

pub use dev::{ChangeDispatcher, DevServer, WatchAction, WatchBinding, dev_site_map, watch_bindings};
pub use dist::{DistServer, open_browser};

use crate::task::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("cannot listen on {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error("file watcher failed: {0}")]
    Watch(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServeError> for TaskError {
    fn from(e: ServeError) -> Self {
        TaskError::Network(e.to_string())
    }
}
