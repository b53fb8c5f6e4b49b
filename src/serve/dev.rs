//! The live-reloading development server.
//!
//! Filesystem events are collected into batches (100 ms of quiet ends a
//! batch), each batch is matched against the watch bindings, and every
//! triggered binding runs on its own thread: the bound task first, if any,
//! then one reload notification. A failing task is logged and produces no
//! reload; the watcher keeps going. A binding that is still running when
//! it triggers again runs once more afterwards, never twice at once.

use super::ServeError;
use super::dist::open_browser;
use super::http::{HttpServer, SiteMap, StaticSite};
use super::reload::ReloadHub;
use crate::config::BuildConfig;
use crate::task::{Task, TaskError};
use crate::transform::AssetTask;
use crate::types::{AssetRole, DirectoryRole, PathPattern};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Quiet period that ends a batch of changes.
const DEBOUNCE: Duration = Duration::from_millis(100);

pub enum WatchAction {
    /// Re-run the task, then reload.
    Run(Arc<dyn Task>),
    Reload,
}

impl fmt::Debug for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchAction::Run(task) => write!(f, "Run({})", task.name()),
            WatchAction::Reload => f.write_str("Reload"),
        }
    }
}

#[derive(Debug)]
pub struct WatchBinding {
    pub pattern: PathPattern,
    pub dir: DirectoryRole,
    pub action: WatchAction,
}

/// The stock bindings: markup, style and script sources rebuild their
/// transformer; images, fonts, public files and output files only reload.
pub fn watch_bindings(config: &Arc<BuildConfig>) -> Vec<WatchBinding> {
    let mut bindings: Vec<WatchBinding> = [AssetRole::Markup, AssetRole::Style, AssetRole::Script]
        .into_iter()
        .map(|role| WatchBinding {
            pattern: config.pattern(role).clone(),
            dir: DirectoryRole::Source,
            action: WatchAction::Run(Arc::new(AssetTask::for_role(config.clone(), role))),
        })
        .collect();
    for role in [AssetRole::Image, AssetRole::Font] {
        bindings.push(WatchBinding {
            pattern: config.pattern(role).clone(),
            dir: DirectoryRole::Source,
            action: WatchAction::Reload,
        });
    }
    for dir in [DirectoryRole::StaticPublic, DirectoryRole::Output] {
        if let Ok(everything) = PathPattern::new("**") {
            bindings.push(WatchBinding {
                pattern: everything,
                dir,
                action: WatchAction::Reload,
            });
        }
    }
    bindings
}

/// Roots and mounts served in development.
pub fn dev_site_map(config: &BuildConfig) -> SiteMap {
    SiteMap::new(vec![
        config.dir(DirectoryRole::Intermediate),
        config.dir(DirectoryRole::Source),
        config.dir(DirectoryRole::StaticPublic),
    ])
    .with_mount("/node_modules", config.node_modules_dir())
}

/// Run state of one binding.
#[derive(Debug, Default)]
struct RunState {
    running: bool,
    rerun: bool,
}

struct Slot {
    binding: WatchBinding,
    /// The directory forms the binding's paths may arrive under.
    dirs: Vec<PathBuf>,
    state: Mutex<RunState>,
}

impl Slot {
    fn execute(&self, hub: &ReloadHub) {
        match &self.binding.action {
            WatchAction::Run(task) => match task.run() {
                Ok(()) => {
                    info!(task = task.name(), "rebuilt after change");
                    hub.notify();
                }
                Err(e) => error!(task = task.name(), error = %e, "rebuild failed"),
            },
            WatchAction::Reload => {
                hub.notify();
            }
        }
    }

    /// Claim the binding. Returns false, after queueing a re-run, when it
    /// is already running.
    fn start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.running {
            state.rerun = true;
            false
        } else {
            state.running = true;
            true
        }
    }

    /// Release the binding unless a re-run was queued meanwhile.
    fn finish(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.rerun {
            state.rerun = false;
            false
        } else {
            state.running = false;
            true
        }
    }
}

/// Routes batches of changed paths to their bindings.
///
/// A binding runs at most once at a time. Triggers arriving while it runs
/// fold into a single re-run that starts when the current run completes.
pub struct ChangeDispatcher {
    slots: Vec<Arc<Slot>>,
    hub: Arc<ReloadHub>,
}

impl ChangeDispatcher {
    pub fn new(config: &BuildConfig, bindings: Vec<WatchBinding>, hub: Arc<ReloadHub>) -> Self {
        let slots = bindings
            .into_iter()
            .map(|binding| {
                let dir = config.dir(binding.dir);
                let mut dirs = vec![dir.clone()];
                if let Ok(canonical) = dir.canonicalize() {
                    if canonical != dir {
                        dirs.push(canonical);
                    }
                }
                Arc::new(Slot {
                    binding,
                    dirs,
                    state: Mutex::default(),
                })
            })
            .collect();
        Self { slots, hub }
    }

    fn binding_matches(&self, index: usize, path: &Path) -> bool {
        let slot = &self.slots[index];
        slot.dirs
            .iter()
            .filter_map(|dir| path.strip_prefix(dir).ok())
            .any(|rel| slot.binding.pattern.matches(rel))
    }

    /// Indices of the bindings triggered by `changes`, in binding order.
    pub fn triggered(&self, changes: &[PathBuf]) -> Vec<usize> {
        (0..self.slots.len())
            .filter(|&i| changes.iter().any(|path| self.binding_matches(i, path)))
            .collect()
    }

    /// Start a thread for every triggered binding that is idle. Bindings
    /// already running get a re-run queued instead.
    pub fn dispatch(&self, changes: &[PathBuf]) -> Vec<JoinHandle<()>> {
        self.triggered(changes)
            .into_iter()
            .filter_map(|i| {
                let slot = self.slots[i].clone();
                if !slot.start() {
                    debug!(binding = i, "binding busy, re-run queued");
                    return None;
                }
                let hub = self.hub.clone();
                Some(thread::spawn(move || {
                    slot.execute(&hub);
                    while !slot.finish() {
                        slot.execute(&hub);
                    }
                }))
            })
            .collect()
    }
}

/// The `dev-server` task.
pub struct DevServer {
    config: Arc<BuildConfig>,
    shutdown: Arc<AtomicBool>,
}

impl DevServer {
    pub fn new(config: Arc<BuildConfig>, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, shutdown }
    }

    fn watch_loop(&self, rx: &Receiver<PathBuf>, dispatcher: &ChangeDispatcher) {
        let mut pending: HashSet<PathBuf> = HashSet::new();
        let mut last_change: Option<Instant> = None;
        while !self.shutdown.load(Ordering::SeqCst) {
            if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
                pending.insert(path);
                last_change = Some(Instant::now());
                continue;
            }
            if last_change.is_some_and(|at| at.elapsed() >= DEBOUNCE) && !pending.is_empty() {
                let changes: Vec<PathBuf> = pending.drain().collect();
                last_change = None;
                debug!(count = changes.len(), "change batch");
                // Handles are dropped; bindings finish on their own.
                dispatcher.dispatch(&changes);
            }
        }
    }
}

impl Task for DevServer {
    fn name(&self) -> &str {
        "dev-server"
    }

    fn run(&self) -> Result<(), TaskError> {
        let settings = &self.config.settings().serve;
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )
        .map_err(ServeError::from)?;
        for role in [DirectoryRole::Source, DirectoryRole::StaticPublic, DirectoryRole::Output] {
            let dir = self.config.dir(role);
            if dir.is_dir() {
                watcher
                    .watch(&dir, RecursiveMode::Recursive)
                    .map_err(ServeError::from)?;
            }
        }

        // The watcher is live before the first request can be answered.
        let hub = Arc::new(ReloadHub::new());
        let site = StaticSite::new(dev_site_map(&self.config)).with_reload(hub.clone());
        let server = HttpServer::bind(&settings.host, settings.dev_port, site)?;
        let url = format!("http://{}:{}/", settings.host, settings.dev_port);
        info!(%url, "dev server listening");
        if settings.open_dev {
            if let Err(e) = open_browser(&url) {
                warn!(%url, error = %e, "cannot open browser");
            }
        }

        let dispatcher = ChangeDispatcher::new(&self.config, watch_bindings(&self.config), hub);
        thread::scope(|scope| {
            let serving = scope.spawn(|| server.run(&self.shutdown));
            self.watch_loop(&rx, &dispatcher);
            match serving.join() {
                Ok(result) => result.map_err(TaskError::from),
                Err(_) => Err(TaskError::Network("dev server thread panicked".to_string())),
            }
        })
    }
}
