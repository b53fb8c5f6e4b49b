use super::http::{HttpServer, SiteMap, StaticSite};
use crate::config::BuildConfig;
use crate::task::{Task, TaskError};
use crate::types::DirectoryRole;
use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

/// Open `url` in the system browser without waiting for it.
pub fn open_browser(url: &str) -> io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Serves the output directory unchanged: the `dist-server` task.
pub struct DistServer {
    config: Arc<BuildConfig>,
    shutdown: Arc<AtomicBool>,
}

impl DistServer {
    pub fn new(config: Arc<BuildConfig>, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, shutdown }
    }
}

impl Task for DistServer {
    fn name(&self) -> &str {
        "dist-server"
    }

    fn run(&self) -> Result<(), TaskError> {
        let settings = &self.config.settings().serve;
        let site = StaticSite::new(SiteMap::new(vec![self.config.dir(DirectoryRole::Output)]));
        let server = HttpServer::bind(&settings.host, settings.dist_port, site)?;
        let url = format!("http://{}:{}/", settings.host, settings.dist_port);
        info!(%url, "serving output");
        if settings.open {
            if let Err(e) = open_browser(&url) {
                warn!(%url, error = %e, "cannot open browser");
            }
        }
        server.run(&self.shutdown)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::config_with;
    use std::net::TcpListener;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[test]
    fn stops_when_shutdown_is_set() {
        let tmp = TempDir::new().unwrap();
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let config = config_with(tmp.path(), |c| c.serve.dist_port = port);
        let shutdown = Arc::new(AtomicBool::new(true));
        DistServer::new(config, shutdown.clone()).run().unwrap();
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn port_in_use_is_a_network_error() {
        let tmp = TempDir::new().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = config_with(tmp.path(), |c| c.serve.dist_port = port);
        let err = DistServer::new(config, Arc::new(AtomicBool::new(true)))
            .run()
            .unwrap_err();
        assert!(matches!(err, TaskError::Network(_)), "{err:?}");
    }
}
