//! Runs the `serve` pipeline against a copy of `fixtures/site` and talks to
//! it over a real socket.

use sitepipe::config::BuildConfig;
use sitepipe::pipeline;
use sitepipe::serve::reload::RELOAD_PATH;
use sitepipe::task::Executor;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Plain HTTP/1.0 GET; returns status and body.
fn get(port: u16, path: &str) -> std::io::Result<(u16, String)> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.set_read_timeout(Some(Duration::from_secs(40)))?;
    write!(stream, "GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n")?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    Ok((status, body))
}

fn wait_until_serving(port: u16) -> String {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if let Ok((200, body)) = get(port, "/index.html") {
            return body;
        }
        assert!(Instant::now() < deadline, "dev server never answered");
        thread::sleep(Duration::from_millis(100));
    }
}

#[test]
fn style_change_rebuilds_and_reloads_once() {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    sitepipe::files::copy_tree(&fixtures, tmp.path()).unwrap();

    let port = free_port();
    let mut toml = fs::read_to_string(tmp.path().join("sitepipe.toml")).unwrap();
    toml.push_str(&format!("\n[serve]\ndev_port = {port}\nopen_dev = false\n"));
    fs::write(tmp.path().join("sitepipe.toml"), toml).unwrap();

    let config = Arc::new(BuildConfig::load(tmp.path(), None).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let node = pipeline::serve(&config, shutdown.clone());
    let server = thread::spawn(move || Executor::new().run(&node));

    let page = wait_until_serving(port);
    assert!(page.contains(RELOAD_PATH), "reload client not injected");
    assert!(page.contains("<!-- build:css"), "dev pages are served unbundled");

    let (status, stylesheet) = get(port, "/assets/styles/main.css").unwrap();
    assert_eq!(status, 200);
    assert!(!stylesheet.contains("rebeccapurple"));

    let scss = tmp.path().join("src/assets/styles/main.scss");
    let mut source = fs::read_to_string(&scss).unwrap();
    source.push_str("\nfooter { color: rebeccapurple; }\n");
    fs::write(&scss, source).unwrap();

    let (status, generation) = get(port, &format!("{RELOAD_PATH}?since=0")).unwrap();
    assert_eq!(status, 200);
    assert_eq!(generation, "1");

    let (_, stylesheet) = get(port, "/assets/styles/main.css").unwrap();
    assert!(stylesheet.contains("rebeccapurple"), "{stylesheet}");

    // Nothing else changed, so no further reload follows.
    thread::sleep(Duration::from_millis(500));
    let (_, generation) = get(port, RELOAD_PATH).unwrap();
    assert_eq!(generation, "1");

    shutdown.store(true, Ordering::SeqCst);
    server.join().unwrap().unwrap();
}
