//! Live-reload notification hub.
//!
//! Each reload bumps a generation counter. Browsers long-poll
//! `GET /__sitepipe/reload?since=N`; the request is held until the
//! generation moves past `N` or the poll times out, and answered with the
//! current generation. The injected client reloads the page whenever the
//! answer differs from the generation it loaded with.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Path of the long-poll endpoint.
pub const RELOAD_PATH: &str = "/__sitepipe/reload";

/// How long a poll is held open before answering with no change.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Client injected before `</body>` of served pages.
pub const CLIENT_SNIPPET: &str = r#"<script>
(function () {
  var endpoint = '/__sitepipe/reload'
  function poll (since) {
    fetch(endpoint + '?since=' + since, { cache: 'no-store' })
      .then(function (res) { return res.text() })
      .then(function (text) {
        var generation = parseInt(text, 10)
        if (since >= 0 && generation !== since) { location.reload(); return }
        poll(generation)
      })
      .catch(function () { setTimeout(function () { poll(since) }, 1000) })
  }
  poll(-1)
})()
</script>"#;

#[derive(Debug, Default)]
pub struct ReloadHub {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bump the generation and wake every waiting poll.
    pub fn notify(&self) -> u64 {
        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        *generation += 1;
        self.changed.notify_all();
        *generation
    }

    /// Block until the generation differs from `since` or `timeout` passes.
    /// A negative `since` (a fresh client) answers immediately.
    pub fn wait_past(&self, since: i64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        while since >= 0 && *generation == since as u64 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            generation = self
                .changed
                .wait_timeout(generation, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        *generation
    }
}

/// Parse the `since` query parameter; absent or malformed means a fresh client.
pub fn parse_since(query: Option<&str>) -> i64 {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "since")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(-1)
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], CLIENT_SNIPPET, &html[at..]),
        None => format!("{html}{CLIENT_SNIPPET}"),
    }
}
