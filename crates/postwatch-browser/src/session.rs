use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::network::{
        EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    },
    listeners::EventStream,
};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::{
    task::JoinHandle,
    time::{sleep_until, timeout, Instant},
};

/// No request in flight for this long counts as "network idle".
const QUIET_WINDOW: Duration = Duration::from_millis(500);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct LaunchOptions {
    pub chrome_path: Option<PathBuf>,
    /// Bound for navigation, and separately for the network-idle wait.
    pub timeout: Duration,
}

/// Extra Chromium flags for container use.
pub(crate) fn launch_args() -> Vec<&'static str> {
    vec![
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--mute-audio",
    ]
}

pub(crate) fn browser_config(
    opts: &LaunchOptions,
    profile_dir: &Path,
) -> std::result::Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile_dir)
        .request_timeout(opts.timeout)
        .window_size(1280, 2000)
        .args(launch_args());
    if let Some(path) = &opts.chrome_path {
        builder = builder.chrome_executable(path);
    }
    builder.build()
}

/// A live headless Chromium with its own throwaway profile directory.
///
/// Call [`BrowserSession::close`] when done. If the session is dropped without it
/// (error, panic, cancelled future) the browser is closed and reaped on a background
/// task instead.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    runtime: tokio::runtime::Handle,
    // Removed from disk on drop, after the browser is gone.
    _profile: TempDir,
}

impl BrowserSession {
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("postwatch-chrome-")
            .tempdir()
            .context("creating browser profile dir")?;
        let config = browser_config(opts, profile.path()).map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching browser")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "cdp handler error");
                }
            }
        });
        tracing::debug!(profile = %profile.path().display(), "browser launched");

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            runtime: tokio::runtime::Handle::current(),
            _profile: profile,
        })
    }

    /// Navigate to `url`, wait for the network to settle, return the rendered HTML.
    pub async fn render(&self, url: &str, limit: Duration) -> Result<String> {
        let browser = self.browser.as_ref().context("browser already closed")?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("opening page")?;

        page.execute(EnableParams::default())
            .await
            .context("enabling network events")?;
        let events = NetworkEvents {
            sent: page.event_listener::<EventRequestWillBeSent>().await?,
            finished: page.event_listener::<EventLoadingFinished>().await?,
            failed: page.event_listener::<EventLoadingFailed>().await?,
        };

        timeout(limit, page.goto(url))
            .await
            .with_context(|| format!("navigation to {url} timed out after {limit:?}"))?
            .with_context(|| format!("navigation to {url} failed"))?;

        if !events.wait_for_idle(QUIET_WINDOW, limit).await {
            tracing::warn!(url, ?limit, "network never went idle; capturing page anyway");
        }

        page.content().await.context("reading page content")
    }

    /// Close the browser and reap the process.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            shutdown(&mut browser).await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        tracing::debug!("browser closed");
    }
}

async fn shutdown(browser: &mut Browser) {
    match timeout(CLOSE_TIMEOUT, browser.close()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "browser close failed; killing"),
        Err(_) => tracing::warn!("browser close timed out; killing"),
    }
    if let Some(Err(e)) = browser.kill().await {
        tracing::debug!(error = %e, "browser kill");
    }
    if let Err(e) = browser.wait().await {
        tracing::warn!(error = %e, "failed to reap browser process");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let handler = self.handler.take();
        tracing::warn!("browser session dropped without close; shutting down in background");
        self.runtime.spawn(async move {
            shutdown(&mut browser).await;
            if let Some(handler) = handler {
                handler.abort();
            }
        });
    }
}

struct NetworkEvents {
    sent: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl NetworkEvents {
    /// `true` once no request has been in flight for `quiet`; `false` if `limit`
    /// passes first.
    async fn wait_for_idle(mut self, quiet: Duration, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        let mut inflight = InflightRequests::new(Instant::now());

        loop {
            let wake = inflight
                .idle_at(quiet)
                .map_or(deadline, |at| at.min(deadline));

            tokio::select! {
                Some(ev) = self.sent.next() => {
                    inflight.started(ev.request_id.inner().clone(), Instant::now());
                }
                Some(ev) = self.finished.next() => {
                    inflight.finished(ev.request_id.inner(), Instant::now());
                }
                Some(ev) = self.failed.next() => {
                    inflight.finished(ev.request_id.inner(), Instant::now());
                }
                _ = sleep_until(wake) => {
                    let now = Instant::now();
                    if inflight.is_idle(now, quiet) {
                        return true;
                    }
                    if now >= deadline {
                        tracing::debug!(inflight = inflight.len(), "network idle wait hit deadline");
                        return false;
                    }
                }
            }
        }
    }
}

/// Requests seen by `requestWillBeSent` without a matching finished/failed event.
#[derive(Debug)]
pub(crate) struct InflightRequests {
    pending: HashSet<String>,
    last_change: Instant,
}

impl InflightRequests {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            pending: HashSet::new(),
            last_change: now,
        }
    }

    pub(crate) fn started(&mut self, request_id: String, now: Instant) {
        // Redirects reuse the request id; they stay a single pending entry.
        self.pending.insert(request_id);
        self.last_change = now;
    }

    pub(crate) fn finished(&mut self, request_id: &str, now: Instant) {
        if self.pending.remove(request_id) {
            self.last_change = now;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// When the page becomes idle if nothing else happens.
    pub(crate) fn idle_at(&self, quiet: Duration) -> Option<Instant> {
        self.pending.is_empty().then(|| self.last_change + quiet)
    }

    pub(crate) fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        self.idle_at(quiet).is_some_and(|at| now >= at)
    }
}
