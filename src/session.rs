//! Browser session wrapper over a single headless Chrome process.
//!
//! The session holds the `headless_chrome` browser and tab by composition and
//! exposes only what the scrape needs: navigation, element fill/click, page
//! source capture, and a network-idle wait fed by CDP `Network.*` events.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use log::{debug, info};
use serde::Serialize;

use crate::scan::files_with_suffix;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Immutable session settings, resolved once before launch.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit Chrome/Chromium binary; platform discovery runs when unset.
    pub browser_path: Option<PathBuf>,
    /// Append drained network-log entries to this file when set.
    pub logfile_path: Option<PathBuf>,
    pub headless: bool,
    /// Bound for element waits and the network-idle wait.
    pub wait_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            logfile_path: None,
            headless: true,
            wait_timeout: Duration::from_secs(60),
        }
    }
}

/// One observed CDP network event.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkEntry {
    pub kind: &'static str,
    pub url: String,
}

/// Buffer of network events accumulated between readiness polls.
pub struct NetworkLog {
    entries: Arc<Mutex<Vec<NetworkEntry>>>,
    logfile_path: Option<PathBuf>,
}

impl NetworkLog {
    pub fn new(logfile_path: Option<PathBuf>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            logfile_path,
        }
    }

    /// Shared handle for the tab event listener to push into.
    pub fn sink(&self) -> Arc<Mutex<Vec<NetworkEntry>>> {
        Arc::clone(&self.entries)
    }

    /// Drain everything accumulated since the previous call. When a log file
    /// is configured each drained entry is appended to it pretty-printed.
    pub fn drain(&self) -> Result<Vec<NetworkEntry>> {
        let drained: Vec<NetworkEntry> = {
            let mut entries = self.entries.lock().expect("network log mutex");
            entries.drain(..).collect()
        };
        if let Some(path) = &self.logfile_path {
            if !drained.is_empty() {
                let mut logfile = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("open network log {}", path.display()))?;
                for entry in &drained {
                    writeln!(logfile, "{}", serde_json::to_string_pretty(entry)?)?;
                }
            }
        }
        Ok(drained)
    }

    /// True exactly when no network events arrived since the last poll.
    pub fn poll_idle(&self) -> Result<bool> {
        Ok(self.drain()?.is_empty())
    }
}

/// Poll `ready` every `interval` until it reports readiness or `timeout`
/// elapses. Expiry is an error; nothing is retried.
pub fn wait_until<F>(timeout: Duration, interval: Duration, mut ready: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    loop {
        if ready()? {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            bail!("condition not met within {timeout:?}");
        }
        std::thread::sleep(interval);
    }
}

/// Platform-specific discovery of an installed Chrome binary.
pub fn locate_browser_binary() -> Result<PathBuf> {
    let (root, suffix) = match std::env::consts::OS {
        "macos" => (PathBuf::from("/Applications"), "Google Chrome"),
        "windows" => (PathBuf::from(r"C:\Program Files\Google"), "chrome.exe"),
        other => bail!("unsupported platform: {other}"),
    };
    files_with_suffix(&root, Some(suffix))
        .into_iter()
        .next()
        .ok_or_else(|| {
            anyhow!(
                "no browser binary matching {suffix:?} under {}",
                root.display()
            )
        })
}

pub struct Session {
    _browser: Browser,
    tab: Arc<Tab>,
    network_log: NetworkLog,
    wait_timeout: Duration,
}

impl Session {
    /// Launch a browser process configured for scraping and start collecting
    /// its network events.
    pub fn launch(config: &SessionConfig) -> Result<Self> {
        let browser_path = match &config.browser_path {
            Some(path) => path.clone(),
            None => locate_browser_binary()?,
        };

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--start-maximized"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--disable-extensions"),
        ];
        if config.headless {
            args.extend([
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-webgl"),
            ]);
        }

        let launch_opts = LaunchOptionsBuilder::default()
            .headless(config.headless)
            .path(Some(browser_path.clone()))
            .ignore_certificate_errors(true)
            .args(args)
            .build()
            .map_err(|e| anyhow!("browser launch options: {e}"))?;

        let browser = Browser::new(launch_opts)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(config.wait_timeout);

        let network_log = NetworkLog::new(config.logfile_path.clone());
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })?;
        let sink = network_log.sink();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let entry = match event {
                Event::NetworkRequestWillBeSent(e) => NetworkEntry {
                    kind: "request-will-be-sent",
                    url: e.params.request.url.clone(),
                },
                Event::NetworkResponseReceived(e) => NetworkEntry {
                    kind: "response-received",
                    url: e.params.response.url.clone(),
                },
                Event::NetworkLoadingFinished(_) => NetworkEntry {
                    kind: "loading-finished",
                    url: String::new(),
                },
                Event::NetworkLoadingFailed(_) => NetworkEntry {
                    kind: "loading-failed",
                    url: String::new(),
                },
                _ => return,
            };
            if let Ok(mut entries) = sink.lock() {
                entries.push(entry);
            }
        }))?;

        info!("browser_path={}", browser_path.display());
        info!(
            "logfile_path={}",
            config
                .logfile_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<disabled>".into())
        );
        info!(
            "headless={} wait_timeout={:?}",
            config.headless, config.wait_timeout
        );

        Ok(Self {
            _browser: browser,
            tab,
            network_log,
            wait_timeout: config.wait_timeout,
        })
    }

    /// Navigate and block until the navigation settles.
    pub fn navigate(&self, url: &str) -> Result<()> {
        info!("navigating to {url}");
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    /// Wait for `selector`, focus it with a click, and type `text` into it.
    pub fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.tab
            .wait_for_element(selector)
            .with_context(|| format!("element {selector} never became available"))?
            .click()?;
        self.tab.type_str(text)?;
        Ok(())
    }

    pub fn click(&self, selector: &str) -> Result<()> {
        self.tab
            .wait_for_element(selector)
            .with_context(|| format!("element {selector} never became available"))?
            .click()?;
        Ok(())
    }

    pub fn page_html(&self) -> Result<String> {
        self.tab.get_content()
    }

    pub fn network_log(&self) -> &NetworkLog {
        &self.network_log
    }

    /// Block until a poll of the network log drains zero new entries.
    ///
    /// Best-effort idle signal: a request issued after an empty poll window
    /// is not caught, and failed responses are not distinguished from
    /// successful ones.
    pub fn wait_for_network_idle(&self) -> Result<()> {
        debug!("waiting for network idle");
        wait_until(self.wait_timeout, POLL_INTERVAL, || {
            self.network_log.poll_idle()
        })
    }
}
