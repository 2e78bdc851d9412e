use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::export;
use crate::extract;
use crate::session::{Session, SessionConfig};

pub const LOGIN_USER: &str = "standard_user";
pub const LOGIN_PASSWORD: &str = "secret_sauce";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub out_dir: PathBuf,
    pub browser_path: Option<PathBuf>,
    pub headless: bool,
    pub log_requests: bool,
    pub wait_timeout: Duration,
}

/// Fixed layout of every artifact under the output directory.
pub struct OutputLayout {
    pub html_path: PathBuf,
    pub download_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub workbook_path: PathBuf,
}

impl OutputLayout {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            html_path: out_dir.join("out.html"),
            download_dir: out_dir.join("download"),
            logs_dir: out_dir.join("logs"),
            workbook_path: out_dir.join("out.xlsx"),
        }
    }

    /// Provision every output directory up front, before any file I/O.
    pub fn provision(&self, want_logs: bool) -> Result<()> {
        fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("create {}", self.download_dir.display()))?;
        if want_logs {
            fs::create_dir_all(&self.logs_dir)
                .with_context(|| format!("create {}", self.logs_dir.display()))?;
        }
        info!(
            "download_dir={}",
            dunce::canonicalize(&self.download_dir)
                .unwrap_or_else(|_| self.download_dir.clone())
                .display()
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub html_cached: bool,
    pub products: usize,
    pub images_downloaded: usize,
    pub workbook_path: String,
    pub elapsed_ms: u64,
}

/// Log in, capture the listing page, and return its HTML. The browser
/// process ends when the session drops at the end of this call.
fn capture_listing(opts: &Options, layout: &OutputLayout) -> Result<String> {
    let logfile_path = opts.log_requests.then(|| {
        let now = chrono::Local::now().format("%Y%m%d%H%M%S");
        layout.logs_dir.join(format!("request.{now}.log"))
    });
    let config = SessionConfig {
        browser_path: opts.browser_path.clone(),
        logfile_path,
        headless: opts.headless,
        wait_timeout: opts.wait_timeout,
    };

    let session = Session::launch(&config)?;
    session.navigate(&opts.base_url)?;
    session.fill("#user-name", LOGIN_USER)?;
    session.fill("#password", LOGIN_PASSWORD)?;
    session.click("#login-button")?;
    session.wait_for_network_idle()?;
    session.page_html()
}

/// Run the whole scrape: acquire HTML (cache or live session), cache it,
/// extract the listing, download thumbnails, and assemble the workbook.
pub async fn run(opts: &Options) -> Result<RunSummary> {
    let start = Instant::now();

    let layout = OutputLayout::new(&opts.out_dir);
    layout.provision(opts.log_requests)?;

    let (html, cached) = if layout.html_path.exists() {
        info!("reading cached listing from {}", layout.html_path.display());
        let html = fs::read_to_string(&layout.html_path)
            .with_context(|| format!("read {}", layout.html_path.display()))?;
        (html, true)
    } else {
        (capture_listing(opts, &layout)?, false)
    };

    if !cached {
        fs::write(&layout.html_path, extract::normalize(&html))
            .with_context(|| format!("write {}", layout.html_path.display()))?;
    }

    let products = extract::extract_products(&html)?;
    info!("extracted {} products", products.len());

    let client = reqwest::Client::builder()
        .user_agent(ua_generator::ua::spoof_ua())
        .build()?;

    let mut image_paths = Vec::with_capacity(products.len());
    let mut images_downloaded = 0;
    for product in &products {
        let (path, fetched) = export::fetch_image(
            &client,
            &opts.base_url,
            &product.image_src,
            &layout.download_dir,
        )
        .await?;
        if fetched {
            images_downloaded += 1;
        }
        image_paths.push(path);
    }

    export::write_workbook(&products, &image_paths, &layout.workbook_path)?;

    Ok(RunSummary {
        html_cached: cached,
        products: products.len(),
        images_downloaded,
        workbook_path: layout.workbook_path.display().to_string(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}
