use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::{path::PathBuf, time::Duration};

use shelfbot::pipeline::{run, Options};

#[derive(Parser, Debug)]
struct Cli {
    /// Base URL of the storefront to scrape
    #[arg(long, default_value = "https://www.saucedemo.com")]
    base_url: String,
    /// Directory receiving the HTML snapshot, images, logs and workbook
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,
    /// Explicit Chrome/Chromium binary (skips platform discovery)
    #[arg(long)]
    browser_path: Option<PathBuf>,
    /// Run Chrome with a visible window
    #[arg(long)]
    headful: bool,
    /// Append the browser's network log to out/logs/request.<timestamp>.log
    #[arg(long)]
    log_requests: bool,
    /// Seconds to wait for page readiness before giving up
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let opts = Options {
        base_url: args.base_url,
        out_dir: args.out_dir,
        browser_path: args.browser_path,
        headless: !args.headful,
        log_requests: args.log_requests,
        wait_timeout: Duration::from_secs(args.wait_secs),
    };

    let summary = run(&opts).await?;
    print_json(summary)?;

    Ok(())
}

fn print_json<T: Serialize>(v: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&v)?);
    Ok(())
}
