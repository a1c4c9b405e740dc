//! Fetch one page from the packaged site and print its body.
//!
//! Run with:
//!   RUST_LOG=debug cargo run -- --assets ./site /pkg/fmt/
//!
//! The status line goes to the log, the body to stdout, so pages can be
//! piped straight into a file or a browser.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use localserve::{Bridge, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "localserve", version, about = "Serve a page from the in-process site")]
struct Cli {
    /// Page to fetch, e.g. `/pkg/fmt/` or `http://localhost/doc/`.
    url: String,

    /// Asset directory mounted at `/` (overrides LOCALSERVE_ASSETS).
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Zip archive holding the site; wins over the asset directory
    /// (overrides LOCALSERVE_ARCHIVE).
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Directory inside the archive mounted at `/`.
    #[arg(long, default_value = "", requires = "archive")]
    archive_root: String,

    /// Handler threads (overrides LOCALSERVE_WORKERS).
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    if let Some(assets) = cli.assets {
        config = config.with_assets(assets);
    }
    if let Some(archive) = cli.archive {
        config = config.with_archive(archive, &cli.archive_root);
    }
    if let Some(workers) = cli.workers {
        config = config.with_worker_threads(workers);
    }

    let page = match Bridge::from_config(&config).and_then(|bridge| bridge.serve(&cli.url)) {
        Ok(page) => page,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    info!(url = %cli.url, status = %page.status, len = page.body.len(), "served");

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&page.body).and_then(|()| stdout.flush()) {
        error!("writing body: {e}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
