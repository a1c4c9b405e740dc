//! The blocking fetch façade.
//!
//! Host UI bindings call one synchronous function and get a finished page
//! back. Behind it a small tokio runtime runs the handler tasks; the calling
//! thread blocks on the round trip and then reads the whole body.
//!
//! Two ways in:
//!
//! - [`Bridge`]: an owned instance with its own router, for embedding and
//!   tests.
//! - [`serve`] / [`init`]: one process-wide bridge, set up on first use.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Error;
use crate::page::Page;
use crate::router::Router;
use crate::site;
use crate::transport::Transport;

/// A router plus the runtime its handlers run on.
///
/// Dropping a bridge shuts its runtime down without waiting: handler tasks
/// still running are abandoned. This is safe from synchronous and async
/// contexts alike.
pub struct Bridge {
    transport: Transport,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl Bridge {
    /// Wraps `router` with a runtime of `worker_threads` threads.
    pub fn new(router: Router, worker_threads: usize) -> Result<Self, Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("localserve-handler")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        Ok(Self {
            transport: Transport::new(Arc::new(router)),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Loads the site described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let router = site::router(config)?;
        Self::new(router, config.worker_threads())
    }

    /// Fetches `url` and reads the whole body, blocking the calling thread.
    ///
    /// Only malformed URLs fail; every routed or unrouted request produces a
    /// page, 4xx/5xx included.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async context. Use
    /// [`fetch`](Self::fetch) there.
    pub fn serve(&self, url: &str) -> Result<Page, Error> {
        self.handle.block_on(self.fetch(url))
    }

    /// Async form of [`serve`](Self::serve). Handlers still run on the
    /// bridge's own runtime.
    pub async fn fetch(&self, url: &str) -> Result<Page, Error> {
        let transport = self.transport.clone();
        let url = url.to_owned();
        let page = self
            .handle
            .spawn(async move {
                let response = transport.get(&url).await?;
                Ok::<_, Error>(Page::read(response).await)
            })
            .await
            .map_err(|_| Error::Aborted)??;
        debug!(status = %page.status, len = page.body.len(), "page fetched");
        Ok(page)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

// ── Process-wide bridge ───────────────────────────────────────────────────────

static BRIDGE: OnceLock<Bridge> = OnceLock::new();
static INIT: Mutex<()> = Mutex::new(());

/// Sets up the process-wide bridge from `config`.
///
/// A no-op if it is already set up. Concurrent callers serialize; exactly
/// one bridge is ever built. A failure leaves nothing installed, so a later
/// call may try again.
pub fn init(config: Config) -> Result<(), Error> {
    global_with(|| Ok(config)).map(|_| ())
}

/// Fetches `url` through the process-wide bridge.
///
/// Sets the bridge up from the environment ([`Config::from_env`]) if
/// [`init`] was never called.
pub fn serve(url: &str) -> Result<Page, Error> {
    global_with(|| Ok(Config::from_env()?))?.serve(url)
}

fn global_with(config: impl FnOnce() -> Result<Config, Error>) -> Result<&'static Bridge, Error> {
    if let Some(bridge) = BRIDGE.get() {
        return Ok(bridge);
    }

    let _guard = INIT.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(bridge) = BRIDGE.get() {
        return Ok(bridge);
    }

    let config = config()?;
    let bridge = Bridge::from_config(&config)?;
    info!(
        assets = %config.assets().display(),
        archive = ?config.archive(),
        workers = config.worker_threads(),
        "bridge ready"
    );
    Ok(BRIDGE.get_or_init(|| bridge))
}
