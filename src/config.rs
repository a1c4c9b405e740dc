//! Bridge configuration.
//!
//! Read from the environment by the process-wide façade, or built directly
//! by hosts that embed a [`Bridge`](crate::Bridge).

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod localserve_env {
    pub const ASSETS: &str = "LOCALSERVE_ASSETS";
    pub const ARCHIVE: &str = "LOCALSERVE_ARCHIVE";
    pub const ARCHIVE_ROOT: &str = "LOCALSERVE_ARCHIVE_ROOT";
    pub const WORKERS: &str = "LOCALSERVE_WORKERS";
    pub const CHUNK_SIZE: &str = "LOCALSERVE_CHUNK_SIZE";
}

const DEFAULT_ASSETS: &str = "assets";
const DEFAULT_WORKERS: usize = 2;
const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    assets: PathBuf,
    archive: Option<PathBuf>,
    archive_root: String,
    worker_threads: usize,
    chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: PathBuf::from(DEFAULT_ASSETS),
            archive: None,
            archive_root: String::new(),
            worker_threads: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Directory holding the packaged site, mounted at `/`. Ignored when an
    /// [`archive`](Self::archive) is set.
    pub fn assets(&self) -> &Path {
        &self.assets
    }

    /// Zip archive holding the packaged site, if the site ships as one.
    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    /// Directory inside the archive that is mounted at `/`. Empty for the
    /// whole archive.
    pub fn archive_root(&self) -> &str {
        &self.archive_root
    }

    /// Runtime threads available to handler tasks.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Largest body chunk the file server hands to the pipe at once.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn with_assets(mut self, assets: impl Into<PathBuf>) -> Self {
        self.assets = assets.into();
        self
    }

    pub fn with_archive(mut self, archive: impl Into<PathBuf>, root: &str) -> Self {
        self.archive = Some(archive.into());
        self.archive_root = root.to_owned();
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    /// Reads `LOCALSERVE_*` variables; unset ones keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(assets) = lookup(localserve_env::ASSETS) {
            config.assets = PathBuf::from(assets);
        }
        if let Some(archive) = lookup(localserve_env::ARCHIVE) {
            config.archive = Some(PathBuf::from(archive));
        }
        if let Some(root) = lookup(localserve_env::ARCHIVE_ROOT) {
            config.archive_root = root;
        }
        if let Some(raw) = lookup(localserve_env::WORKERS) {
            config.worker_threads = parse_positive(localserve_env::WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(localserve_env::CHUNK_SIZE) {
            config.chunk_size = parse_positive(localserve_env::CHUNK_SIZE, &raw)?;
        }
        Ok(config)
    }
}

fn parse_positive(param_name: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidParameterType {
            param_name: param_name.to_owned(),
            expected: "positive integer".to_owned(),
            found: raw.to_owned(),
        }),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {found:?} for {param_name}, expected {expected}")]
    InvalidParameterType {
        param_name: String,
        expected: String,
        found: String,
    },

    #[error("asset directory {0:?} does not exist")]
    MissingDirectory(PathBuf),

    #[error("asset archive {0:?} does not exist")]
    MissingArchive(PathBuf),
}
