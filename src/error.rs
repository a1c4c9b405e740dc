//! Unified error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// The error type returned by localserve's fallible operations.
///
/// Application-level errors (404, 500, etc.) are expressed as HTTP
/// responses, not as `Error`s. This type surfaces the few things that can
/// go wrong outside a handler: a URL that cannot be turned into a request,
/// or a bridge that could not be set up.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("loading {}: {source}", path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The handler task went away without producing a status line.
    #[error("handler aborted before sending a response head")]
    Aborted,
}

impl Error {
    pub(crate) fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl { url: url.to_owned(), reason: reason.to_string() }
    }
}
