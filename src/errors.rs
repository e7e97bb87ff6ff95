// src/errors.rs

//! Error types shared across the crate.
//!
//! The watch core does not interpret fetch failures; it only relays them.
//! The one error it raises itself is `UnsupportedScheme`, produced at
//! dispatch time when a URI names a scheme nothing was registered for.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by loading or watching a URI.
#[derive(Debug, Error)]
pub enum Error {
    /// The URI's scheme has no registered fetcher. Fails fast, never retried.
    #[error("scheme {scheme:?} is not supported")]
    UnsupportedScheme { scheme: String },

    /// A fetcher is already registered for this scheme. Registration is a
    /// configuration-time operation and never silently overwrites.
    #[error("scheme {scheme:?} already has a registered fetcher")]
    SchemeAlreadyRegistered { scheme: String },

    /// The URI could not be parsed at all.
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// A single poll attempt exceeded its bounded sub-deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Filesystem-level failure from the `file://` backend.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Transport-level failure from the HTTP backend.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
