// src/fetch/file.rs

//! `file://` backend: conditional reads from the local filesystem.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::errors::Result;
use crate::fetch::ConditionalFetcher;

/// Fetches local files, using the filesystem mtime as the change signal.
#[derive(Debug, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConditionalFetcher for FileFetcher {
    async fn fetch_if(&self, uri: &Url, updated_since: DateTime<Utc>) -> Result<Option<Bytes>> {
        let path = match uri.to_file_path() {
            Ok(path) => path,
            Err(()) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{uri} does not name a local path"),
                )
                .into());
            }
        };

        // Stat first; a missing file is an error, not "unchanged".
        let meta = fs::metadata(&path).await?;
        let modified: DateTime<Utc> = meta.modified()?.into();
        if modified <= updated_since {
            debug!(path = %path.display(), "file unmodified, skipping read");
            return Ok(None);
        }

        let data = fs::read(&path).await?;
        Ok(Some(Bytes::from(data)))
    }
}
