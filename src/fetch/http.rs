// src/fetch/http.rs

//! `http://` / `https://` backend: conditional downloads driven by the
//! `If-Modified-Since` / `Last-Modified` header pair.
//!
//! A HEAD request probes for freshness first so an unchanged resource never
//! costs a full body transfer. Servers that ignore `If-Modified-Since` are
//! handled by comparing `Last-Modified` locally.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use tracing::debug;
use url::Url;

use crate::errors::Result;
use crate::fetch::ConditionalFetcher;

/// RFC 7231 HTTP-date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Fetches resources over HTTP(S) with conditional-request semantics.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConditionalFetcher for HttpFetcher {
    async fn fetch_if(&self, uri: &Url, updated_since: DateTime<Utc>) -> Result<Option<Bytes>> {
        let head = self
            .client
            .head(uri.clone())
            .header(IF_MODIFIED_SINCE, format_http_date(updated_since))
            .send()
            .await?;

        if head.status() == StatusCode::NOT_MODIFIED {
            debug!(%uri, "server reported 304, skipping download");
            return Ok(None);
        }

        // Some servers answer 200 to HEAD regardless; fall back to comparing
        // Last-Modified ourselves. An unparseable header means "download".
        if let Some(last_modified) = head
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            && last_modified.timestamp() <= updated_since.timestamp()
        {
            debug!(%uri, %last_modified, "not modified since last fetch");
            return Ok(None);
        }

        let body = self
            .client
            .get(uri.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(Some(body))
    }
}

fn format_http_date(t: DateTime<Utc>) -> String {
    t.format(HTTP_DATE).to_string()
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, HTTP_DATE)
        .ok()
        .map(|naive| naive.and_utc())
}
