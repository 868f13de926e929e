#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for modsite
//!
//! This crate handles all HTTP operations against the module proxy and the
//! external task dispatcher, with connection pooling and retry logic.

mod client;

pub use client::{check_status, NetClient, NetConfig};

use bytes::Bytes;
use modsite_errors::{Error, NetworkError};
use modsite_events::{EventEmitter, EventSender};
use url::Url;

/// Fetch text content from a URL
///
/// # Errors
///
/// Returns an error if the HTTP request fails, the server returns an error status,
/// or the response body cannot be decoded as text.
pub async fn fetch_text(
    client: &NetClient,
    url: &str,
    tx: Option<&EventSender>,
) -> Result<String, Error> {
    if let Some(tx) = tx {
        tx.emit_debug(format!("Fetching text from {url}"));
    }

    let response = check_status(client.get(url).await?)?;

    response
        .text()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()).into())
}

/// Fetch binary content from a URL, refusing bodies larger than `limit`
///
/// # Errors
///
/// Returns an error if the HTTP request fails, the server returns an error status,
/// or the body exceeds `limit` bytes.
pub async fn fetch_bytes(
    client: &NetClient,
    url: &str,
    limit: u64,
    tx: Option<&EventSender>,
) -> Result<Bytes, Error> {
    if let Some(tx) = tx {
        tx.emit_debug(format!("Fetching bytes from {url}"));
    }
    client.get_bytes_limited(url, limit).await
}

/// Size of the resource at `url` according to a HEAD request
///
/// Returns `Ok(None)` when the server does not report a length.
///
/// # Errors
///
/// Returns an error if the request fails or the server returns an error status.
pub async fn content_length(client: &NetClient, url: &str) -> Result<Option<u64>, Error> {
    let response = check_status(client.head(url).await?)?;
    Ok(response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok()))
}

/// Parse and validate a URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or invalid according to RFC 3986.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()).into())
}
