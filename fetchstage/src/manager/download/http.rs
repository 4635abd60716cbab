//! HTTP range fetcher built on the blocking reqwest client.
//!
//! The fetcher only issues the request and exposes status, length headers and
//! the body stream. Deciding what to do with a `200` versus a `206` is left to
//! the downloader.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use tracing::debug;

use crate::manager::config::DEFAULT_TIMEOUT_SECS;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::RangeFetcher;

/// Parsed `Content-Range` header (`bytes <start>-<end>/<total>` or `bytes */<total>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte of the returned range; `None` for the unsatisfied form.
    pub start: Option<u64>,
    /// Complete entity length, if the server disclosed it.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parse a `Content-Range` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = rest.split_once('/')?;

        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse::<u64>().ok()?),
        };

        let start = match range.trim() {
            "*" => None,
            r => {
                let (start, end) = r.split_once('-')?;
                let start = start.trim().parse::<u64>().ok()?;
                let end = end.trim().parse::<u64>().ok()?;
                if end < start {
                    return None;
                }
                Some(start)
            }
        };

        Some(Self { start, total })
    }
}

/// Response to a ranged GET: headers are read, the body is still on the wire.
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Length` of this response, i.e. the remaining bytes.
    pub content_length: Option<u64>,
    /// Parsed `Content-Range`, when present and well-formed.
    pub content_range: Option<ContentRange>,
    /// Streaming response body.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

/// Ranged GET over HTTP(S).
#[derive(Debug)]
pub struct HttpRangeFetcher {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpRangeFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> ManagerResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> ManagerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> ManagerError {
        if e.is_timeout() {
            ManagerError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ManagerError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl RangeFetcher for HttpRangeFetcher {
    fn fetch_from(&self, url: &str, offset: u64) -> ManagerResult<RangeResponse> {
        debug!(url, offset, "Requesting range");

        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-", offset))
            .send()
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status().as_u16();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentRange::parse);
        let content_length = response.content_length();

        debug!(url, status, ?content_length, ?content_range, "Response headers");

        Ok(RangeResponse {
            status,
            content_length,
            content_range,
            body: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_satisfied_range() {
        let range = ContentRange::parse("bytes 400000-999999/1000000").unwrap();
        assert_eq!(range.start, Some(400_000));
        assert_eq!(range.total, Some(1_000_000));
    }

    #[test]
    fn test_parse_unknown_total() {
        let range = ContentRange::parse("bytes 10-19/*").unwrap();
        assert_eq!(range.start, Some(10));
        assert_eq!(range.total, None);
    }

    #[test]
    fn test_parse_unsatisfied_range() {
        let range = ContentRange::parse("bytes */1000").unwrap();
        assert_eq!(range.start, None);
        assert_eq!(range.total, Some(1000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ContentRange::parse("items 0-1/2").is_none());
        assert!(ContentRange::parse("bytes 9-1/20").is_none());
        assert!(ContentRange::parse("bytes a-b/c").is_none());
        assert!(ContentRange::parse("").is_none());
    }

    #[test]
    fn test_fetcher_timeout() {
        let fetcher = HttpRangeFetcher::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(fetcher.timeout.as_secs(), 60);
    }

    #[test]
    fn test_fetcher_default_timeout() {
        let fetcher = HttpRangeFetcher::new().unwrap();
        assert_eq!(fetcher.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        let fetcher = HttpRangeFetcher::with_timeout(Duration::from_secs(5)).unwrap();
        // Nothing listens on the discard port locally
        let err = fetcher.fetch_from("http://127.0.0.1:9/a.zip", 0).unwrap_err();
        assert!(err.is_network());
    }
}
