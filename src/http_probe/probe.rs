use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use url::Url;

use super::prelude::*;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_0_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-GB,en-US;q=0.9,en;q=0.8,nl;q=0.7";

/// Headers of a probed response. The body is never read.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
}

/// Issues the single outbound request of a check.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Sends one GET to `url`. Fails with [`ProbeError::Timeout`] when no
    /// response headers arrive within `timeout`.
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ProbeResponse, ProbeError>;
}

/// Races `request` against a timer. The losing future is dropped, so a late
/// response is discarded without anything left to write it back to.
pub async fn with_deadline<F>(request: F, timeout: Duration) -> Result<ProbeResponse, ProbeError>
where
    F: Future<Output = Result<ProbeResponse, ProbeError>>,
{
    tokio::select! {
        result = request => result,
        _ = tokio::time::sleep(timeout) => Err(ProbeError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Request headers that make the probe look like a desktop browser
/// navigation, so edges don't answer with a bot challenge instead.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
        // `send` resolves once the status line and headers are in.
        let response = self
            .client
            .get(url.clone())
            .headers(browser_headers())
            .send()
            .await
            .map_err(|e| ProbeError::Network(Box::new(e)))?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ProbeResponse, ProbeError> {
        log::debug!("Probing {url} (timeout {}ms)", timeout.as_millis());
        with_deadline(self.send(url), timeout).await
    }
}
