use std::future::Future;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::info;

use crate::error::ScrapeError;
use crate::settings::Settings;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Something that returns the raw markup behind a URL.
pub trait PageSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, ScrapeError>>;
}

/// Plain GET with browser-like headers and a hard timeout. No retries.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&settings.accept_language)
                .map_err(|e| ScrapeError::Client(format!("accept_language: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Fetch { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ScrapeError::Fetch { url: url.to_string(), source })?;
        info!(
            url,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched source page"
        );
        Ok(body)
    }
}
