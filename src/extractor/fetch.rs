use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::Duration;

use crate::Result;

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Dumb HTTP GET primitive. Retry, backoff, and User-Agent rotation live in
/// the extractor pipeline, not here.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, user_agent: &str, timeout: Duration) -> Result<PageResponse>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().gzip(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, user_agent: &str, timeout: Duration) -> Result<PageResponse> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(PageResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success_range() {
        let ok = PageResponse {
            status: 200,
            body: "<html></html>".to_string(),
        };
        let not_found = PageResponse {
            status: 404,
            body: String::new(),
        };
        let redirect = PageResponse {
            status: 301,
            body: String::new(),
        };

        assert!(ok.is_success());
        assert!(!not_found.is_success());
        assert!(!redirect.is_success());
    }
}
