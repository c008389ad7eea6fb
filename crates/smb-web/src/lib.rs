//! HTTP page fetcher for article summaries.

use std::time::Duration;

use async_trait::async_trait;
use smb_core::{errors::Error, ports::PageFetcher, Result};

/// Sites that block unknown clients usually accept a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

#[derive(Clone, Debug)]
pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.http.get(url).send().await.map_err(|e| {
            tracing::debug!(url, "fetch failed: {e}");
            Error::External(format!("request failed: {e}"))
        })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Http {
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| Error::External(format!("could not read response body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_page_with_browser_user_agent() {
        let server = MockServer::start_async().await;
        let page = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/story")
                    .header("user-agent", BROWSER_USER_AGENT);
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<p>hello</p>");
            })
            .await;

        let body = fetcher().fetch(&server.url("/story")).await.unwrap();
        assert_eq!(body, "<p>hello</p>");
        page.assert_async().await;
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(301).header("location", "/new");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200).body("moved here");
            })
            .await;

        let body = fetcher().fetch(&server.url("/old")).await.unwrap();
        assert_eq!(body, "moved here");
    }

    #[tokio::test]
    async fn non_ok_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/paywall");
                then.status(403);
            })
            .await;

        let err = fetcher().fetch(&server.url("/paywall")).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not fetch URL (Status: 403)");
    }

    #[tokio::test]
    async fn connection_failure_is_external() {
        let err = fetcher()
            .fetch("http://127.0.0.1:1/unreachable")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
    }
}
