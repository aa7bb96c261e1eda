//! Readability-proxy fetcher (primary strategy).
//!
//! Asks a reader service such as `r.jina.ai` for a text rendering of the profile page
//! and pulls the newest post id out of it. No JavaScript runs on our side.

use std::time::Duration;

use async_trait::async_trait;

use postwatch_core::{
    config::Config,
    domain::{profile_url, Handle, PostId},
    errors::Error,
    extract::latest_post_id,
    ports::{FetchResult, FetchStrategy},
    Result,
};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; postwatch/0.1)";

#[derive(Clone, Debug)]
pub struct ReaderProxyFetcher {
    proxy_url: String,
    profile_base_url: String,
    http: reqwest::Client,
}

impl ReaderProxyFetcher {
    pub fn new(
        proxy_url: impl Into<String>,
        profile_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("reader proxy client build: {e}")))?;
        Ok(Self {
            proxy_url: normalize_prefix(&proxy_url.into()),
            profile_base_url: profile_base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.reader_proxy_url.clone(),
            cfg.profile_base_url.clone(),
            cfg.proxy_timeout,
        )
    }

    /// Proxy URL that renders the profile of `handle`.
    pub fn request_url(&self, handle: &Handle) -> String {
        format!(
            "{}{}",
            self.proxy_url,
            profile_url(&self.profile_base_url, handle)
        )
    }

    async fn try_fetch(&self, handle: &Handle) -> Result<PostId> {
        let url = self.request_url(handle);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::External(format!("reader proxy request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(format!(
                "reader proxy returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("reader proxy body error: {e}")))?;
        if body.trim().is_empty() {
            return Err(Error::External("reader proxy returned an empty body".to_string()));
        }
        tracing::debug!(bytes = body.len(), "reader proxy body received");

        latest_post_id(&body, Some(handle))
            .ok_or_else(|| Error::External("no post id in reader proxy body".to_string()))
    }
}

/// Exactly one `/` between the proxy and the profile URL it renders.
fn normalize_prefix(proxy_url: &str) -> String {
    format!("{}/", proxy_url.trim_end_matches('/'))
}

#[async_trait]
impl FetchStrategy for ReaderProxyFetcher {
    fn name(&self) -> &'static str {
        "reader-proxy"
    }

    async fn fetch(&self, handle: &Handle) -> FetchResult {
        match self.try_fetch(handle).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(%handle, error = %e, "reader proxy fetch unavailable");
                None
            }
        }
    }
}
