//! Headless-browser fetcher (fallback strategy).
//!
//! Renders the profile page in a throwaway Chromium (JavaScript on, network-idle
//! wait) and runs the same extraction as the proxy path. Used when the reader proxy
//! has nothing to offer.

use anyhow::Context;
use async_trait::async_trait;

use postwatch_core::{
    config::Config,
    domain::{profile_url, Handle, PostId},
    extract::latest_post_id,
    ports::{FetchResult, FetchStrategy},
};

mod session;

pub use session::{BrowserSession, LaunchOptions};

#[derive(Clone, Debug)]
pub struct BrowserFetcher {
    opts: LaunchOptions,
    profile_base_url: String,
}

impl BrowserFetcher {
    pub fn new(opts: LaunchOptions, profile_base_url: impl Into<String>) -> Self {
        Self {
            opts,
            profile_base_url: profile_base_url.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            LaunchOptions {
                chrome_path: cfg.chrome_path.clone(),
                timeout: cfg.browser_timeout,
            },
            cfg.profile_base_url.clone(),
        )
    }

    async fn try_fetch(&self, handle: &Handle) -> anyhow::Result<PostId> {
        let url = profile_url(&self.profile_base_url, handle);

        let session = BrowserSession::launch(&self.opts).await?;
        let rendered = session.render(&url, self.opts.timeout).await;
        session.close().await;

        let html = rendered?;
        tracing::debug!(bytes = html.len(), "rendered page captured");
        latest_post_id(&html, Some(handle)).context("no post id in rendered page")
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetcher {
    fn name(&self) -> &'static str {
        "headless-browser"
    }

    async fn fetch(&self, handle: &Handle) -> FetchResult {
        match self.try_fetch(handle).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(%handle, error = %format_args!("{e:#}"), "browser fetch unavailable");
                None
            }
        }
    }
}
