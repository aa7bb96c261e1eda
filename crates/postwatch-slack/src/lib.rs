//! Slack adapter.
//!
//! Implements the `postwatch-core` Notifier port over either the Web API
//! (`chat.postMessage`, bearer token) or an incoming webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use postwatch_core::{
    config::{Config, Destination},
    errors::Error,
    notification::Notification,
    ports::Notifier,
    Result,
};

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    text: String,
    unfurl_links: bool,
    unfurl_media: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Result of a single HTTP attempt that did not fail outright.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Delivered,
    RateLimited(Duration),
}

#[derive(Clone, Debug)]
pub struct SlackNotifier {
    destination: Destination,
    unfurl_links: bool,
    http: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(destination: Destination, unfurl_links: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("slack client build: {e}")))?;
        Ok(Self {
            destination,
            unfurl_links,
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.destination.clone(), cfg.unfurl_links)
    }

    fn payload<'a>(&'a self, notification: &Notification) -> PostMessage<'a> {
        let channel = match &self.destination {
            Destination::WebApi { channel, .. } => Some(channel.as_str()),
            Destination::Webhook { .. } => None,
        };
        PostMessage {
            channel,
            text: notification.text(),
            unfurl_links: self.unfurl_links,
            unfurl_media: self.unfurl_links,
        }
    }

    async fn send_once(&self, notification: &Notification) -> Result<Attempt> {
        let payload = self.payload(notification);
        let req = match &self.destination {
            Destination::WebApi { token, api_url, .. } => {
                self.http.post(api_url).bearer_auth(token).json(&payload)
            }
            Destination::Webhook { url } => self.http.post(url).json(&payload),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("slack request error: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited(retry_after(resp.headers())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("slack body error: {e}")))?;

        match &self.destination {
            Destination::WebApi { .. } => check_api_response(status, &body)?,
            Destination::Webhook { .. } => check_webhook_response(status, &body)?,
        }
        Ok(Attempt::Delivered)
    }
}

/// `Retry-After` in whole seconds, defaulted when absent or unparseable and capped.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}

fn check_api_response(status: StatusCode, body: &str) -> Result<()> {
    let parsed: ApiResponse = serde_json::from_str(body).map_err(|e| {
        Error::Rejected(format!(
            "unparseable slack response ({status}): {e}: {}",
            body.chars().take(200).collect::<String>()
        ))
    })?;
    if !parsed.ok {
        return Err(Error::Rejected(format!(
            "slack api error ({status}): {}",
            parsed.error.as_deref().unwrap_or("unknown_error")
        )));
    }
    if !status.is_success() {
        return Err(Error::Rejected(format!("slack returned {status} with ok=true")));
    }
    Ok(())
}

fn check_webhook_response(status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() && body.trim() == "ok" {
        return Ok(());
    }
    Err(Error::Rejected(format!(
        "slack webhook error ({status}): {}",
        body.chars().take(200).collect::<String>()
    )))
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match self.send_once(notification).await? {
                Attempt::Delivered => {
                    tracing::info!(link = %notification.link, "slack notification delivered");
                    return Ok(());
                }
                Attempt::RateLimited(wait) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::warn!(?wait, "slack rate limited; retrying once");
                    sleep(wait).await;
                }
                Attempt::RateLimited(wait) => {
                    tracing::error!(?wait, "slack still rate limited after retry");
                    return Err(Error::RateLimited { retry_after: wait });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postwatch_core::domain::{Handle, PostId};
    use postwatch_core::testing::{StubResponse, StubServer};
    use serde_json::json;

    fn notification() -> Notification {
        let handle = Handle::parse("replicate").unwrap();
        Notification::for_post("https://x.com", &handle, PostId::new(1_812_345_678_901_234_567))
    }

    fn web_api(server: &StubServer) -> SlackNotifier {
        SlackNotifier::new(
            Destination::WebApi {
                token: "xoxb-test".to_string(),
                channel: "C0123".to_string(),
                api_url: server.url("/api/chat.postMessage"),
            },
            true,
        )
        .unwrap()
    }

    fn webhook(server: &StubServer) -> SlackNotifier {
        SlackNotifier::new(
            Destination::Webhook {
                url: server.url("/services/T/B/x"),
            },
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn web_api_posts_with_bearer_auth_and_channel() {
        let server = StubServer::start(vec![StubResponse::json(200, &json!({"ok": true}))]).await;
        web_api(&server).notify(&notification()).await.unwrap();

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].path, "/api/chat.postMessage");
        assert_eq!(reqs[0].header("authorization"), Some("Bearer xoxb-test"));

        let body: serde_json::Value = serde_json::from_str(&reqs[0].body).unwrap();
        assert_eq!(body["channel"], "C0123");
        assert_eq!(body["unfurl_links"], true);
        assert_eq!(body["unfurl_media"], true);
        assert_eq!(
            body["text"],
            "🐦 New post from @replicate\nhttps://x.com/replicate/status/1812345678901234567"
        );
    }

    #[tokio::test]
    async fn ok_false_with_http_200_is_an_error() {
        let server = StubServer::start(vec![StubResponse::json(
            200,
            &json!({"ok": false, "error": "channel_not_found"}),
        )])
        .await;
        let err = web_api(&server).notify(&notification()).await.unwrap_err();
        match err {
            Error::Rejected(msg) => assert!(msg.contains("channel_not_found"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = StubServer::start(vec![StubResponse::new(200, "<html>oops</html>")]).await;
        let err = web_api(&server).notify(&notification()).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[tokio::test]
    async fn rate_limit_then_success_delivers_once() {
        let server = StubServer::start(vec![
            StubResponse::new(429, "").header("Retry-After", "2"),
            StubResponse::json(200, &json!({"ok": true})),
        ])
        .await;

        let started = std::time::Instant::now();
        web_api(&server).notify(&notification()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn second_rate_limit_is_not_retried() {
        let server = StubServer::start(vec![
            StubResponse::new(429, "").header("Retry-After", "1"),
            StubResponse::new(429, "").header("Retry-After", "1"),
            StubResponse::json(200, &json!({"ok": true})),
        ])
        .await;

        let err = web_api(&server).notify(&notification()).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn webhook_posts_text_without_channel() {
        let server = StubServer::start(vec![StubResponse::new(200, "ok")]).await;
        webhook(&server).notify(&notification()).await.unwrap();

        let reqs = server.requests();
        assert_eq!(reqs[0].path, "/services/T/B/x");
        assert_eq!(reqs[0].header("authorization"), None);
        let body: serde_json::Value = serde_json::from_str(&reqs[0].body).unwrap();
        assert!(body.get("channel").is_none());
        assert_eq!(body["unfurl_links"], false);
    }

    #[tokio::test]
    async fn webhook_rate_limit_then_ok_delivers_once() {
        let server = StubServer::start(vec![
            StubResponse::new(429, "rate_limited").header("Retry-After", "1"),
            StubResponse::new(200, "ok"),
        ])
        .await;

        let started = std::time::Instant::now();
        webhook(&server).notify(&notification()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        let reqs = server.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].body, reqs[1].body);
    }

    #[tokio::test]
    async fn webhook_error_body_is_an_error() {
        let server = StubServer::start(vec![StubResponse::new(404, "no_service")]).await;
        let err = webhook(&server).notify(&notification()).await.unwrap_err();
        match err {
            Error::Rejected(msg) => assert!(msg.contains("no_service"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn retry_after_defaults_and_caps() {
        use reqwest::header::{HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Duration::from_secs(3));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(retry_after(&headers), MAX_RETRY_AFTER);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER);
    }
}
