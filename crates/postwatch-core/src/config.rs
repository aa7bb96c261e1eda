use std::{env, path::PathBuf, time::Duration};

use crate::{domain::Handle, errors::Error, Result};

const DEFAULT_HANDLE: &str = "replicate";
const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";
const DEFAULT_PROFILE_BASE_URL: &str = "https://x.com";
const DEFAULT_READER_PROXY_URL: &str = "https://r.jina.ai/";

/// Where notifications go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Slack Web API `chat.postMessage` with a bot token.
    WebApi {
        token: String,
        channel: String,
        api_url: String,
    },
    /// Slack incoming webhook.
    Webhook { url: String },
}

/// Typed configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub handle: Handle,
    pub destination: Destination,
    pub unfurl_links: bool,

    // Behavior flags
    pub verbose: bool,
    pub force_send: bool,
    pub skip_first_run: bool,

    pub state_file: PathBuf,

    // Fetching
    pub profile_base_url: String,
    pub reader_proxy_url: String,
    pub proxy_timeout: Duration,
    pub browser_fallback: bool,
    pub browser_timeout: Duration,
    pub chrome_path: Option<PathBuf>,
}

impl Config {
    /// Read `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        // Existing env vars win over `.env`.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let handle = Handle::parse(&get("X_HANDLE").unwrap_or_else(|| DEFAULT_HANDLE.to_string()))?;
        let destination = destination(&get)?;
        let unfurl_links = env_bool(&get, "UNFURL_LINKS")?.unwrap_or(true);

        let verbose = env_bool(&get, "DEBUG")?.unwrap_or(false);
        let force_send = env_bool(&get, "FORCE_SEND")?.unwrap_or(false);
        let skip_first_run = env_bool(&get, "SKIP_FIRST_RUN")?.unwrap_or(false);

        let state_file = PathBuf::from(get("STATE_FILE").unwrap_or_else(|| "state.json".to_string()));

        let profile_base_url = get("PROFILE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PROFILE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let reader_proxy_url = format!(
            "{}/",
            get("READER_PROXY_URL")
                .unwrap_or_else(|| DEFAULT_READER_PROXY_URL.to_string())
                .trim_end_matches('/')
        );
        let proxy_timeout = Duration::from_secs(env_u64(&get, "PROXY_TIMEOUT_SECS")?.unwrap_or(30));
        let browser_fallback = env_bool(&get, "BROWSER_FALLBACK")?.unwrap_or(true);
        let browser_timeout =
            Duration::from_secs(env_u64(&get, "BROWSER_TIMEOUT_SECS")?.unwrap_or(60));
        let chrome_path = get("CHROME_PATH").map(PathBuf::from);

        Ok(Self {
            handle,
            destination,
            unfurl_links,
            verbose,
            force_send,
            skip_first_run,
            state_file,
            profile_base_url,
            reader_proxy_url,
            proxy_timeout,
            browser_fallback,
            browser_timeout,
            chrome_path,
        })
    }
}

fn destination(get: &impl Fn(&str) -> Option<String>) -> Result<Destination> {
    if let Some(token) = get("SLACK_BOT_TOKEN") {
        let channel = get("SLACK_CHANNEL").ok_or_else(|| {
            Error::Config("SLACK_CHANNEL is required when SLACK_BOT_TOKEN is set".to_string())
        })?;
        let api_url = get("SLACK_API_URL").unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string());
        return Ok(Destination::WebApi {
            token,
            channel,
            api_url,
        });
    }

    if let Some(url) = get("SLACK_WEBHOOK") {
        return Ok(Destination::Webhook { url });
    }

    Err(Error::Config(
        "set SLACK_BOT_TOKEN and SLACK_CHANNEL, or SLACK_WEBHOOK".to_string(),
    ))
}

fn env_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

fn env_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a whole number, got {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
