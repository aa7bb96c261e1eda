use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{errors::Error, Result};

/// Numeric post identifier (the `/status/<id>` part of a post URL).
///
/// Ordering is by numeric value, so `9 < 10` even though `"9" > "10"` as strings.
/// Serialized as a decimal string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId(u64);

impl PostId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Parse a run of ASCII digits. Returns `None` for anything else, including
    /// values that overflow `u64`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u64>().ok().map(Self)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::External(format!("not a post id: {s:?}")))
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PostId::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid post id {raw:?}")))
    }
}

/// Account handle without the leading `@`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    const MAX_LEN: usize = 15;

    /// Validate an account name (`[A-Za-z0-9_]{1,15}`, optional leading `@`).
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        let name = name.strip_prefix('@').unwrap_or(name);

        if name.is_empty() {
            return Err(Error::Config("handle must not be empty".to_string()));
        }
        if name.len() > Self::MAX_LEN {
            return Err(Error::Config(format!(
                "handle {name:?} is longer than {} characters",
                Self::MAX_LEN
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Config(format!(
                "handle {name:?} may only contain letters, digits and '_'"
            )));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile URL for `handle` under `base` (e.g. `https://x.com/replicate`).
pub fn profile_url(base: &str, handle: &Handle) -> String {
    format!("{}/{}", base.trim_end_matches('/'), handle)
}

/// Canonical post URL (e.g. `https://x.com/replicate/status/123`).
pub fn post_url(base: &str, handle: &Handle, id: PostId) -> String {
    format!("{}/status/{id}", profile_url(base, handle))
}
