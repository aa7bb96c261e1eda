use crate::domain::{post_url, Handle, PostId};

/// Escape the characters Slack treats as control sequences in mrkdwn text.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A message announcing one post. Built per send, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub handle: Handle,
    pub post_id: PostId,
    pub link: String,
    pub headline: String,
}

impl Notification {
    pub fn for_post(profile_base_url: &str, handle: &Handle, post_id: PostId) -> Self {
        Self {
            handle: handle.clone(),
            post_id,
            link: post_url(profile_base_url, handle, post_id),
            headline: format!("🐦 New post from @{handle}"),
        }
    }

    /// Message body: escaped headline, then the bare link so the client unfurls it.
    pub fn text(&self) -> String {
        format!("{}\n{}", escape_mrkdwn(&self.headline), self.link)
    }
}
