use async_trait::async_trait;

use crate::{
    domain::{Handle, PostId},
    notification::Notification,
    Result,
};

/// `Some(id)` when the latest post could be determined, `None` when it could not.
///
/// `None` is not "no new post"; it means this strategy had nothing to say.
pub type FetchResult = Option<PostId>;

/// One way of finding the newest post on a profile page.
///
/// Implementations never fail: every error is logged and reported as `None` so the
/// next strategy gets a turn.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, handle: &Handle) -> FetchResult;
}

/// Hexagonal port for delivering a post notification.
///
/// Errors propagate: a notification that did not go through must never be recorded
/// as delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}
