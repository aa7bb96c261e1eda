//! Check-and-notify run: load state, fetch, decide, notify, persist.

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{Handle, PostId},
    fetch::FetchChain,
    notification::Notification,
    ports::Notifier,
    state::StateStore,
    Result,
};

/// Pipeline knobs taken from [`Config`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub handle: Handle,
    pub profile_base_url: String,
    pub force_send: bool,
    pub skip_first_run: bool,
}

impl From<&Config> for RunOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            handle: cfg.handle.clone(),
            profile_base_url: cfg.profile_base_url.clone(),
            force_send: cfg.force_send,
            skip_first_run: cfg.skip_first_run,
        }
    }
}

/// What a single run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No strategy could determine the latest post. Nothing written or sent.
    Unavailable,
    /// Latest post equals the saved one. Nothing written or sent.
    Unchanged(PostId),
    /// First run with suppression on: saved without notifying.
    Baseline(PostId),
    /// Notified, then saved.
    Notified(PostId),
}

pub struct Pipeline {
    opts: RunOptions,
    fetchers: FetchChain,
    notifier: Arc<dyn Notifier>,
    state: StateStore,
}

impl Pipeline {
    pub fn new(
        opts: RunOptions,
        fetchers: FetchChain,
        notifier: Arc<dyn Notifier>,
        state: StateStore,
    ) -> Self {
        Self {
            opts,
            fetchers,
            notifier,
            state,
        }
    }

    /// Run one check.
    ///
    /// Only notification and state-save failures are returned as errors. State is
    /// saved strictly after a successful notification.
    pub async fn run(&self) -> Result<RunOutcome> {
        let handle = &self.opts.handle;
        let previous = self.state.load();
        tracing::debug!(%handle, previous = ?previous.map(|id| id.to_string()), "starting check");

        let Some((latest, source)) = self.fetchers.latest(handle).await else {
            tracing::warn!(%handle, "could not determine latest post; will retry next run");
            return Ok(RunOutcome::Unavailable);
        };

        if !self.opts.force_send {
            match previous {
                Some(prev) if prev == latest => {
                    tracing::info!(%latest, "no new post");
                    return Ok(RunOutcome::Unchanged(latest));
                }
                Some(prev) if latest < prev => {
                    tracing::warn!(
                        %latest,
                        %prev,
                        "latest post id is older than the saved one; ids may no longer be increasing"
                    );
                }
                None if self.opts.skip_first_run => {
                    self.state.save(latest)?;
                    tracing::info!(%latest, "first run: saved baseline without notifying");
                    return Ok(RunOutcome::Baseline(latest));
                }
                _ => {}
            }
        }

        let notification = Notification::for_post(&self.opts.profile_base_url, handle, latest);
        tracing::info!(%latest, source, link = %notification.link, force = self.opts.force_send, "sending notification");
        self.notifier.notify(&notification).await?;

        self.state.save(latest)?;
        tracing::info!(%latest, "notified and saved");
        Ok(RunOutcome::Notified(latest))
    }
}
