use std::sync::Arc;

use postwatch_browser::BrowserFetcher;
use postwatch_core::{
    config::Config,
    fetch::FetchChain,
    pipeline::{Pipeline, RunOptions, RunOutcome},
    state::StateStore,
};
use postwatch_proxy::ReaderProxyFetcher;
use postwatch_slack::SlackNotifier;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), postwatch_core::Error> {
    let cfg = Config::load()?;
    postwatch_core::logging::init("postwatch", cfg.verbose)?;

    let mut fetchers = FetchChain::new().with(ReaderProxyFetcher::from_config(&cfg)?);
    if cfg.browser_fallback {
        fetchers.push(Box::new(BrowserFetcher::from_config(&cfg)));
    }

    let notifier = Arc::new(SlackNotifier::from_config(&cfg)?);
    let state = StateStore::new(cfg.state_file.clone());
    let pipeline = Pipeline::new(RunOptions::from(&cfg), fetchers, notifier, state);

    match pipeline.run().await {
        Ok(outcome) => {
            match outcome {
                RunOutcome::Unavailable => tracing::info!("done: latest post unavailable"),
                RunOutcome::Unchanged(id) => tracing::info!(%id, "done: nothing new"),
                RunOutcome::Baseline(id) => tracing::info!(%id, "done: baseline saved"),
                RunOutcome::Notified(id) => tracing::info!(%id, "done: notified"),
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "check failed");
            Err(e)
        }
    }
}
