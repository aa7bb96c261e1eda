use crate::{
    domain::{Handle, PostId},
    ports::FetchStrategy,
};

/// Ordered fetch strategies; the first one that finds a post id wins.
#[derive(Default)]
pub struct FetchChain {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FetchChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl FetchStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn push(&mut self, strategy: Box<dyn FetchStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Latest post id and the name of the strategy that found it.
    pub async fn latest(&self, handle: &Handle) -> Option<(PostId, &'static str)> {
        for strategy in &self.strategies {
            let name = strategy.name();
            tracing::debug!(strategy = name, %handle, "fetching latest post");
            match strategy.fetch(handle).await {
                Some(id) => {
                    tracing::info!(strategy = name, %id, "latest post found");
                    return Some((id, name));
                }
                None => tracing::info!(strategy = name, "no post id; trying next strategy"),
            }
        }
        None
    }
}
