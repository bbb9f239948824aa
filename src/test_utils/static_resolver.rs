use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

use crate::{error::ResolveError, resolver::FinalityResolver};

/// Resolver returning a fixed, adjustable irreversible block.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    inner: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    block: AtomicU64,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticResolver {
    #[must_use]
    pub fn new(block: u64) -> Self {
        let resolver = Self::default();
        resolver.set_block(block);
        resolver
    }

    /// A resolver whose lookups always fail.
    #[must_use]
    pub fn failing() -> Self {
        let resolver = Self::default();
        resolver.inner.failing.store(true, Ordering::SeqCst);
        resolver
    }

    pub fn set_block(&self, block: u64) {
        self.inner.block.store(block, Ordering::SeqCst);
    }

    /// Number of lookups performed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl FinalityResolver for StaticResolver {
    async fn resolve_irreversible_block(&self) -> Result<u64, ResolveError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(ResolveError::MalformedResponse("lookup disabled".to_owned()));
        }
        Ok(self.inner.block.load(Ordering::SeqCst))
    }
}
