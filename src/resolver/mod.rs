//! Resolution of the current irreversible block.
//!
//! Stream requests may start from (or read until) the symbolic `"LIB"` position. Before such a
//! request is emitted the engine asks a [`FinalityResolver`] for the concrete block number.
//!
//! [`ChainInfoResolver`] is the HTTP implementation: it reads `last_irreversible_block_num` from
//! the chain API's `/v1/chain/get_info` endpoint, wrapping every lookup in a total timeout and
//! retrying failed calls with exponential backoff.
//!
//! ```rust,no_run
//! use hyperion_stream::resolver::{ChainInfoResolverBuilder, FinalityResolver};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = ChainInfoResolverBuilder::new("https://wax.eosusa.io")
//!     .call_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let lib = resolver.resolve_irreversible_block().await?;
//! println!("irreversible block: {lib}");
//! # Ok(()) }
//! ```

mod builder;
mod chain_info;

use std::{future::Future, sync::Arc};

pub use builder::{
    ChainInfoResolverBuilder, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY,
};
pub use chain_info::ChainInfoResolver;

use crate::error::ResolveError;

/// Looks up the current irreversible block number.
pub trait FinalityResolver: Send + Sync + 'static {
    fn resolve_irreversible_block(&self) -> impl Future<Output = Result<u64, ResolveError>> + Send;
}

impl<R: FinalityResolver> FinalityResolver for Arc<R> {
    fn resolve_irreversible_block(&self) -> impl Future<Output = Result<u64, ResolveError>> + Send {
        (**self).resolve_irreversible_block()
    }
}
