use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::{error::ResolveError, resolver::FinalityResolver};

/// Resolves the irreversible block through `/v1/chain/get_info`.
#[derive(Debug, Clone)]
pub struct ChainInfoResolver {
    pub(crate) client: Client,
    pub(crate) get_info: Url,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

#[derive(Deserialize)]
struct ChainInfo {
    #[serde(default)]
    last_irreversible_block_num: Option<Value>,
}

impl ChainInfoResolver {
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.get_info
    }

    async fn fetch_once(&self) -> Result<u64, ResolveError> {
        let info: ChainInfo =
            self.client.get(self.get_info.clone()).send().await?.error_for_status()?.json().await?;

        match info.last_irreversible_block_num {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .filter(|block| *block > 0)
        .ok_or_else(|| {
            ResolveError::MalformedResponse("missing last_irreversible_block_num".to_owned())
        })
    }
}

impl FinalityResolver for ChainInfoResolver {
    async fn resolve_irreversible_block(&self) -> Result<u64, ResolveError> {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        let result = timeout(
            self.call_timeout,
            (|| self.fetch_once())
                .retry(retry_strategy)
                .when(|err| !matches!(err, ResolveError::MalformedResponse(_)))
                .notify(|err: &ResolveError, dur: Duration| {
                    info!(error = %err, "get_info failed, retrying after {:?}", dur);
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(ResolveError::from)
        .and_then(|inner| inner);

        match &result {
            Ok(block_num) => debug!(block_num, "Resolved irreversible block"),
            Err(e) => error!(url = %self.get_info, error = %e, "get_info lookup failed"),
        }
        result
    }
}
