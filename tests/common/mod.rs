#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use hyperion_stream::{
    ClientEvent, StreamClient, StreamClientBuilder,
    test_utils::{MockChannel, StaticResolver},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;

pub const LIB_BLOCK: u64 = 1_000;

pub struct ClientSetup {
    pub client: StreamClient,
    pub channel: Arc<MockChannel>,
    pub resolver: StaticResolver,
    /// Records passed to the data handler, as [`ClientEvent::Data`].
    pub records: UnboundedReceiverStream<ClientEvent>,
    /// Records passed to the irreversible handler, as [`ClientEvent::IrreversibleData`].
    pub irreversible: UnboundedReceiverStream<ClientEvent>,
}

pub fn builder_with_handlers(
    channel: Arc<MockChannel>,
    resolver: StaticResolver,
) -> (
    StreamClientBuilder<Arc<MockChannel>, StaticResolver>,
    UnboundedReceiverStream<ClientEvent>,
    UnboundedReceiverStream<ClientEvent>,
) {
    let (records_tx, records_rx) = mpsc::unbounded_channel();
    let (irreversible_tx, irreversible_rx) = mpsc::unbounded_channel();

    let builder = StreamClientBuilder::new(channel, resolver)
        .data_handler(move |record| {
            let records_tx = records_tx.clone();
            async move {
                let _ = records_tx.send(ClientEvent::Data(record));
            }
        })
        .irreversible_handler(move |record| {
            let irreversible_tx = irreversible_tx.clone();
            async move {
                let _ = irreversible_tx.send(ClientEvent::IrreversibleData(record));
            }
        });

    (
        builder,
        UnboundedReceiverStream::new(records_rx),
        UnboundedReceiverStream::new(irreversible_rx),
    )
}

/// Routes engine logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a client with recording handlers but does not connect it.
pub fn build_client(irreversible_stream: bool) -> anyhow::Result<ClientSetup> {
    init_tracing();
    let channel = MockChannel::new();
    let resolver = StaticResolver::new(LIB_BLOCK);
    let (builder, records, irreversible) =
        builder_with_handlers(Arc::clone(&channel), resolver.clone());
    let client = builder.irreversible_stream(irreversible_stream).build()?;

    Ok(ClientSetup { client, channel, resolver, records, irreversible })
}

pub async fn setup_client(irreversible_stream: bool) -> anyhow::Result<ClientSetup> {
    let setup = build_client(irreversible_stream)?;
    setup.client.connect().await?;
    Ok(setup)
}

/// Lets the engine work through everything injected so far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
