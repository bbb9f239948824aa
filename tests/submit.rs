use std::sync::Arc;

use hyperion_stream::{
    ActionRequest, BlockPosition, ChannelError, DeliveryMode, DeltaRequest, RequestEvent,
    ResolveError, StreamClientBuilder, StreamError, SubscriptionId, assert_blocks,
    test_utils::{MockChannel, StaticResolver, action_batch},
};
use serde_json::json;

mod common;
use common::{LIB_BLOCK, build_client, setup_client};

#[tokio::test]
async fn submit_requires_a_connection() -> anyhow::Result<()> {
    let setup = build_client(false)?;

    let result = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await;

    assert_eq!(result, Err(StreamError::NotConnected));
    assert!(setup.channel.emitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn accepted_requests_are_tracked() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;

    let ack = setup
        .client
        .stream_deltas(DeltaRequest::new("eosio.token", "accounts").scope("alice").start_from(7))
        .await?;

    assert_eq!(ack.status, "OK");
    assert_eq!(ack.subscription_id, SubscriptionId::new("req-1"));
    assert_eq!(ack.starting_block, BlockPosition::Number(7));

    let emitted = setup.channel.emitted();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].0, RequestEvent::DeltaStream);
    assert_eq!(emitted[0].1["code"], "eosio.token");
    assert_eq!(emitted[0].1["scope"], "alice");
    assert_eq!(emitted[0].1["start_from"], json!(7));
    assert_eq!(emitted[0].1["read_until"], json!(0));

    let snapshot = setup.client.snapshot().await?;
    let subscription = snapshot.subscription(&ack.subscription_id).expect("tracked");
    assert_eq!(subscription.start_from, BlockPosition::Number(7));
    assert!(!subscription.started);
    assert_eq!(setup.resolver.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn rejected_requests_are_not_tracked() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;
    setup.channel.push_ack(json!({ "status": "ERROR", "error": "unknown contract" }));

    let result = setup.client.stream_actions(ActionRequest::new("nobody", "*")).await;

    let Err(StreamError::Rejected(rejection)) = result else {
        panic!("expected a rejection, got {result:?}");
    };
    assert_eq!(rejection.status.as_deref(), Some("ERROR"));
    assert_eq!(rejection.reason.as_deref(), Some("unknown contract"));
    assert!(setup.client.snapshot().await?.subscriptions.is_empty());
    Ok(())
}

#[tokio::test]
async fn ack_without_subscription_id_is_malformed() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;
    setup.channel.push_ack(json!({ "status": "OK" }));

    let result = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await;

    assert!(matches!(result, Err(StreamError::MalformedAck(_))));
    assert!(setup.client.snapshot().await?.subscriptions.is_empty());
    Ok(())
}

#[tokio::test]
async fn lost_acknowledgement_is_a_channel_error() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;
    setup.channel.push_ack_error(ChannelError::AckDropped);

    let result = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await;

    assert!(matches!(result, Err(StreamError::Channel(ChannelError::AckDropped))));
    Ok(())
}

#[tokio::test]
async fn irreversible_positions_are_resolved_before_sending() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;

    let ack = setup
        .client
        .stream_actions(
            ActionRequest::new("eosio", "*")
                .start_from(BlockPosition::Irreversible)
                .read_until(BlockPosition::Irreversible),
        )
        .await?;

    assert_eq!(ack.starting_block, BlockPosition::Number(LIB_BLOCK));
    assert_eq!(setup.resolver.calls(), 1);
    let emitted = setup.channel.emitted();
    assert_eq!(emitted[0].1["start_from"], json!(LIB_BLOCK));
    assert_eq!(emitted[0].1["read_until"], json!(LIB_BLOCK));
    Ok(())
}

#[tokio::test]
async fn failed_lookup_aborts_the_request() -> anyhow::Result<()> {
    let channel = MockChannel::new();
    let client = StreamClientBuilder::new(Arc::clone(&channel), StaticResolver::failing()).build()?;
    client.connect().await?;

    let result = client
        .stream_actions(ActionRequest::new("eosio", "*").start_from(BlockPosition::Irreversible))
        .await;

    assert!(matches!(
        result,
        Err(StreamError::FinalityLookup(ResolveError::MalformedResponse(_)))
    ));
    assert!(channel.emitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn start_is_clamped_to_the_last_delivered_block() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await?;
    setup.channel.inject(action_batch(ack.subscription_id.as_str(), DeliveryMode::Live, &[500]));
    assert_blocks!(setup.records, [500]);

    let behind = setup.client.stream_actions(ActionRequest::new("a", "*").start_from(400)).await?;
    let ahead = setup.client.stream_actions(ActionRequest::new("b", "*").start_from(600)).await?;
    let head = setup.client.stream_actions(ActionRequest::new("c", "*")).await?;

    assert_eq!(behind.starting_block, BlockPosition::Number(500));
    assert_eq!(ahead.starting_block, BlockPosition::Number(600));
    assert_eq!(head.starting_block, BlockPosition::Head);
    Ok(())
}

#[tokio::test]
async fn irreversible_bound_does_not_skip_clamping() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await?;
    setup.channel.inject(action_batch(ack.subscription_id.as_str(), DeliveryMode::Live, &[500]));
    assert_blocks!(setup.records, [500]);

    let bounded = setup
        .client
        .stream_actions(
            ActionRequest::new("a", "*").start_from(400).read_until(BlockPosition::Irreversible),
        )
        .await?;

    assert_eq!(bounded.starting_block, BlockPosition::Number(500));
    assert_eq!(setup.resolver.calls(), 1);
    let emitted = setup.channel.emitted();
    assert_eq!(emitted[1].1["start_from"], json!(500));
    assert_eq!(emitted[1].1["read_until"], json!(LIB_BLOCK));
    Ok(())
}

#[tokio::test]
async fn failed_connect_can_be_retried() -> anyhow::Result<()> {
    let setup = build_client(false)?;
    setup.channel.fail_next_connect();

    let result = setup.client.connect().await;
    assert!(matches!(result, Err(StreamError::Channel(ChannelError::Transport(_)))));
    assert!(!setup.client.snapshot().await?.online);

    setup.client.connect().await?;
    let snapshot = setup.client.snapshot().await?;
    assert!(snapshot.online);
    assert!(snapshot.connected);

    // already open
    setup.client.connect().await?;
    Ok(())
}
