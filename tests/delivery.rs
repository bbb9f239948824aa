use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hyperion_stream::{
    ActionRequest, ChannelEvent, ClientEvent, DEFAULT_GRACE_PERIOD, DeliveryMode, DeltaRequest,
    EventKind, GateState, StreamClientBuilder, assert_blocks, assert_empty, assert_next,
    test_utils::{MockChannel, StaticResolver, action_batch, delta_batch, record_events, trace_init},
};
use serde_json::json;
use tokio_stream::StreamExt;

mod common;
use common::{settle, setup_client};

#[tokio::test(start_paused = true)]
async fn live_records_wait_for_backfill_and_grace_period() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let mut switches = record_events(&setup.client, &[EventKind::SwitchingToLive]).await?;

    let ack = setup
        .client
        .stream_actions(ActionRequest::new("eosio.token", "transfer").start_from(10))
        .await?;
    let id = ack.subscription_id.as_str();

    setup.channel.inject(trace_init(id, 10, 3));
    setup.channel.inject(action_batch(id, DeliveryMode::History, &[10, 11, 12]));
    setup.channel.inject(action_batch(id, DeliveryMode::Live, &[13]));

    assert_blocks!(setup.records, [10, 11, 12]);
    settle().await;

    let snapshot = setup.client.snapshot().await?;
    let subscription =
        snapshot.subscription(&ack.subscription_id).expect("subscription is tracked");
    assert_eq!(subscription.gate, GateState::GraceArmed);
    assert_eq!(subscription.delivery_counter, 3);
    assert_eq!(subscription.expected_history_total, Some(3));
    assert_eq!(subscription.first_block, Some(10));
    assert_eq!(subscription.pending_live, 1);
    let mut records = assert_empty!(setup.records);

    let started = tokio::time::Instant::now();
    assert_blocks!(records, [13]);
    assert!(started.elapsed() >= DEFAULT_GRACE_PERIOD / 2);
    assert_next!(switches, ClientEvent::SwitchingToLive(ack.subscription_id.clone()));

    let snapshot = setup.client.snapshot().await?;
    assert_eq!(snapshot.subscriptions[0].gate, GateState::Live);
    assert_eq!(snapshot.subscriptions[0].pending_live, 0);
    assert_eq!(snapshot.last_delivered_block, Some(13));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fill_announcement_disarms_the_gate() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let request = ActionRequest::new("*", "transfer").start_from(10);
    let ack = setup.client.stream_actions(request).await?;
    let id = ack.subscription_id.as_str();

    setup.channel.inject(trace_init(id, 10, 2));
    setup.channel.inject(action_batch(id, DeliveryMode::History, &[10, 11]));
    assert_blocks!(setup.records, [10, 11]);
    settle().await;
    assert_eq!(setup.client.snapshot().await?.subscriptions[0].gate, GateState::GraceArmed);

    setup.channel.inject(trace_init(id, 12, 1));
    setup.channel.inject(action_batch(id, DeliveryMode::Live, &[20]));
    settle().await;

    let subscription = &setup.client.snapshot().await?.subscriptions[0];
    assert_eq!(subscription.gate, GateState::AwaitingHistory);
    assert_eq!(subscription.expected_history_total, Some(3));
    assert_eq!(subscription.pending_live, 1);

    tokio::time::sleep(DEFAULT_GRACE_PERIOD * 2).await;
    let mut records = assert_empty!(setup.records);

    setup.channel.inject(action_batch(id, DeliveryMode::History, &[12]));
    assert_blocks!(records, [12, 20]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn first_live_record_switches_immediately() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let mut switches = record_events(&setup.client, &[EventKind::SwitchingToLive]).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio.token", "*")).await?;
    let id = ack.subscription_id.as_str();

    setup.channel.inject(action_batch(id, DeliveryMode::Live, &[500, 501]));

    assert_next!(switches, ClientEvent::SwitchingToLive(ack.subscription_id.clone()));
    assert_blocks!(setup.records, [500, 501]);

    let subscription = &setup.client.snapshot().await?.subscriptions[0];
    assert_eq!(subscription.gate, GateState::Live);
    assert_eq!(subscription.expected_history_total, None);
    let _switches = assert_empty!(switches);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn filtered_records_count_towards_the_backfill() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("*", "transfer").start_from(5)).await?;
    let id = ack.subscription_id.as_str();

    setup.channel.inject(trace_init(id, 5, 4));
    let ChannelEvent::Message(mut batch) = action_batch(id, DeliveryMode::History, &[5, 8]) else {
        unreachable!("action_batch builds a message");
    };
    batch.filtered = 2;
    setup.channel.inject(ChannelEvent::Message(batch));
    setup.channel.inject(action_batch(id, DeliveryMode::Live, &[9]));

    assert_blocks!(setup.records, [5, 8]);
    settle().await;
    let subscription = &setup.client.snapshot().await?.subscriptions[0];
    assert_eq!(subscription.filtered_count, 2);
    assert_eq!(subscription.gate, GateState::GraceArmed);

    assert_blocks!(setup.records, [9]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn records_are_delivered_one_at_a_time() -> anyhow::Result<()> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler_log = Arc::clone(&log);
    let channel = MockChannel::new();
    let client = StreamClientBuilder::new(Arc::clone(&channel), StaticResolver::new(1))
        .data_handler(move |record| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push(format!("start {}", record.block_num));
                tokio::time::sleep(Duration::from_millis(50)).await;
                log.lock().unwrap().push(format!("end {}", record.block_num));
            }
        })
        .build()?;
    let mut drains = record_events(&client, &[EventKind::Drain]).await?;
    client.connect().await?;

    let ack = client.stream_deltas(DeltaRequest::new("eosio", "voters")).await?;
    let id = ack.subscription_id.as_str();
    channel.inject(delta_batch(id, DeliveryMode::Live, &[7, 8]));
    channel.inject(delta_batch(id, DeliveryMode::Live, &[9]));

    assert_next!(drains, ClientEvent::Drain);
    assert_eq!(
        *log.lock().unwrap(),
        ["start 7", "end 7", "start 8", "end 8", "start 9", "end 9"]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn action_payloads_are_normalized() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio.token", "transfer")).await?;

    let message = json!({
        "type": "action_trace",
        "mode": "live",
        "reqUUID": ack.subscription_id,
        "message": json!({
            "block_num": "321",
            "act": { "name": "transfer", "data": { "memo": "hi" } },
            "@transfer": { "from": "alice", "to": "bob" }
        })
        .to_string(),
    });
    let event = ChannelEvent::decode("message", message).expect("valid message");
    setup.channel.inject(event);

    let Some(ClientEvent::Data(record)) = setup.records.next().await else {
        panic!("expected a record");
    };
    assert_eq!(record.block_num, 321);
    assert_eq!(record.mode, DeliveryMode::Live);
    assert!(!record.irreversible);
    assert_eq!(
        record.content["act"]["data"],
        json!({ "memo": "hi", "from": "alice", "to": "bob" })
    );
    assert!(record.content.get("@transfer").is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn server_error_closes_the_connection() -> anyhow::Result<()> {
    let setup = setup_client(false).await?;
    let mut events =
        record_events(&setup.client, &[EventKind::Error, EventKind::Disconnect]).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await?;

    let message = json!({
        "type": "action_trace",
        "mode": "live",
        "reqUUID": ack.subscription_id,
        "messages": [],
        "error": "bad"
    });
    setup.channel.inject(ChannelEvent::decode("message", message).expect("valid message"));

    assert_next!(events, ClientEvent::Error("bad".to_owned()));
    assert_next!(events, ClientEvent::Disconnect);
    assert_eq!(setup.channel.disconnects(), 1);

    let snapshot = setup.client.snapshot().await?;
    assert!(!snapshot.online);
    assert!(snapshot.subscriptions.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn records_for_unknown_subscriptions_are_dropped() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio", "*")).await?;

    setup.channel.inject(action_batch("someone-else", DeliveryMode::Live, &[1, 2]));
    setup.channel.inject(action_batch(ack.subscription_id.as_str(), DeliveryMode::Live, &[3]));

    assert_blocks!(setup.records, [3]);
    assert_eq!(setup.client.snapshot().await?.last_delivered_block, Some(3));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn errors_on_bootstrap_messages_are_ignored() -> anyhow::Result<()> {
    let mut setup = setup_client(false).await?;
    let errors = record_events(&setup.client, &[EventKind::Error]).await?;
    let ack = setup.client.stream_actions(ActionRequest::new("eosio", "*").start_from(7)).await?;

    let message = json!({
        "type": "trace_init",
        "mode": "history",
        "reqUUID": ack.subscription_id,
        "results": 1,
        "first_block": 7,
        "error": "ignored"
    });
    setup.channel.inject(ChannelEvent::decode("message", message).expect("valid message"));
    setup.channel.inject(action_batch(ack.subscription_id.as_str(), DeliveryMode::History, &[7]));

    assert_blocks!(setup.records, [7]);
    assert_eq!(setup.channel.disconnects(), 0);
    let snapshot = setup.client.snapshot().await?;
    assert!(snapshot.online);
    assert_eq!(snapshot.subscriptions[0].expected_history_total, Some(1));
    let _errors = assert_empty!(errors);

    Ok(())
}
