use tokio_stream::Stream;

use crate::ClientEvent;

/// Asserts that the next item of an event stream equals `$expected`.
///
/// Waits at most `timeout = N` seconds (default 5) for the item.
#[macro_export]
macro_rules! assert_next {
    ($stream: expr, $expected: expr) => {
        $crate::assert_next!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match message {
            std::option::Option::Some(msg) => {
                assert_eq!(msg, expected, "Expected {:?}, got {:?}", expected, msg);
            }
            std::option::Option::None => {
                panic!("Expected {:?}, but stream was closed", expected);
            }
        }
    };
}

#[macro_export]
macro_rules! assert_closed {
    ($stream: expr) => {
        $crate::assert_closed!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        assert!(message.is_none(), "Expected closed stream, got {:?}", message)
    };
}

/// Asserts that an `UnboundedReceiverStream` has nothing buffered, and gives the stream back.
#[macro_export]
macro_rules! assert_empty {
    ($stream: expr) => {{
        let inner = $stream.into_inner();
        assert!(inner.is_empty(), "Stream should have no pending events");
        tokio_stream::wrappers::UnboundedReceiverStream::new(inner)
    }};
}

/// Asserts that a stream of [`ClientEvent::Data`] (or [`ClientEvent::IrreversibleData`]) events
/// carries exactly the given block numbers, in order.
///
/// # Panics
///
/// * **Timeout**: the next record does not arrive within `timeout = N` seconds (default 5).
/// * **Wrong block**: a record for a different block arrives.
/// * **Wrong event**: the stream yields an event that does not carry a record.
/// * **Stream closed early**: the stream ends before every block was seen.
#[macro_export]
macro_rules! assert_blocks {
    ($stream: expr, [$($block:expr),+ $(,)?]) => {
        $crate::assert_blocks!($stream, [$($block),+], timeout = 5)
    };
    ($stream: expr, [$($block:expr),+ $(,)?], timeout = $secs: expr) => {
        $crate::test_utils::macros::assert_blocks(&mut $stream, &[$($block),+], $secs).await
    };
}

#[allow(clippy::missing_panics_doc)]
pub async fn assert_blocks<S: Stream<Item = ClientEvent> + Unpin>(
    stream: &mut S,
    expected: &[u64],
    timeout_secs: u64,
) {
    let start = tokio::time::Instant::now();
    let timeout_duration = std::time::Duration::from_secs(timeout_secs);

    for (position, block) in expected.iter().enumerate() {
        let elapsed = start.elapsed();
        assert!(
            elapsed < timeout_duration,
            "Timed out waiting for block {block}, remaining: {:?}",
            &expected[position..]
        );

        let event = tokio::time::timeout(
            timeout_duration - elapsed,
            tokio_stream::StreamExt::next(stream),
        )
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for block {block}"));

        match event {
            Some(ClientEvent::Data(record) | ClientEvent::IrreversibleData(record)) => {
                assert_eq!(
                    record.block_num, *block,
                    "Unexpected block, remaining: {:?}",
                    &expected[position..]
                );
            }
            Some(other) => panic!("Expected a record for block {block}, got: {other:?}"),
            None => panic!("Stream closed while still expecting: {:?}", &expected[position..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use crate::{ClientEvent, DeliveryMode, Record, RecordKind, SubscriptionId};

    fn data(block_num: u64) -> ClientEvent {
        ClientEvent::Data(Record {
            subscription_id: SubscriptionId::new("s"),
            kind: RecordKind::Action,
            mode: DeliveryMode::History,
            content: json!({}),
            block_num,
            irreversible: false,
        })
    }

    #[tokio::test]
    async fn assert_blocks_accepts_matching_sequence() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = UnboundedReceiverStream::new(rx);
        for block in [3, 4, 5] {
            tx.send(data(block)).unwrap();
        }

        assert_blocks!(stream, [3, 4, 5]);
        let mut stream = assert_empty!(stream);
        drop(tx);
        assert_closed!(stream);
    }

    #[tokio::test]
    #[should_panic = "Unexpected block"]
    async fn assert_blocks_rejects_out_of_order_records() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = UnboundedReceiverStream::new(rx);
        tx.send(data(4)).unwrap();
        tx.send(data(3)).unwrap();

        assert_blocks!(stream, [3, 4]);
    }
}
