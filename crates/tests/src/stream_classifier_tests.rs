//! Integration tests for response shape classification.
//!
//! These tests verify that:
//! - Upstream bodies split at arbitrary points still yield the exact `result` bytes
//! - Error envelopes and non-2xx statuses are handed over as a whole
//! - Broken bodies surface as stream errors instead of silently truncated results

use bytes::Bytes;
use futures::{stream, StreamExt};
use relay_core::stream::{classify, Chunk, ResponseShape, StreamError};
use serde_json::{json, Value};

fn chunked(body: &[u8], cuts: &[usize]) -> Vec<Result<Bytes, StreamError>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        chunks.push(Ok(Bytes::copy_from_slice(&body[start..cut])));
        start = cut;
    }
    chunks.push(Ok(Bytes::copy_from_slice(&body[start..])));
    chunks
}

/// Recovers the `result` value from any shape.
async fn result_of(shape: ResponseShape) -> Value {
    match shape {
        ResponseShape::Aggregate { body, .. } => {
            let envelope: Value = serde_json::from_slice(&body).unwrap();
            envelope["result"].clone()
        }
        ResponseShape::Single { result, .. } => serde_json::from_slice(&result).unwrap(),
        ResponseShape::Streamed(chunks) => {
            serde_json::from_slice(&chunks.collect_bytes().await.unwrap()).unwrap()
        }
    }
}

#[tokio::test]
async fn test_large_block_is_streamed() {
    let transactions: Vec<Value> =
        (0..200).map(|i| json!({"hash": format!("0x{i:064x}"), "input": "0x"})).collect();
    let result = json!({"number": "0x10", "transactions": transactions});
    let body =
        serde_json::to_vec(&json!({"jsonrpc": "2.0", "id": 9, "result": result.clone()})).unwrap();

    let cuts: Vec<usize> = (1..body.len() / 512).map(|i| i * 512).collect();
    let shape = classify(200, stream::iter(chunked(&body, &cuts))).await.unwrap();
    assert_eq!(shape.kind(), "streamed");

    let ResponseShape::Streamed(chunks) = shape else { unreachable!() };
    let chunks: Vec<Chunk> = chunks.map(Result::unwrap).collect().await;
    assert!(chunks.len() > 2);
    assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.finished));
    assert!(chunks.last().unwrap().finished);

    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.to_vec()).collect();
    assert_eq!(serde_json::from_slice::<Value>(&joined).unwrap(), result);
}

#[tokio::test]
async fn test_error_envelope_is_aggregated() {
    let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#;
    let shape = classify(200, stream::iter(chunked(body, &[20, 40]))).await.unwrap();

    match shape {
        ResponseShape::Aggregate { body: collected, status } => {
            assert_eq!(status, 200);
            assert_eq!(&collected[..], &body[..]);
        }
        other => panic!("expected aggregate, got {}", other.kind()),
    }
}

#[tokio::test]
async fn test_gateway_error_status_is_aggregated() {
    let body = br#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#;
    let shape = classify(502, stream::iter(chunked(body, &[]))).await.unwrap();
    assert!(matches!(shape, ResponseShape::Aggregate { status: 502, .. }));
}

#[tokio::test]
async fn test_connection_drop_mid_result() {
    let chunks = vec![
        Ok(Bytes::from_static(br#"{"id":1,"result":{"logs":["#)),
        Ok(Bytes::from_static(br#"{"a":1},"#)),
        Err(StreamError::Source("connection reset".to_string())),
    ];
    let shape = classify(200, stream::iter(chunks)).await.unwrap();
    let ResponseShape::Streamed(chunks) = shape else { panic!("expected streamed") };

    let items: Vec<_> = chunks.collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    assert_eq!(items[2], Err(StreamError::Source("connection reset".to_string())));
}

#[tokio::test]
async fn test_body_ending_inside_result_is_truncated() {
    let chunks = vec![
        Ok(Bytes::from_static(br#"{"id":1,"result":"0xdead"#)),
        Ok(Bytes::from_static(b"beef")),
    ];
    let ResponseShape::Streamed(chunks) = classify(200, stream::iter(chunks)).await.unwrap() else {
        panic!("expected streamed");
    };
    assert_eq!(chunks.collect_bytes().await, Err(StreamError::Truncated));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[ -~é\n]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn result_survives_any_chunking(
            result in json_value(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
        ) {
            let body = serde_json::to_vec(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result.clone(),
            }))
            .unwrap();

            let mut cuts: Vec<usize> =
                cuts.iter().map(|i| 1 + i.index(body.len() - 1)).collect();
            cuts.sort_unstable();
            cuts.dedup();

            let chunks = chunked(&body, &cuts);
            let recovered = futures::executor::block_on(async {
                let shape = classify(200, stream::iter(chunks)).await.unwrap();
                result_of(shape).await
            });
            prop_assert_eq!(recovered, result);
        }
    }
}
