//! Response shape classification for upstream HTTP bodies.
//!
//! A body is inspected as it arrives. The first chunk decides the shape:
//!
//! - [`ResponseShape::Aggregate`]: no JSON-RPC envelope with a top-level `result` was found, the
//!   whole body is collected and handed over opaquely (usually an error envelope).
//! - [`ResponseShape::Single`]: `result` closed inside the first chunk.
//! - [`ResponseShape::Streamed`]: `result` continues past the first chunk; its bytes are
//!   forwarded chunk by chunk without buffering the body.

mod parser;

use bytes::{Bytes, BytesMut};
use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use parser::{Located, ValueScanner};
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The body ended before the `result` value closed.
    #[error("response body ended inside the result value")]
    Truncated,

    /// The byte source failed.
    #[error("response body error: {0}")]
    Source(String),
}

/// One piece of a streamed `result` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
    /// Set on the last chunk only.
    pub finished: bool,
}

impl Chunk {
    #[must_use]
    pub fn new(data: impl Into<Bytes>, finished: bool) -> Self {
        Self { data: data.into(), finished }
    }
}

/// Ordered chunks of a `result` value. Consumed once.
pub struct ChunkStream {
    inner: BoxStream<'static, Result<Chunk, StreamError>>,
}

impl ChunkStream {
    /// Concatenates the remaining chunks into the full `result` bytes.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the stream.
    pub async fn collect_bytes(mut self) -> Result<Bytes, StreamError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?.data);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ChunkStream {
    type Item = Result<Chunk, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}

/// Classified upstream response.
#[derive(Debug)]
pub enum ResponseShape {
    Aggregate { body: Bytes, status: u16 },
    Single { result: Bytes, id: Option<serde_json::Value> },
    Streamed(ChunkStream),
}

impl ResponseShape {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Aggregate { .. } => "aggregate",
            Self::Single { .. } => "single",
            Self::Streamed(_) => "streamed",
        }
    }
}

/// Classifies an HTTP response body from its status and byte chunks.
///
/// Non-2xx statuses are always [`ResponseShape::Aggregate`]. Otherwise only the first chunk is
/// inspected; see the module docs for the rules.
///
/// # Errors
///
/// Propagates source errors met before the shape is known or while collecting an aggregate.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use relay_core::stream::{classify, ResponseShape, StreamError};
///
/// # futures::executor::block_on(async {
/// let chunk = Bytes::from_static(br#"{"id":1,"result":"0x10"}"#);
/// let body = futures::stream::iter([Ok::<_, StreamError>(chunk)]);
/// match classify(200, body).await.unwrap() {
///     ResponseShape::Single { result, .. } => assert_eq!(result, Bytes::from_static(b"\"0x10\"")),
///     other => panic!("unexpected {}", other.kind()),
/// }
/// # });
/// ```
pub async fn classify<S>(status: u16, chunks: S) -> Result<ResponseShape, StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
{
    let mut chunks = Box::pin(chunks);

    let first = match chunks.next().await {
        Some(first) => first?,
        None => return Ok(ResponseShape::Aggregate { body: Bytes::new(), status }),
    };

    if !(200..300).contains(&status) {
        return aggregate(status, first, chunks).await;
    }

    match parser::locate(&first) {
        Located::NotEnvelope => aggregate(status, first, chunks).await,
        Located::Complete { result, id } => {
            trace!(len = result.len(), "single response");
            Ok(ResponseShape::Single { result: first.slice(result), id })
        }
        Located::Open { result_start, scanner } => {
            trace!(first_chunk = first.len(), "streamed response");
            let head = first.slice(result_start..);
            Ok(ResponseShape::Streamed(reframe(head, scanner, chunks)))
        }
    }
}

async fn aggregate<S>(status: u16, first: Bytes, mut rest: S) -> Result<ResponseShape, StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
{
    let mut body = BytesMut::from(&first[..]);
    while let Some(chunk) = rest.next().await {
        body.extend_from_slice(&chunk?);
    }
    trace!(status, len = body.len(), "aggregate response");
    Ok(ResponseShape::Aggregate { body: body.freeze(), status })
}

struct Reframe<S> {
    source: S,
    scanner: ValueScanner,
    done: bool,
}

fn reframe<S>(head: Bytes, scanner: ValueScanner, source: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, StreamError>> + Send + Unpin + 'static,
{
    let head = (!head.is_empty()).then(|| Ok(Chunk::new(head, false)));

    let rest = stream::unfold(Reframe { source, scanner, done: false }, |mut state| async move {
        while !state.done {
            let Some(next) = state.source.next().await else {
                state.done = true;
                let last = if state.scanner.is_mid_scalar() {
                    Ok(Chunk::new(Bytes::new(), true))
                } else {
                    Err(StreamError::Truncated)
                };
                return Some((last, state));
            };

            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
            };

            let step = state.scanner.feed(&bytes);
            match step.end {
                Some(end) => {
                    state.done = true;
                    return Some((Ok(Chunk::new(bytes.slice(step.start..end), true)), state));
                }
                None if step.start < bytes.len() => {
                    return Some((Ok(Chunk::new(bytes.slice(step.start..), false)), state));
                }
                None => {}
            }
        }
        None
    });

    ChunkStream { inner: stream::iter(head).chain(rest).boxed() }
}
