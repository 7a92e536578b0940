//! SSE transport: frame encoding and the streaming response.
//!
//! All host-framework coupling for streaming lives here; the runtime only
//! produces typed frames.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;

use agentd_runtime::{FrameStream, StreamFrame};

/// Encode one frame in SSE grammar: `event: <name>\ndata: <json>\n\n`,
/// with the terminal frame carrying the literal `[DONE]`.
pub fn frame_bytes(frame: &StreamFrame) -> Bytes {
    match frame {
        StreamFrame::Event { name, data } => Bytes::from(format!("event: {name}\ndata: {data}\n\n")),
        StreamFrame::Done => Bytes::from_static(b"event: done\ndata: [DONE]\n\n"),
    }
}

/// Wrap a frame sequence into a `text/event-stream` response. Dropping the
/// response body hangs up the underlying run.
pub fn sse_response(frames: FrameStream) -> Response {
    let stream = frames.map(|frame| Ok::<Bytes, Infallible>(frame_bytes(&frame)));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}
