use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::Response;
use pipeline::FrameBuffer;
use pipeline::frame::encode_jpeg;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Sleep when the output buffer has nothing to serve.
const EMPTY_STREAM_PAUSE: Duration = Duration::from_millis(100);

/// Build the never-ending MJPEG response for one feed.
///
/// Each chunk consumes the oldest frame from the buffer, so a second
/// concurrent viewer of the same camera sees a disjoint stream rather
/// than a copy. The stream only ends when the client disconnects.
pub fn mjpeg_response(buffer: Arc<FrameBuffer>) -> Response {
    let stream = async_stream::stream! {
        loop {
            match buffer.pop() {
                Some(frame) => match encode_jpeg(&frame) {
                    Ok(jpeg) => yield Ok::<Bytes, Infallible>(multipart_chunk(&jpeg)),
                    Err(error) => tracing::warn!(%error, "frame encode failed, dropped"),
                },
                None => tokio::time::sleep(EMPTY_STREAM_PAUSE).await,
            }
        }
    };

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Frame one JPEG in the multipart wire format browsers expect. The
/// byte layout is load-bearing; viewers key on the exact boundary and
/// header lines.
fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut chunk = Vec::with_capacity(jpeg.len() + 48);
    chunk.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}
