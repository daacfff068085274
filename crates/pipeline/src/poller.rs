use crate::buffer::FrameBuffer;
use crate::frame::decode_image;
use anyhow::{Context, Result};
use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause after a failed fetch so a dead camera does not spin the pool.
const FETCH_FAIL_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Snapshot endpoint; a GET here returns one JPEG per request.
    pub snapshot_url: String,
    pub workers: usize,
    pub buffer_capacity: usize,
    pub fetch_timeout: Duration,
}

impl PollerConfig {
    pub fn new(snapshot_url: impl Into<String>) -> Self {
        Self {
            snapshot_url: snapshot_url.into(),
            workers: 3,
            buffer_capacity: 5,
            fetch_timeout: Duration::from_secs(1),
        }
    }
}

/// Worker pool polling a network camera's snapshot endpoint.
///
/// Each worker loops a single GET; successful frames land in a shared
/// drop-oldest buffer, failures of any kind count as "no frame this
/// attempt" and are retried next cycle. Shutdown is cooperative: the
/// stop flag is checked once per iteration and `stop` joins the pool.
pub struct SnapshotPoller {
    buffer: Arc<FrameBuffer>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl SnapshotPoller {
    pub fn start(config: PollerConfig) -> Result<Self> {
        let buffer = Arc::new(FrameBuffer::new(config.buffer_capacity));
        let stop = Arc::new(AtomicBool::new(false));
        let client = reqwest::blocking::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .context("failed to build snapshot http client")?;

        let workers = (0..config.workers)
            .map(|worker| {
                let buffer = Arc::clone(&buffer);
                let stop = Arc::clone(&stop);
                let client = client.clone();
                let url = config.snapshot_url.clone();
                thread::Builder::new()
                    .name(format!("snapshot-poll-{worker}"))
                    .spawn(move || {
                        tracing::debug!(worker, url = %url, "snapshot worker started");
                        while !stop.load(Ordering::Relaxed) {
                            match fetch_frame(&client, &url) {
                                Some(frame) => buffer.push(frame),
                                None => thread::sleep(FETCH_FAIL_PAUSE),
                            }
                        }
                        tracing::debug!(worker, "snapshot worker stopped");
                    })
                    .context("failed to spawn snapshot worker")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            buffer,
            stop,
            workers,
        })
    }

    /// Newest captured frame, or None before the first success.
    pub fn latest(&self) -> Option<RgbImage> {
        self.buffer.latest()
    }

    /// Shared handle to the raw-frame buffer.
    pub fn buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Signal the pool to stop and block until every worker has exited.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

/// One polling attempt. Network errors, timeouts, non-200 statuses,
/// and undecodable bodies all yield None; the next cycle tries again.
fn fetch_frame(client: &reqwest::blocking::Client, url: &str) -> Option<RgbImage> {
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(error) => {
            tracing::trace!(url, %error, "snapshot fetch failed");
            return None;
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        tracing::trace!(url, status = %response.status(), "snapshot fetch rejected");
        return None;
    }

    let body = response.bytes().ok()?;
    match decode_image(&body) {
        Ok(frame) => Some(frame),
        Err(error) => {
            tracing::trace!(url, %error, "snapshot body not decodable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_jpeg;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn blocking_client() -> reqwest::blocking::Client {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    /// Serve exactly one canned HTTP response on a loopback port.
    fn one_shot_server(status_line: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let header = format!(
                    "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        format!("http://{addr}/")
    }

    #[test]
    fn successful_fetch_decodes_a_frame() {
        let jpeg = encode_jpeg(&RgbImage::from_pixel(16, 16, image::Rgb([9, 9, 9]))).unwrap();
        let url = one_shot_server("HTTP/1.1 200 OK", "image/jpeg", jpeg);

        let frame = fetch_frame(&blocking_client(), &url);
        assert_eq!(frame.unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn non_200_response_yields_no_frame() {
        let url = one_shot_server("HTTP/1.1 404 Not Found", "text/plain", b"gone".to_vec());
        assert!(fetch_frame(&blocking_client(), &url).is_none());
    }

    #[test]
    fn undecodable_body_yields_no_frame() {
        let url = one_shot_server("HTTP/1.1 200 OK", "image/jpeg", vec![1, 2, 3, 4]);
        assert!(fetch_frame(&blocking_client(), &url).is_none());
    }

    #[test]
    fn connection_failure_yields_no_frame_and_leaves_buffer_alone() {
        // Grab a port, then close it so connections are refused.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let buffer = FrameBuffer::new(5);
        assert!(fetch_frame(&blocking_client(), &format!("http://{addr}/")).is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn stop_joins_all_workers() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = PollerConfig::new(format!("http://{addr}/"));
        config.workers = 2;
        config.fetch_timeout = Duration::from_millis(100);

        let poller = SnapshotPoller::start(config).unwrap();
        assert!(poller.latest().is_none());
        poller.stop();
    }
}
