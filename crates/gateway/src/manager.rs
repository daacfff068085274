use crate::config::GatewayConfig;
use crate::error::ApiError;
use anyhow::{Context, Result};
use pipeline::{
    FrameBuffer, FrameProcessor, FrameSource, PollerConfig, PoseEstimator, SnapshotPoller,
    VideoFileSource,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// A background processing thread with its cooperative stop flag.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Raise the flag and block until the thread exits.
    fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

/// Everything the manager holds for one camera id. The output buffer
/// is created once and survives source switches, so an open stream
/// keeps reading across a re-upload or re-registration.
struct CameraPipeline {
    output: Arc<FrameBuffer>,
    live_addr: Option<String>,
    poller: Option<SnapshotPoller>,
    live_worker: Option<Worker>,
    file_worker: Option<Worker>,
}

impl CameraPipeline {
    fn new(output_capacity: usize) -> Self {
        Self {
            output: Arc::new(FrameBuffer::new(output_capacity)),
            live_addr: None,
            poller: None,
            live_worker: None,
            file_worker: None,
        }
    }
}

/// Registry of per-camera pipelines.
///
/// One {acquisition, processor, output buffer} triple per camera id.
/// At most one file worker runs per id at any time: starting a new one
/// stops and joins the previous one first. A registered live address
/// takes priority over file playback when a feed is requested; the
/// live poller and its processor start lazily on the first request.
pub struct PipelineManager {
    config: GatewayConfig,
    estimator: Arc<dyn PoseEstimator>,
    cameras: Mutex<HashMap<u32, CameraPipeline>>,
    active_file_workers: Arc<AtomicUsize>,
}

impl PipelineManager {
    pub fn new(config: GatewayConfig, estimator: Arc<dyn PoseEstimator>) -> Self {
        Self {
            config,
            estimator,
            cameras: Mutex::new(HashMap::new()),
            active_file_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock_cameras(&self) -> MutexGuard<'_, HashMap<u32, CameraPipeline>> {
        self.cameras.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a camera's network address. Any running live pair for the
    /// id is stopped so the next feed request reconnects to the new
    /// address.
    pub fn register_live(&self, camera_id: u32, address: &str) {
        let url = snapshot_url(address);
        let (poller, worker) = {
            let mut cameras = self.lock_cameras();
            let camera = cameras
                .entry(camera_id)
                .or_insert_with(|| CameraPipeline::new(self.config.output_buffer_capacity));
            camera.live_addr = Some(url.clone());
            (camera.poller.take(), camera.live_worker.take())
        };
        if let Some(worker) = worker {
            worker.stop();
        }
        if let Some(poller) = poller {
            poller.stop();
        }
        tracing::info!(camera_id, url = %url, "live camera registered");
    }

    /// Start processing an uploaded video for a camera, replacing any
    /// run already in progress for that id.
    pub fn start_file_processing(&self, camera_id: u32, path: &Path) -> Result<()> {
        let source = VideoFileSource::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        self.spawn_file_worker(camera_id, Box::new(source))
    }

    /// Handle to the camera's annotated output, starting the live pair
    /// on first request when an address is registered. Live wins over
    /// file playback; an id nobody has registered is an error.
    pub fn get_feed(&self, camera_id: u32) -> Result<Arc<FrameBuffer>, ApiError> {
        let mut cameras = self.lock_cameras();
        let camera = cameras
            .get_mut(&camera_id)
            .ok_or(ApiError::StreamSourceNotFound(camera_id))?;

        if let Some(url) = camera.live_addr.clone() {
            if camera.poller.is_none() {
                // Live takes over: retire the file worker for this id.
                if let Some(worker) = camera.file_worker.take() {
                    worker.stop();
                }
                self.start_live_pair(camera_id, &url, camera)
                    .map_err(ApiError::Internal)?;
            }
        }

        Ok(Arc::clone(&camera.output))
    }

    /// Stop and join every worker belonging to one camera.
    pub fn stop_camera(&self, camera_id: u32) {
        let camera = self.lock_cameras().remove(&camera_id);
        if let Some(camera) = camera {
            stop_pipeline(camera);
            tracing::info!(camera_id, "camera pipeline stopped");
        }
    }

    /// Stop and join every worker across all cameras.
    pub fn shutdown(&self) {
        let cameras = std::mem::take(&mut *self.lock_cameras());
        for (camera_id, camera) in cameras {
            stop_pipeline(camera);
            tracing::debug!(camera_id, "camera pipeline stopped");
        }
        tracing::info!("pipeline manager shut down");
    }

    /// Number of file workers currently running, across all cameras.
    pub fn active_file_workers(&self) -> usize {
        self.active_file_workers.load(Ordering::Relaxed)
    }

    /// Directory uploaded videos are persisted to.
    pub fn uploads_dir(&self) -> &str {
        &self.config.uploads_dir
    }

    /// Request-body cap for the upload endpoint.
    pub fn upload_limit_bytes(&self) -> usize {
        self.config.max_upload_bytes()
    }

    /// Replace the camera's file worker with one driving `source`.
    ///
    /// The previous worker is joined while the registry lock is held,
    /// so no two file workers for the same id ever overlap. Workers
    /// never touch the registry, which keeps that join deadlock-free.
    fn spawn_file_worker(&self, camera_id: u32, mut source: Box<dyn FrameSource>) -> Result<()> {
        let mut cameras = self.lock_cameras();
        let camera = cameras
            .entry(camera_id)
            .or_insert_with(|| CameraPipeline::new(self.config.output_buffer_capacity));

        if let Some(worker) = camera.file_worker.take() {
            worker.stop();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut processor = FrameProcessor::new(
            Arc::clone(&self.estimator),
            self.config.thresholds(),
            self.config.fall_duration(),
            Arc::clone(&camera.output),
        );

        self.active_file_workers.fetch_add(1, Ordering::Relaxed);
        let active = Arc::clone(&self.active_file_workers);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("file-worker-{camera_id}"))
            .spawn(move || {
                if let Err(error) = processor.run_file(source.as_mut(), &worker_stop) {
                    tracing::error!(camera_id, %error, "file processing failed");
                }
                active.fetch_sub(1, Ordering::Relaxed);
            })
            .inspect_err(|_| {
                self.active_file_workers.fetch_sub(1, Ordering::Relaxed);
            })
            .context("failed to spawn file worker")?;

        camera.file_worker = Some(Worker { stop, handle });
        tracing::info!(camera_id, "file worker started");
        Ok(())
    }

    /// Start the snapshot poller and its processor thread for a camera.
    fn start_live_pair(
        &self,
        camera_id: u32,
        url: &str,
        camera: &mut CameraPipeline,
    ) -> Result<()> {
        let mut poller_config = PollerConfig::new(url);
        poller_config.workers = self.config.poll_workers;
        poller_config.buffer_capacity = self.config.raw_buffer_capacity;
        poller_config.fetch_timeout = self.config.snapshot_timeout();

        let poller = SnapshotPoller::start(poller_config)?;
        let raw_frames = poller.buffer();

        let stop = Arc::new(AtomicBool::new(false));
        let mut processor = FrameProcessor::new(
            Arc::clone(&self.estimator),
            self.config.thresholds(),
            self.config.fall_duration(),
            Arc::clone(&camera.output),
        );

        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("live-worker-{camera_id}"))
            .spawn(move || processor.run_live(&raw_frames, &worker_stop))
            .context("failed to spawn live worker")?;

        camera.poller = Some(poller);
        camera.live_worker = Some(Worker { stop, handle });
        tracing::info!(camera_id, url, "live pair started");
        Ok(())
    }
}

fn stop_pipeline(camera: CameraPipeline) {
    if let Some(worker) = camera.file_worker {
        worker.stop();
    }
    if let Some(worker) = camera.live_worker {
        worker.stop();
    }
    if let Some(poller) = camera.poller {
        poller.stop();
    }
}

/// Registered addresses may be bare hosts; default to plain HTTP.
fn snapshot_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}
