use anyhow::Result;
use pipeline::PostureThresholds;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub uploads_dir: String,
    pub estimator_url: String,
    pub estimator_timeout_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub max_upload_mb: usize,
    pub min_confidence: f32,
    pub fall_deg: f32,
    pub sit_deg: f32,
    pub chair_height_ratio: f32,
    pub fall_duration_secs: f64,
    pub poll_workers: usize,
    pub raw_buffer_capacity: usize,
    pub output_buffer_capacity: usize,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let uploads_dir = env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());

        let estimator_url = env::var("ESTIMATOR_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9090/estimate".to_string());

        let estimator_timeout_ms = env::var("ESTIMATOR_TIMEOUT_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);

        let snapshot_timeout_ms = env::var("SNAPSHOT_TIMEOUT_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);

        let max_upload_mb = env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "512".to_string())
            .parse()
            .unwrap_or(512);

        let min_confidence = env::var("MIN_CONFIDENCE")
            .unwrap_or_else(|_| "0.4".to_string())
            .parse()
            .unwrap_or(0.4);

        let fall_deg = env::var("FALL_DEG")
            .unwrap_or_else(|_| "45".to_string())
            .parse()
            .unwrap_or(45.0);

        let sit_deg = env::var("SIT_DEG")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50.0);

        let chair_height_ratio = env::var("CHAIR_HEIGHT_RATIO")
            .unwrap_or_else(|_| "0.6".to_string())
            .parse()
            .unwrap_or(0.6);

        let fall_duration_secs = env::var("FALL_DURATION_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2.0);

        let poll_workers = env::var("POLL_WORKERS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);

        let raw_buffer_capacity = env::var("RAW_BUFFER_CAPACITY")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let output_buffer_capacity = env::var("OUTPUT_BUFFER_CAPACITY")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(Self {
            listen_addr,
            uploads_dir,
            estimator_url,
            estimator_timeout_ms,
            snapshot_timeout_ms,
            max_upload_mb,
            min_confidence,
            fall_deg,
            sit_deg,
            chair_height_ratio,
            fall_duration_secs,
            poll_workers,
            raw_buffer_capacity,
            output_buffer_capacity,
        })
    }

    pub fn thresholds(&self) -> PostureThresholds {
        PostureThresholds {
            fall_deg: self.fall_deg,
            sit_deg: self.sit_deg,
            chair_height_ratio: self.chair_height_ratio,
        }
    }

    pub fn fall_duration(&self) -> Duration {
        Duration::from_secs_f64(self.fall_duration_secs)
    }

    pub fn estimator_timeout(&self) -> Duration {
        Duration::from_millis(self.estimator_timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
