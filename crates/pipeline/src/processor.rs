use crate::annotate::annotate_subject;
use crate::buffer::FrameBuffer;
use crate::detector::PoseEstimator;
use crate::fall::FallTracker;
use crate::posture::{PostureThresholds, classify_posture};
use crate::video::FrameSource;
use anyhow::Result;
use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Delay between processed frames, approximating real-time playback.
pub const FRAME_PACING: Duration = Duration::from_millis(30);

/// Consumes raw frames, runs the pose estimator, classifies and tracks
/// each subject, draws annotations, and queues the result for
/// streaming.
///
/// Fall tracking is keyed by the detection's index in the frame's
/// result list; see [`crate::fall::SubjectKey`] for the identity
/// caveat.
pub struct FrameProcessor {
    estimator: Arc<dyn PoseEstimator>,
    thresholds: PostureThresholds,
    tracker: FallTracker,
    output: Arc<FrameBuffer>,
}

impl FrameProcessor {
    pub fn new(
        estimator: Arc<dyn PoseEstimator>,
        thresholds: PostureThresholds,
        fall_duration: Duration,
        output: Arc<FrameBuffer>,
    ) -> Self {
        Self {
            estimator,
            thresholds,
            tracker: FallTracker::new(fall_duration),
            output,
        }
    }

    pub fn output(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.output)
    }

    /// Process one frame end to end and push it into the output buffer.
    ///
    /// An estimator failure forwards the frame unannotated; a subject
    /// with unclassifiable geometry is skipped without affecting the
    /// rest of the frame.
    pub fn process_frame(&mut self, mut frame: RgbImage) {
        let detections = match self.estimator.estimate(&frame) {
            Ok(detections) => detections,
            Err(error) => {
                tracing::warn!(%error, "pose estimation failed, forwarding raw frame");
                self.output.push(frame);
                return;
            }
        };

        let now = Instant::now();
        for (index, detection) in detections.iter().enumerate() {
            let posture = match classify_posture(&detection.keypoints, &self.thresholds) {
                Ok(posture) => posture,
                Err(error) => {
                    tracing::debug!(subject = index, %error, "subject unclassifiable, skipped");
                    continue;
                }
            };

            let fall_confirmed = self.tracker.observe(index, posture, now);
            if fall_confirmed {
                tracing::debug!(subject = index, "fall confirmed");
            }

            annotate_subject(&mut frame, detection, posture, fall_confirmed);
        }

        self.output.push(frame);
    }

    /// Drive the processor from a sequential file source until end of
    /// stream or until the stop flag is raised.
    pub fn run_file(&mut self, source: &mut dyn FrameSource, stop: &AtomicBool) -> Result<()> {
        let mut frames = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            self.process_frame(frame);
            frames += 1;
            if frames % 30 == 0 {
                tracing::debug!(frames, "file processing progress");
            }
            std::thread::sleep(FRAME_PACING);
        }
        tracing::info!(frames, "file processing finished");
        Ok(())
    }

    /// Drive the processor from a live raw-frame buffer until the stop
    /// flag is raised. Reads the newest frame each cycle; an empty
    /// buffer just waits for the next cycle.
    pub fn run_live(&mut self, raw_frames: &FrameBuffer, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            if let Some(frame) = raw_frames.latest() {
                self.process_frame(frame);
            }
            std::thread::sleep(FRAME_PACING);
        }
    }
}
