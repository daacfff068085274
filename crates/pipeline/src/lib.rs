//! Concurrent frame pipeline for multi-camera fall detection.
//!
//! Frames flow from an acquisition stage (HTTP snapshot poller or
//! sequential video file decode) through a processor that runs an
//! external pose estimator, classifies each subject's posture, tracks
//! sustained lying per subject, and draws annotations. Annotated frames
//! land in a bounded drop-oldest buffer that the gateway drains into an
//! MJPEG stream. Every inter-stage buffer drops its oldest frame under
//! load; nothing in the pipeline blocks a producer.

pub mod annotate;
pub mod buffer;
pub mod detector;
pub mod errors;
pub mod fall;
pub mod frame;
pub mod poller;
pub mod posture;
pub mod processor;
pub mod video;

pub use buffer::FrameBuffer;
pub use detector::{HttpPoseEstimator, PoseEstimator, SubjectDetection};
pub use errors::{EstimatorError, GeometryError};
pub use fall::FallTracker;
pub use poller::{PollerConfig, SnapshotPoller};
pub use posture::{Posture, PostureThresholds};
pub use processor::FrameProcessor;
pub use video::{FrameSource, VideoFileSource};
