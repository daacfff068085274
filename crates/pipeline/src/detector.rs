use crate::errors::EstimatorError;
use crate::frame::encode_jpeg;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;

// COCO-17 keypoint layout. Index assignments are part of the estimator
// contract and not renegotiable.
pub const LEFT_SHOULDER: usize = 5;
pub const RIGHT_SHOULDER: usize = 6;
pub const LEFT_HIP: usize = 11;
pub const RIGHT_HIP: usize = 12;
pub const LEFT_KNEE: usize = 13;
pub const RIGHT_KNEE: usize = 14;
pub const LEFT_ANKLE: usize = 15;
pub const RIGHT_ANKLE: usize = 16;
pub const KEYPOINT_COUNT: usize = 17;

/// 2D joint position in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One detected person: bounding box plus the ordered joint set.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectDetection {
    pub bbox: BoundingBox,
    pub keypoints: Vec<Keypoint>,
    pub confidence: f32,
}

/// External pose-estimation collaborator.
///
/// Input is a frame, output is the ordered detection list for that
/// frame. The model behind this seam is a black box; detection order is
/// the only subject identity it provides.
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, frame: &RgbImage) -> Result<Vec<SubjectDetection>, EstimatorError>;
}

/// Pose estimator reached over HTTP: POST the JPEG-encoded frame,
/// receive a JSON detection list.
pub struct HttpPoseEstimator {
    client: reqwest::blocking::Client,
    endpoint: String,
    min_confidence: f32,
}

impl HttpPoseEstimator {
    pub fn new(
        endpoint: impl Into<String>,
        min_confidence: f32,
        timeout: Duration,
    ) -> Result<Self, EstimatorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            min_confidence,
        })
    }
}

impl PoseEstimator for HttpPoseEstimator {
    fn estimate(&self, frame: &RgbImage) -> Result<Vec<SubjectDetection>, EstimatorError> {
        let jpeg = encode_jpeg(frame)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()?;

        if !response.status().is_success() {
            return Err(EstimatorError::Status(response.status().as_u16()));
        }

        let body = response.text()?;
        let detections: Vec<SubjectDetection> = serde_json::from_str(&body)?;

        Ok(detections
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_wire_format_parses() {
        let body = r#"[{
            "bbox": {"x1": 10.0, "y1": 20.0, "x2": 110.0, "y2": 220.0},
            "keypoints": [{"x": 1.0, "y": 2.0}, {"x": 3.0, "y": 4.0}],
            "confidence": 0.87
        }]"#;
        let detections: Vec<SubjectDetection> = serde_json::from_str(body).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].keypoints.len(), 2);
        assert_eq!(detections[0].bbox.x2, 110.0);
    }

    #[test]
    fn unreachable_endpoint_is_a_request_error() {
        // Port 9 (discard) on localhost is not listening.
        let estimator = HttpPoseEstimator::new(
            "http://127.0.0.1:9/estimate",
            0.4,
            Duration::from_millis(200),
        )
        .unwrap();
        let frame = RgbImage::new(8, 8);
        assert!(matches!(
            estimator.estimate(&frame),
            Err(EstimatorError::Request(_))
        ));
    }
}
