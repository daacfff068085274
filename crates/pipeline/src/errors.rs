use thiserror::Error;

/// Joint geometry that cannot produce a posture for this frame.
///
/// Callers skip the affected subject and keep processing the rest of
/// the frame; a degenerate skeleton must never surface as a NaN angle.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("degenerate {segment} vector (coincident joints)")]
    DegenerateSegment { segment: &'static str },

    #[error("detection carries {got} keypoints, layout requires {need}")]
    MissingKeypoints { need: usize, got: usize },
}

/// Failure talking to the external pose estimator.
#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("estimator request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("estimator returned status {0}")]
    Status(u16),

    #[error("frame encode failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("malformed estimator response: {0}")]
    Malformed(#[from] serde_json::Error),
}
