use crate::detector::{
    KEYPOINT_COUNT, Keypoint, LEFT_ANKLE, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, RIGHT_ANKLE,
    RIGHT_HIP, RIGHT_KNEE, RIGHT_SHOULDER,
};
use crate::errors::GeometryError;

/// Body orientation of one subject in one frame. Stateless; derived
/// from joint geometry alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Standing,
    SittingOnSupport,
    SittingOnGround,
    Lying,
}

impl Posture {
    pub fn label(&self) -> &'static str {
        match self {
            Posture::Standing => "STANDING",
            Posture::SittingOnSupport => "SITTING_ON_SUPPORT",
            Posture::SittingOnGround => "SITTING_ON_GROUND",
            Posture::Lying => "LYING",
        }
    }
}

/// Classification thresholds, all tunable.
///
/// The defaults keep `sit_deg` above `fall_deg`, carried over from the
/// reference configuration: lying is evaluated first, so at these
/// defaults the sitting branches only fire when `sit_deg` is configured
/// below `fall_deg`. Evaluation order is fixed; the thresholds are not.
#[derive(Debug, Clone, Copy)]
pub struct PostureThresholds {
    /// Torso angle (degrees from vertical) at or above which the
    /// subject is lying.
    pub fall_deg: f32,
    /// Torso angle at or above which the subject is sitting.
    pub sit_deg: f32,
    /// Hip-height ratio at or below which a sitting subject is on a
    /// raised support rather than the ground.
    pub chair_height_ratio: f32,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            fall_deg: 45.0,
            sit_deg: 50.0,
            chair_height_ratio: 0.6,
        }
    }
}

/// Derived angles and ratios for one subject's skeleton.
#[derive(Debug, Clone, Copy)]
pub struct PoseGeometry {
    /// Angle between the hip-to-shoulder vector and vertical, degrees.
    pub torso_angle_deg: f32,
    /// Bend angle between thigh and lower-leg vectors, degrees.
    pub knee_angle_deg: f32,
    /// Distance hip-to-ankle over distance shoulder-to-ankle.
    pub hip_height_ratio: f32,
}

impl PoseGeometry {
    /// Threshold policy, evaluated in order: lying, sitting, standing.
    pub fn classify(&self, thresholds: &PostureThresholds) -> Posture {
        if self.torso_angle_deg >= thresholds.fall_deg {
            Posture::Lying
        } else if self.torso_angle_deg >= thresholds.sit_deg {
            if self.hip_height_ratio <= thresholds.chair_height_ratio {
                Posture::SittingOnSupport
            } else {
                Posture::SittingOnGround
            }
        } else {
            Posture::Standing
        }
    }
}

// Upward direction in image coordinates (y grows downward).
const VERTICAL: (f32, f32) = (0.0, -1.0);

const EPSILON: f32 = 1e-6;

fn midpoint(a: Keypoint, b: Keypoint) -> Keypoint {
    Keypoint {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

fn diff(a: Keypoint, b: Keypoint) -> (f32, f32) {
    (a.x - b.x, a.y - b.y)
}

fn norm(v: (f32, f32)) -> f32 {
    (v.0 * v.0 + v.1 * v.1).sqrt()
}

fn angle_between_deg(
    a: (f32, f32),
    a_segment: &'static str,
    b: (f32, f32),
    b_segment: &'static str,
) -> Result<f32, GeometryError> {
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a < EPSILON {
        return Err(GeometryError::DegenerateSegment { segment: a_segment });
    }
    if norm_b < EPSILON {
        return Err(GeometryError::DegenerateSegment { segment: b_segment });
    }
    // Clamp against rounding so acos never sees a value outside [-1, 1].
    let cos = ((a.0 * b.0 + a.1 * b.1) / (norm_a * norm_b)).clamp(-1.0, 1.0);
    Ok(cos.acos().to_degrees())
}

/// Measure torso angle, knee bend, and hip-height ratio from a COCO-17
/// joint set.
pub fn measure_pose(keypoints: &[Keypoint]) -> Result<PoseGeometry, GeometryError> {
    if keypoints.len() < KEYPOINT_COUNT {
        return Err(GeometryError::MissingKeypoints {
            need: KEYPOINT_COUNT,
            got: keypoints.len(),
        });
    }

    let shoulder_mid = midpoint(keypoints[LEFT_SHOULDER], keypoints[RIGHT_SHOULDER]);
    let hip_mid = midpoint(keypoints[LEFT_HIP], keypoints[RIGHT_HIP]);
    let knee_mid = midpoint(keypoints[LEFT_KNEE], keypoints[RIGHT_KNEE]);
    let ankle_mid = midpoint(keypoints[LEFT_ANKLE], keypoints[RIGHT_ANKLE]);

    let torso = diff(shoulder_mid, hip_mid);
    let thigh = diff(knee_mid, hip_mid);
    let lower_leg = diff(ankle_mid, knee_mid);

    let torso_angle_deg = angle_between_deg(torso, "torso", VERTICAL, "vertical")?;
    let knee_angle_deg = angle_between_deg(thigh, "thigh", lower_leg, "lower leg")?;

    let total_height = norm(diff(shoulder_mid, ankle_mid));
    if total_height < EPSILON {
        return Err(GeometryError::DegenerateSegment {
            segment: "shoulder-ankle",
        });
    }
    let hip_height_ratio = norm(diff(hip_mid, ankle_mid)) / total_height;

    Ok(PoseGeometry {
        torso_angle_deg,
        knee_angle_deg,
        hip_height_ratio,
    })
}

/// Measure and classify in one step.
pub fn classify_posture(
    keypoints: &[Keypoint],
    thresholds: &PostureThresholds,
) -> Result<Posture, GeometryError> {
    Ok(measure_pose(keypoints)?.classify(thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 17-keypoint skeleton where left and right joints of each
    /// pair coincide, so the pair midpoint is the given point.
    fn skeleton(
        shoulder: (f32, f32),
        hip: (f32, f32),
        knee: (f32, f32),
        ankle: (f32, f32),
    ) -> Vec<Keypoint> {
        let mut keypoints = vec![Keypoint { x: 0.0, y: 0.0 }; KEYPOINT_COUNT];
        for (index, (x, y)) in [
            (LEFT_SHOULDER, shoulder),
            (RIGHT_SHOULDER, shoulder),
            (LEFT_HIP, hip),
            (RIGHT_HIP, hip),
            (LEFT_KNEE, knee),
            (RIGHT_KNEE, knee),
            (LEFT_ANKLE, ankle),
            (RIGHT_ANKLE, ankle),
        ] {
            keypoints[index] = Keypoint { x, y };
        }
        keypoints
    }

    // ========== Measurement ==========

    #[test]
    fn upright_skeleton_has_zero_torso_angle() {
        let keypoints = skeleton((0.0, 0.0), (0.0, 50.0), (0.0, 80.0), (0.0, 110.0));
        let geometry = measure_pose(&keypoints).unwrap();
        assert!(geometry.torso_angle_deg.abs() < 1e-3);
        assert!(geometry.knee_angle_deg.abs() < 1e-3, "straight leg");
    }

    #[test]
    fn horizontal_torso_measures_ninety_degrees() {
        let keypoints = skeleton((100.0, 50.0), (0.0, 50.0), (0.0, 60.0), (0.0, 70.0));
        let geometry = measure_pose(&keypoints).unwrap();
        assert!((geometry.torso_angle_deg - 90.0).abs() < 1e-3);
    }

    #[test]
    fn right_angle_knee_bend() {
        let keypoints = skeleton((0.0, -50.0), (0.0, 0.0), (0.0, 50.0), (50.0, 50.0));
        let geometry = measure_pose(&keypoints).unwrap();
        assert!((geometry.knee_angle_deg - 90.0).abs() < 1e-3);
    }

    // ========== Classification policy ==========

    #[test]
    fn upright_classifies_standing() {
        let keypoints = skeleton((0.0, 0.0), (0.0, 50.0), (0.0, 80.0), (0.0, 110.0));
        let posture = classify_posture(&keypoints, &PostureThresholds::default()).unwrap();
        assert_eq!(posture, Posture::Standing);
    }

    #[test]
    fn horizontal_classifies_lying() {
        let keypoints = skeleton((100.0, 50.0), (0.0, 50.0), (0.0, 60.0), (0.0, 70.0));
        let posture = classify_posture(&keypoints, &PostureThresholds::default()).unwrap();
        assert_eq!(posture, Posture::Lying);
    }

    #[test]
    fn angle_exactly_at_fall_threshold_is_lying() {
        // Diagonal torso, roughly 45 degrees. Pin the threshold to the
        // measured angle so equality hits the >= branch exactly.
        let keypoints = skeleton((50.0, 0.0), (0.0, 50.0), (25.0, 80.0), (25.0, 110.0));
        let geometry = measure_pose(&keypoints).unwrap();
        let thresholds = PostureThresholds {
            fall_deg: geometry.torso_angle_deg,
            ..PostureThresholds::default()
        };
        assert_eq!(geometry.classify(&thresholds), Posture::Lying);
    }

    #[test]
    fn just_below_fall_threshold_is_standing_at_defaults() {
        let keypoints = skeleton((50.0, 0.0), (0.0, 50.0), (25.0, 80.0), (25.0, 110.0));
        let geometry = measure_pose(&keypoints).unwrap();
        let thresholds = PostureThresholds {
            fall_deg: geometry.torso_angle_deg + 0.1,
            ..PostureThresholds::default()
        };
        // sit_deg (50) still sits above the angle (~45), so neither
        // lying nor sitting applies.
        assert_eq!(geometry.classify(&thresholds), Posture::Standing);
    }

    #[test]
    fn sitting_branches_reachable_when_sit_below_fall() {
        let thresholds = PostureThresholds {
            fall_deg: 60.0,
            sit_deg: 30.0,
            chair_height_ratio: 0.6,
        };

        // ~45 degree torso, ankles well below hips: low ratio, support.
        let on_support = skeleton((50.0, 0.0), (0.0, 50.0), (10.0, 60.0), (0.0, 80.0));
        assert_eq!(
            classify_posture(&on_support, &thresholds).unwrap(),
            Posture::SittingOnSupport
        );

        // Same torso, ankles drawn up near the shoulders: ratio > 0.6.
        let on_ground = skeleton((50.0, 0.0), (0.0, 50.0), (25.0, 30.0), (50.0, 10.0));
        assert_eq!(
            classify_posture(&on_ground, &thresholds).unwrap(),
            Posture::SittingOnGround
        );
    }

    #[test]
    fn default_thresholds_never_reach_sitting() {
        // The default sit threshold lies above the lying threshold, so
        // any angle past 45 already classified as lying.
        for angle_frac in [0.0f32, 0.3, 0.7, 1.0] {
            let x = 100.0 * angle_frac;
            let keypoints = skeleton((x, 0.0), (0.0, 100.0), (5.0, 130.0), (5.0, 160.0));
            let posture = classify_posture(&keypoints, &PostureThresholds::default()).unwrap();
            assert_ne!(posture, Posture::SittingOnSupport);
            assert_ne!(posture, Posture::SittingOnGround);
        }
    }

    // ========== Degenerate input ==========

    #[test]
    fn coincident_shoulder_and_hip_is_invalid_geometry() {
        let keypoints = skeleton((5.0, 5.0), (5.0, 5.0), (5.0, 30.0), (5.0, 60.0));
        let result = classify_posture(&keypoints, &PostureThresholds::default());
        assert!(matches!(
            result,
            Err(GeometryError::DegenerateSegment { segment: "torso" })
        ));
    }

    #[test]
    fn coincident_hip_and_knee_is_invalid_geometry() {
        let keypoints = skeleton((0.0, 0.0), (0.0, 50.0), (0.0, 50.0), (0.0, 80.0));
        let result = measure_pose(&keypoints);
        assert!(matches!(
            result,
            Err(GeometryError::DegenerateSegment { segment: "thigh" })
        ));
    }

    #[test]
    fn short_keypoint_list_is_rejected() {
        let keypoints = vec![Keypoint { x: 1.0, y: 1.0 }; 10];
        let result = measure_pose(&keypoints);
        assert!(matches!(
            result,
            Err(GeometryError::MissingKeypoints { need: 17, got: 10 })
        ));
    }
}
