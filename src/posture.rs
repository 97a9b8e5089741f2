//! Posture scoring from shoulder and hip landmarks

use serde::{Deserialize, Serialize};

use crate::types::BodyLandmarks;

/// Spine lean (degrees) tolerated before any penalty
const SPINE_TOLERANCE_DEG: f64 = 10.0;
const SPINE_PENALTY_SPAN: f64 = 40.0;
const SPINE_PENALTY_MAX: f64 = 0.5;

/// Vertical offset between the two shoulders (or hips) tolerated before penalty
const LEVEL_TOLERANCE: f64 = 0.03;
const LEVEL_PENALTY_SPAN: f64 = 0.1;
const SHOULDER_PENALTY_MAX: f64 = 0.3;
const HIP_PENALTY_MAX: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureLabel {
    Aligned,
    SlightTilt,
    Adjust,
    Poor,
    NoBody,
}

impl PostureLabel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            PostureLabel::Aligned
        } else if score > 0.6 {
            PostureLabel::SlightTilt
        } else if score > 0.4 {
            PostureLabel::Adjust
        } else {
            PostureLabel::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostureLabel::Aligned => "Aligned",
            PostureLabel::SlightTilt => "Slight tilt",
            PostureLabel::Adjust => "Adjust spine/shoulders",
            PostureLabel::Poor => "Poor posture",
            PostureLabel::NoBody => "No body",
        }
    }
}

/// Posture score for one tick, with the raw geometry behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureAssessment {
    /// Alignment score in [0, 1]; 0 when no body is visible
    pub score: f64,
    pub label: PostureLabel,
    /// Torso lean from vertical in degrees
    pub spine_angle: f64,
    pub shoulder_level: f64,
    pub hip_level: f64,
}

impl PostureAssessment {
    pub fn no_body() -> Self {
        Self {
            score: 0.0,
            label: PostureLabel::NoBody,
            spine_angle: 0.0,
            shoulder_level: 0.0,
            hip_level: 0.0,
        }
    }

    pub fn has_body(&self) -> bool {
        self.label != PostureLabel::NoBody
    }
}

/// Stateless scorer; missing body is a normal state, not an error
#[derive(Debug, Clone, Copy, Default)]
pub struct PostureScorer;

impl PostureScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, body: Option<&BodyLandmarks>) -> PostureAssessment {
        let Some(body) = body else {
            return PostureAssessment::no_body();
        };

        let shoulders = body.left_shoulder.midpoint(&body.right_shoulder);
        let hips = body.left_hip.midpoint(&body.right_hip);

        // Image y grows downward, so an upright torso has hips below shoulders
        let dx = shoulders.x - hips.x;
        let dy = hips.y - shoulders.y + 1e-6;
        let spine_angle = dx.atan2(dy).to_degrees().abs();

        let shoulder_level = (body.left_shoulder.y - body.right_shoulder.y).abs();
        let hip_level = (body.left_hip.y - body.right_hip.y).abs();

        let mut score: f64 = 1.0;
        if spine_angle > SPINE_TOLERANCE_DEG {
            score -= ((spine_angle - SPINE_TOLERANCE_DEG) / SPINE_PENALTY_SPAN).min(SPINE_PENALTY_MAX);
        }
        if shoulder_level > LEVEL_TOLERANCE {
            score -= ((shoulder_level - LEVEL_TOLERANCE) / LEVEL_PENALTY_SPAN).min(SHOULDER_PENALTY_MAX);
        }
        if hip_level > LEVEL_TOLERANCE {
            score -= ((hip_level - LEVEL_TOLERANCE) / LEVEL_PENALTY_SPAN).min(HIP_PENALTY_MAX);
        }
        let score = score.clamp(0.0, 1.0);

        PostureAssessment {
            score,
            label: PostureLabel::from_score(score),
            spine_angle,
            shoulder_level,
            hip_level,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{BodyLandmarks, Point};

    /// Level shoulders directly above level hips
    pub fn upright() -> BodyLandmarks {
        BodyLandmarks {
            left_shoulder: Point::new(0.40, 0.40),
            right_shoulder: Point::new(0.60, 0.40),
            left_hip: Point::new(0.42, 0.75),
            right_hip: Point::new(0.58, 0.75),
        }
    }
}
