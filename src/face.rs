//! Face analysis: eye closure, gaze, mood, and nose touch
//!
//! Everything here is a ratio of landmark distances so the thresholds hold
//! regardless of how far the user sits from the camera.

use serde::{Deserialize, Serialize};

use crate::config::FaceConfig;
use crate::types::{joints, EyeLandmarks, FaceLandmarks, HandLandmarks};

/// Eye widths below this are treated as missing
const MIN_EYE_WIDTH: f64 = 1e-6;

/// Where the user is looking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeLabel {
    Center,
    /// Iris off-center toward the user's left (mirrored camera: positive image x)
    Left,
    Right,
    /// Head turned away from the camera
    Distracted,
    /// No face in frame
    Absent,
}

impl GazeLabel {
    pub fn is_centered(&self) -> bool {
        matches!(self, GazeLabel::Center)
    }

    /// Head turned away, the energy model's distraction signal
    pub fn is_distracted(&self) -> bool {
        matches!(self, GazeLabel::Distracted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Expressive,
    Calm,
    Neutral,
    DeeplyRelaxed,
    CalmBalanced,
    ActiveFocused,
    HighEnergy,
    Scanning,
}

impl Mood {
    /// Heart-rate band used when no face is visible
    pub fn from_heart_rate(bpm: f64) -> Self {
        if bpm <= 0.0 {
            Mood::Scanning
        } else if bpm < 65.0 {
            Mood::DeeplyRelaxed
        } else if bpm < 85.0 {
            Mood::CalmBalanced
        } else if bpm < 110.0 {
            Mood::ActiveFocused
        } else {
            Mood::HighEnergy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Expressive => "Expressive / Happy",
            Mood::Calm => "Calm / Meditative",
            Mood::Neutral => "Neutral",
            Mood::DeeplyRelaxed => "Deeply Relaxed",
            Mood::CalmBalanced => "Calm & Balanced",
            Mood::ActiveFocused => "Active / Focused",
            Mood::HighEnergy => "High Energy",
            Mood::Scanning => "Scanning...",
        }
    }
}

/// Face-derived signals for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceReading {
    pub present: bool,
    /// Mean eyelid gap over eye width
    pub eye_ratio: f64,
    pub eyes_closed: bool,
    pub mouth_gap: f64,
    /// Nose offset from the midpoint of the outer eye corners
    pub head_offset: f64,
    /// Scaled iris offset; 0 without iris landmarks
    pub gaze_x: f64,
    pub gaze: GazeLabel,
    pub mood: Mood,
    /// Vertical nose position, the breathing signal
    pub nose_y: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FaceAnalyzer {
    config: FaceConfig,
}

impl FaceAnalyzer {
    pub fn new(config: FaceConfig) -> Self {
        Self { config }
    }

    /// Analyze the face; `bpm` only feeds the mood fallback when absent
    pub fn analyze(&self, face: Option<&FaceLandmarks>, bpm: f64) -> FaceReading {
        let Some(face) = face else {
            return FaceReading {
                present: false,
                eye_ratio: self.config.eye_closed_ratio,
                eyes_closed: false,
                mouth_gap: 0.0,
                head_offset: 0.0,
                gaze_x: 0.0,
                gaze: GazeLabel::Absent,
                mood: Mood::from_heart_rate(bpm),
                nose_y: None,
            };
        };

        let ratios: Vec<f64> = [&face.left_eye, &face.right_eye]
            .into_iter()
            .filter_map(eye_ratio)
            .collect();
        let eye_ratio = if ratios.is_empty() {
            self.config.eye_closed_ratio
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };
        let eyes_closed = eye_ratio < self.config.eye_closed_ratio;

        let eye_mid_x = (face.left_eye.outer.x + face.right_eye.outer.x) * 0.5;
        let head_offset = face.nose_tip.x - eye_mid_x;

        let gazes: Vec<f64> = [&face.left_eye, &face.right_eye]
            .into_iter()
            .filter_map(|eye| self.iris_gaze(eye))
            .collect();
        let gaze_x = if gazes.is_empty() {
            0.0
        } else {
            gazes.iter().sum::<f64>() / gazes.len() as f64
        };

        let gaze = if head_offset.abs() > self.config.head_turn_threshold {
            GazeLabel::Distracted
        } else if eyes_closed {
            GazeLabel::Center
        } else if gaze_x > self.config.iris_gaze_threshold {
            GazeLabel::Left
        } else if gaze_x < -self.config.iris_gaze_threshold {
            GazeLabel::Right
        } else {
            GazeLabel::Center
        };

        let mouth_gap = face.upper_lip.dist(&face.lower_lip);
        let mood = if mouth_gap > self.config.mouth_open_threshold {
            Mood::Expressive
        } else if eyes_closed {
            Mood::Calm
        } else {
            Mood::Neutral
        };

        FaceReading {
            present: true,
            eye_ratio,
            eyes_closed,
            mouth_gap,
            head_offset,
            gaze_x,
            gaze,
            mood,
            nose_y: Some(face.nose_tip.y),
        }
    }

    /// Thumb or index fingertip of any hand near the nose tip
    pub fn detects_nose_touch(&self, face: Option<&FaceLandmarks>, hands: &[HandLandmarks]) -> bool {
        let Some(face) = face else {
            return false;
        };
        hands.iter().any(|hand| {
            [joints::THUMB_TIP, joints::INDEX_TIP]
                .iter()
                .any(|&tip| hand.point(tip).dist(&face.nose_tip) < self.config.nose_touch_radius)
        })
    }

    fn iris_gaze(&self, eye: &EyeLandmarks) -> Option<f64> {
        let iris = eye.iris?;
        let width = eye.inner.dist(&eye.outer);
        if width < MIN_EYE_WIDTH {
            return None;
        }
        let center_x = (eye.inner.x + eye.outer.x) * 0.5;
        Some((iris.x - center_x) / (width * 0.5) * self.config.iris_gain)
    }
}

fn eye_ratio(eye: &EyeLandmarks) -> Option<f64> {
    let width = eye.inner.dist(&eye.outer);
    (width >= MIN_EYE_WIDTH).then(|| eye.top.dist(&eye.bottom) / width)
}
