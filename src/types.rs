//! Core types for the Mudra Flux pipeline
//!
//! This module defines the per-tick input shapes (landmark frames and physiology
//! readings) and the labels shared by several components. Component outputs live
//! next to the component that produces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Number of energy channels
pub const CHANNEL_COUNT: usize = 7;

/// Number of joints in a hand skeleton
pub const HAND_POINT_COUNT: usize = 21;

/// Seven bounded energy accumulators, each in [0, 1]
pub type EnergyVector = [f64; CHANNEL_COUNT];

/// Normalized image-space point, both axes in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance
    pub fn dist_sq(&self, other: &Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// Euclidean distance
    pub fn dist(&self, other: &Point) -> f64 {
        self.dist_sq(other).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Hand joint indices (MediaPipe hand topology)
pub mod joints {
    pub const WRIST: usize = 0;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// One 21-point hand skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks {
    pub points: [Point; HAND_POINT_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Point; HAND_POINT_COUNT]) -> Self {
        Self { points }
    }

    pub fn point(&self, joint: usize) -> Point {
        self.points[joint]
    }

    pub fn wrist(&self) -> Point {
        self.points[joints::WRIST]
    }
}

/// Landmarks of one eye
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub inner: Point,
    pub outer: Point,
    pub top: Point,
    pub bottom: Point,
    /// Iris center, only present on refined face meshes
    #[serde(default)]
    pub iris: Option<Point>,
}

/// Face-mesh subset consumed by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
    pub nose_tip: Point,
    pub upper_lip: Point,
    pub lower_lip: Point,
    /// Carried for overlay consumers
    #[serde(default)]
    pub forehead: Option<Point>,
}

/// Body-pose subset consumed by the core
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyLandmarks {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_hip: Point,
    pub right_hip: Point,
}

/// Everything the vision collaborators observed during one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    #[serde(default)]
    pub face: Option<FaceLandmarks>,
    #[serde(default)]
    pub body: Option<BodyLandmarks>,
}

impl LandmarkFrame {
    /// True when nothing at all was observed
    pub fn is_empty(&self) -> bool {
        self.hands.is_empty() && self.face.is_none() && self.body.is_none()
    }

    /// Reject non-finite coordinates
    pub fn validate(&self) -> Result<(), ComputeError> {
        for (h, hand) in self.hands.iter().enumerate() {
            if let Some(j) = hand.points.iter().position(|p| !p.is_finite()) {
                return Err(ComputeError::InvalidLandmark(format!(
                    "hand {h} joint {j} is not finite"
                )));
            }
        }

        if let Some(face) = &self.face {
            let mut points = vec![
                ("nose_tip", face.nose_tip),
                ("upper_lip", face.upper_lip),
                ("lower_lip", face.lower_lip),
            ];
            for (name, eye) in [("left_eye", &face.left_eye), ("right_eye", &face.right_eye)] {
                points.push((name, eye.inner));
                points.push((name, eye.outer));
                points.push((name, eye.top));
                points.push((name, eye.bottom));
                if let Some(iris) = eye.iris {
                    points.push((name, iris));
                }
            }
            if let Some((name, _)) = points.iter().find(|(_, p)| !p.is_finite()) {
                return Err(ComputeError::InvalidLandmark(format!(
                    "face landmark {name} is not finite"
                )));
            }
        }

        if let Some(body) = &self.body {
            let points = [
                body.left_shoulder,
                body.right_shoulder,
                body.left_hip,
                body.right_hip,
            ];
            if points.iter().any(|p| !p.is_finite()) {
                return Err(ComputeError::InvalidLandmark(
                    "body landmark is not finite".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// One reading from the heart-rate / SpO2 producer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysiologyReading {
    /// Pre-filtered heart rate (bpm); 0 means the producer lost the pulse
    pub heart_rate: f64,
    /// Blood oxygen saturation (percent)
    #[serde(default)]
    pub spo2: f64,
    /// A beat was detected since the previous reading
    #[serde(default)]
    pub beat_event: bool,
}

impl PhysiologyReading {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.heart_rate.is_finite() || self.heart_rate < 0.0 {
            return Err(ComputeError::InvalidReading(format!(
                "heart_rate must be a finite value >= 0, got {}",
                self.heart_rate
            )));
        }
        if !self.spo2.is_finite() || self.spo2 < 0.0 {
            return Err(ComputeError::InvalidReading(format!(
                "spo2 must be a finite value >= 0, got {}",
                self.spo2
            )));
        }
        Ok(())
    }
}

/// Everything the host hands the session for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub frame: LandmarkFrame,
    /// New physiology reading that arrived since the previous tick
    #[serde(default)]
    pub physiology: Option<PhysiologyReading>,
    /// Touch-gesture trigger; derived from the frame when absent
    #[serde(default)]
    pub touch: Option<bool>,
}

impl TickInput {
    pub fn new(timestamp: DateTime<Utc>, frame: LandmarkFrame) -> Self {
        Self {
            timestamp,
            frame,
            physiology: None,
            touch: None,
        }
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        self.frame.validate()?;
        if let Some(reading) = &self.physiology {
            reading.validate()?;
        }
        Ok(())
    }
}

/// Hand gesture recognized during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    Gyan,
    Prana,
    Apana,
    Surya,
    Varun,
    Anjali,
    OpenPalm,
    Fist,
    Peace,
}

impl GestureLabel {
    /// Labels that carry mudra semantics and drive the energy model
    pub const MUDRAS: [GestureLabel; 6] = [
        GestureLabel::Gyan,
        GestureLabel::Prana,
        GestureLabel::Apana,
        GestureLabel::Surya,
        GestureLabel::Varun,
        GestureLabel::Anjali,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Gyan => "Gyan Mudra",
            GestureLabel::Prana => "Prana Mudra",
            GestureLabel::Apana => "Apana Mudra",
            GestureLabel::Surya => "Surya Mudra",
            GestureLabel::Varun => "Varun Mudra",
            GestureLabel::Anjali => "Anjali Mudra",
            GestureLabel::OpenPalm => "Open Palm",
            GestureLabel::Fist => "Fist",
            GestureLabel::Peace => "Peace",
        }
    }

    pub fn is_mudra(&self) -> bool {
        Self::MUDRAS.contains(self)
    }

    /// Energy channel a mudra charges; hand shapes charge nothing
    pub fn channel(&self) -> Option<Channel> {
        match self {
            GestureLabel::Prana => Some(Channel::Root),
            GestureLabel::Apana | GestureLabel::Varun => Some(Channel::Sacral),
            GestureLabel::Surya => Some(Channel::SolarPlexus),
            GestureLabel::Anjali => Some(Channel::Throat),
            GestureLabel::Gyan => Some(Channel::Crown),
            GestureLabel::OpenPalm | GestureLabel::Fist | GestureLabel::Peace => None,
        }
    }
}

/// Energy channel identifiers, ordered base to crown
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Root,
    Sacral,
    SolarPlexus,
    Heart,
    Throat,
    ThirdEye,
    Crown,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Root,
        Channel::Sacral,
        Channel::SolarPlexus,
        Channel::Heart,
        Channel::Throat,
        Channel::ThirdEye,
        Channel::Crown,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(idx: usize) -> Option<Channel> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Root => "Root",
            Channel::Sacral => "Sacral",
            Channel::SolarPlexus => "Solar Plexus",
            Channel::Heart => "Heart",
            Channel::Throat => "Throat",
            Channel::ThirdEye => "Third Eye",
            Channel::Crown => "Crown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_index_round_trip() {
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
            assert_eq!(Channel::from_index(i), Some(*channel));
        }
        assert_eq!(Channel::from_index(CHANNEL_COUNT), None);
    }

    #[test]
    fn test_only_mudras_charge_channels() {
        for label in GestureLabel::MUDRAS {
            assert!(label.channel().is_some());
        }
        assert!(GestureLabel::Fist.channel().is_none());
        assert!(!GestureLabel::Peace.is_mudra());
    }

    #[test]
    fn test_hand_requires_21_points() {
        let json = serde_json::to_string(&vec![Point::new(0.1, 0.2); 20]).unwrap();
        let parsed: Result<HandLandmarks, _> = serde_json::from_str(&json);
        assert!(parsed.is_err());

        let json = serde_json::to_string(&vec![Point::new(0.1, 0.2); 21]).unwrap();
        let parsed: HandLandmarks = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.wrist(), Point::new(0.1, 0.2));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut points = [Point::new(0.5, 0.5); HAND_POINT_COUNT];
        points[7].x = f64::NAN;
        let frame = LandmarkFrame {
            hands: vec![HandLandmarks::new(points)],
            ..Default::default()
        };
        assert!(matches!(
            frame.validate(),
            Err(ComputeError::InvalidLandmark(_))
        ));
    }

    #[test]
    fn test_reading_validation() {
        let ok = PhysiologyReading {
            heart_rate: 72.0,
            spo2: 98.0,
            beat_event: true,
        };
        assert!(ok.validate().is_ok());

        let negative = PhysiologyReading {
            heart_rate: -1.0,
            ..ok
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_tick_input_defaults() {
        let json = r#"{"timestamp": "2024-01-15T14:00:00Z"}"#;
        let tick: TickInput = serde_json::from_str(json).unwrap();
        assert!(tick.frame.is_empty());
        assert!(tick.physiology.is_none());
        assert!(tick.touch.is_none());
    }
}
