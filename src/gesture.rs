//! Gesture classification
//!
//! Mudras are described as data: each rule lists finger constraints that one
//! generic interpreter evaluates against a hand skeleton. All distances are
//! normalized by the hand scale (wrist to middle fingertip), and "extended" is a
//! squared-distance comparison against the wrist, so no trigonometry is involved.
//!
//! Priority:
//! 1. Anjali (two wrists together) short-circuits every per-hand test
//! 2. Per hand, the first matching rule in [`MUDRA_RULES`] wins
//! 3. Open palm / fist / peace are separate, lower-priority hand shapes

use serde::{Deserialize, Serialize};

use crate::config::GestureConfig;
use crate::types::{joints, GestureLabel, HandLandmarks};

/// Added to the hand scale before dividing
const SCALE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    fn tip(&self) -> usize {
        match self {
            Finger::Thumb => joints::THUMB_TIP,
            Finger::Index => joints::INDEX_TIP,
            Finger::Middle => joints::MIDDLE_TIP,
            Finger::Ring => joints::RING_TIP,
            Finger::Pinky => joints::PINKY_TIP,
        }
    }

    /// Proximal joint used for the extension test
    fn pip(&self) -> usize {
        match self {
            Finger::Thumb => joints::THUMB_IP,
            Finger::Index => joints::INDEX_PIP,
            Finger::Middle => joints::MIDDLE_PIP,
            Finger::Ring => joints::RING_PIP,
            Finger::Pinky => joints::PINKY_PIP,
        }
    }
}

/// Which joint of a finger a touch constraint measures to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Tip,
    Pip,
}

/// Threshold a touch constraint compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchThreshold {
    Touch,
    Surya,
}

/// One finger constraint of a mudra rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Thumb tip within the threshold of the given finger joint
    TouchesThumb(Finger, Joint, TouchThreshold),
    Extended(Finger),
    Folded(Finger),
}

/// A named gesture defined as a conjunction of constraints
#[derive(Debug, Clone, Copy)]
pub struct MudraRule {
    pub label: GestureLabel,
    pub constraints: &'static [Constraint],
}

/// Per-hand mudra rules in priority order
pub const MUDRA_RULES: [MudraRule; 5] = [
    MudraRule {
        label: GestureLabel::Gyan,
        constraints: &[Constraint::TouchesThumb(
            Finger::Index,
            Joint::Tip,
            TouchThreshold::Touch,
        )],
    },
    MudraRule {
        label: GestureLabel::Prana,
        constraints: &[
            Constraint::TouchesThumb(Finger::Ring, Joint::Tip, TouchThreshold::Touch),
            Constraint::TouchesThumb(Finger::Pinky, Joint::Tip, TouchThreshold::Touch),
            Constraint::Extended(Finger::Index),
            Constraint::Extended(Finger::Middle),
        ],
    },
    MudraRule {
        label: GestureLabel::Apana,
        constraints: &[
            Constraint::TouchesThumb(Finger::Middle, Joint::Tip, TouchThreshold::Touch),
            Constraint::TouchesThumb(Finger::Ring, Joint::Tip, TouchThreshold::Touch),
            Constraint::Extended(Finger::Index),
            Constraint::Extended(Finger::Pinky),
        ],
    },
    MudraRule {
        label: GestureLabel::Surya,
        constraints: &[
            Constraint::Folded(Finger::Ring),
            Constraint::TouchesThumb(Finger::Ring, Joint::Pip, TouchThreshold::Surya),
        ],
    },
    MudraRule {
        label: GestureLabel::Varun,
        constraints: &[
            Constraint::TouchesThumb(Finger::Pinky, Joint::Tip, TouchThreshold::Touch),
            Constraint::Extended(Finger::Index),
            Constraint::Extended(Finger::Middle),
            Constraint::Extended(Finger::Ring),
        ],
    },
];

/// Extension state of all five fingers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    pub fn of(hand: &HandLandmarks) -> Self {
        Self {
            thumb: is_extended(hand, Finger::Thumb),
            index: is_extended(hand, Finger::Index),
            middle: is_extended(hand, Finger::Middle),
            ring: is_extended(hand, Finger::Ring),
            pinky: is_extended(hand, Finger::Pinky),
        }
    }

    fn all(&self) -> bool {
        self.thumb && self.index && self.middle && self.ring && self.pinky
    }

    fn none(&self) -> bool {
        !(self.thumb || self.index || self.middle || self.ring || self.pinky)
    }
}

/// Raw wrist to middle fingertip distance
pub fn hand_scale(hand: &HandLandmarks) -> f64 {
    hand.wrist().dist(&hand.point(joints::MIDDLE_TIP))
}

/// Tip farther from the wrist than its proximal joint
fn is_extended(hand: &HandLandmarks, finger: Finger) -> bool {
    let wrist = hand.wrist();
    hand.point(finger.tip()).dist_sq(&wrist) > hand.point(finger.pip()).dist_sq(&wrist)
}

fn is_folded(hand: &HandLandmarks, finger: Finger) -> bool {
    let wrist = hand.wrist();
    hand.point(finger.tip()).dist_sq(&wrist) < hand.point(finger.pip()).dist_sq(&wrist)
}

/// Deterministic threshold classifier for hand gestures
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    config: GestureConfig,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    /// Classify every hand in a frame; Anjali wins over any per-hand mudra
    pub fn classify(&self, hands: &[HandLandmarks]) -> Option<GestureLabel> {
        if let [first, second, ..] = hands {
            if self.is_anjali(first, second) {
                return Some(GestureLabel::Anjali);
            }
        }

        hands.iter().find_map(|hand| self.classify_hand(hand))
    }

    /// First matching per-hand mudra rule
    pub fn classify_hand(&self, hand: &HandLandmarks) -> Option<GestureLabel> {
        let scale = hand_scale(hand);
        if scale < self.config.min_hand_scale {
            return None;
        }

        MUDRA_RULES
            .iter()
            .find(|rule| {
                rule.constraints
                    .iter()
                    .all(|c| self.satisfies(hand, scale, c))
            })
            .map(|rule| rule.label)
    }

    /// Open palm, fist or peace sign, independent of mudra semantics
    pub fn classify_shape(&self, hand: &HandLandmarks) -> Option<GestureLabel> {
        if hand_scale(hand) < self.config.min_hand_scale {
            return None;
        }

        let states = FingerStates::of(hand);
        if states.index && states.middle && !states.ring && !states.pinky {
            Some(GestureLabel::Peace)
        } else if states.all() {
            Some(GestureLabel::OpenPalm)
        } else if states.none() {
            Some(GestureLabel::Fist)
        } else {
            None
        }
    }

    fn is_anjali(&self, first: &HandLandmarks, second: &HandLandmarks) -> bool {
        let scale_a = hand_scale(first);
        let scale_b = hand_scale(second);
        if scale_a < self.config.min_hand_scale || scale_b < self.config.min_hand_scale {
            return false;
        }

        let scale = (scale_a + scale_b) * 0.5 + SCALE_EPSILON;
        first.wrist().dist(&second.wrist()) / scale < self.config.anjali_threshold
    }

    fn satisfies(&self, hand: &HandLandmarks, scale: f64, constraint: &Constraint) -> bool {
        match *constraint {
            Constraint::TouchesThumb(finger, joint, threshold) => {
                let target = match joint {
                    Joint::Tip => finger.tip(),
                    Joint::Pip => finger.pip(),
                };
                let limit = match threshold {
                    TouchThreshold::Touch => self.config.touch_threshold,
                    TouchThreshold::Surya => self.config.surya_threshold,
                };
                let d = hand.point(joints::THUMB_TIP).dist(&hand.point(target))
                    / (scale + SCALE_EPSILON);
                d < limit
            }
            Constraint::Extended(finger) => is_extended(hand, finger),
            Constraint::Folded(finger) => is_folded(hand, finger),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{HandLandmarks, Point, HAND_POINT_COUNT};

    /// Upright open hand with the wrist at (cx, 0.8); every finger extended
    pub fn open_hand(cx: f64) -> HandLandmarks {
        let mut p = [Point::new(cx, 0.8); HAND_POINT_COUNT];
        let columns = [-0.16, -0.06, 0.0, 0.06, 0.12];
        for (f, dx) in columns.iter().enumerate() {
            let base = 1 + f * 4;
            for j in 0..4 {
                p[base + j] = Point::new(cx + dx, 0.72 - 0.06 * j as f64);
            }
        }
        HandLandmarks::new(p)
    }

    /// Fold a finger: tip tucked just above the wrist, below its PIP
    pub fn fold(hand: &mut HandLandmarks, tip: usize) {
        let wrist = hand.points[0];
        hand.points[tip] = Point::new(hand.points[tip].x, wrist.y - 0.05);
    }

    /// Move a fingertip onto the thumb tip
    pub fn touch_thumb(hand: &mut HandLandmarks, tip: usize) {
        let thumb = hand.points[4];
        hand.points[tip] = Point::new(thumb.x + 0.01, thumb.y);
    }

    /// Thumb tip pulled to the center of the palm
    pub fn tuck_thumb(hand: &mut HandLandmarks) {
        let wrist = hand.points[0];
        hand.points[4] = Point::new(wrist.x, wrist.y - 0.12);
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::types::{Point, HAND_POINT_COUNT};

    fn classifier() -> GestureClassifier {
        GestureClassifier::default()
    }

    #[test]
    fn test_open_hand_is_not_a_mudra() {
        let hand = open_hand(0.5);
        assert_eq!(classifier().classify_hand(&hand), None);
        assert_eq!(classifier().classify_shape(&hand), Some(GestureLabel::OpenPalm));
    }

    #[test]
    fn test_gyan() {
        let mut hand = open_hand(0.5);
        tuck_thumb(&mut hand);
        touch_thumb(&mut hand, joints::INDEX_TIP);
        assert_eq!(classifier().classify_hand(&hand), Some(GestureLabel::Gyan));
    }

    #[test]
    fn test_prana() {
        let mut hand = open_hand(0.5);
        tuck_thumb(&mut hand);
        touch_thumb(&mut hand, joints::RING_TIP);
        touch_thumb(&mut hand, joints::PINKY_TIP);
        assert_eq!(classifier().classify_hand(&hand), Some(GestureLabel::Prana));
    }

    #[test]
    fn test_apana() {
        let mut hand = open_hand(0.5);
        tuck_thumb(&mut hand);
        // Middle tip lands on the thumb, so the scale shrinks with it
        touch_thumb(&mut hand, joints::MIDDLE_TIP);
        touch_thumb(&mut hand, joints::RING_TIP);
        assert_eq!(classifier().classify_hand(&hand), Some(GestureLabel::Apana));
    }

    #[test]
    fn test_varun() {
        let mut hand = open_hand(0.5);
        tuck_thumb(&mut hand);
        touch_thumb(&mut hand, joints::PINKY_TIP);
        assert_eq!(classifier().classify_hand(&hand), Some(GestureLabel::Varun));
    }

    #[test]
    fn test_surya() {
        let mut hand = open_hand(0.5);
        fold(&mut hand, joints::RING_TIP);
        let ring_pip = hand.points[joints::RING_PIP];
        hand.points[joints::THUMB_TIP] = Point::new(ring_pip.x - 0.01, ring_pip.y);
        assert_eq!(classifier().classify_hand(&hand), Some(GestureLabel::Surya));
    }

    #[test]
    fn test_gyan_wins_over_prana() {
        // Index, ring and pinky all on the thumb: both rules hold
        let mut hand = open_hand(0.5);
        tuck_thumb(&mut hand);
        touch_thumb(&mut hand, joints::RING_TIP);
        touch_thumb(&mut hand, joints::PINKY_TIP);
        let thumb = hand.points[joints::THUMB_TIP];
        hand.points[joints::INDEX_TIP] = Point::new(thumb.x - 0.01, thumb.y);
        hand.points[joints::INDEX_PIP] = Point::new(thumb.x - 0.01, thumb.y + 0.05);

        let gyan = &MUDRA_RULES[0];
        let prana = &MUDRA_RULES[1];
        let scale = hand_scale(&hand);
        let c = classifier();
        assert!(gyan.constraints.iter().all(|k| c.satisfies(&hand, scale, k)));
        assert!(prana.constraints.iter().all(|k| c.satisfies(&hand, scale, k)));
        assert_eq!(c.classify_hand(&hand), Some(GestureLabel::Gyan));
    }

    #[test]
    fn test_anjali_short_circuits() {
        let mut left = open_hand(0.48);
        tuck_thumb(&mut left);
        touch_thumb(&mut left, joints::INDEX_TIP);
        let right = open_hand(0.52);
        assert_eq!(
            classifier().classify(&[left, right]),
            Some(GestureLabel::Anjali)
        );
    }

    #[test]
    fn test_far_apart_hands_classified_individually() {
        let left = open_hand(0.25);
        let mut right = open_hand(0.75);
        tuck_thumb(&mut right);
        touch_thumb(&mut right, joints::PINKY_TIP);
        assert_eq!(
            classifier().classify(&[left, right]),
            Some(GestureLabel::Varun)
        );
    }

    #[test]
    fn test_degenerate_hand_matches_nothing() {
        let hand = HandLandmarks::new([Point::new(0.3, 0.3); HAND_POINT_COUNT]);
        let c = classifier();
        assert_eq!(c.classify_hand(&hand), None);
        assert_eq!(c.classify_shape(&hand), None);
        assert_eq!(c.classify(&[hand.clone(), hand]), None);
    }

    #[test]
    fn test_no_hands() {
        assert_eq!(classifier().classify(&[]), None);
    }

    #[test]
    fn test_fist_and_peace() {
        let c = classifier();

        let mut fist = open_hand(0.5);
        for tip in [
            joints::THUMB_TIP,
            joints::INDEX_TIP,
            joints::MIDDLE_TIP,
            joints::RING_TIP,
            joints::PINKY_TIP,
        ] {
            fold(&mut fist, tip);
        }
        // Keep the scale measurable with the middle finger folded
        assert!(hand_scale(&fist) > 0.01);
        assert_eq!(c.classify_shape(&fist), Some(GestureLabel::Fist));

        let mut peace = open_hand(0.5);
        fold(&mut peace, joints::RING_TIP);
        fold(&mut peace, joints::PINKY_TIP);
        assert_eq!(c.classify_shape(&peace), Some(GestureLabel::Peace));
    }
}
