//! Tunable thresholds for every fusion stage
//!
//! Each component reads its own sub-config. Defaults reproduce the reference
//! tuning; any field may be omitted from JSON and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Convert fractional seconds to a chrono duration
pub(crate) fn secs(value: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((value * 1000.0).round() as i64)
}

/// Gesture classifier thresholds (distances normalized by hand scale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Fingertip-to-thumb-tip distance that counts as touching
    pub touch_threshold: f64,
    /// Thumb-tip to ring-PIP distance for Surya
    pub surya_threshold: f64,
    /// Wrist-to-wrist distance for Anjali
    pub anjali_threshold: f64,
    /// Hands smaller than this are degenerate and match nothing
    pub min_hand_scale: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_threshold: 0.28,
            surya_threshold: 0.30,
            anjali_threshold: 0.40,
            min_hand_scale: 1e-4,
        }
    }
}

/// Face analysis thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Eye ratio below which the eyes count as closed
    pub eye_closed_ratio: f64,
    /// Nose offset from the eye midline that counts as a turned head
    pub head_turn_threshold: f64,
    /// Iris gaze magnitude that counts as looking away
    pub iris_gaze_threshold: f64,
    pub iris_gain: f64,
    pub mouth_open_threshold: f64,
    /// Fingertip-to-nose distance that counts as a touch
    pub nose_touch_radius: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            eye_closed_ratio: 0.30,
            head_turn_threshold: 0.04,
            iris_gaze_threshold: 0.3,
            iris_gain: 4.0,
            mouth_open_threshold: 0.035,
            nose_touch_radius: 0.0625,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    pub smoothing: f64,
    pub phase_gain: f64,
    pub amplitude: f64,
    /// Smoothed nose velocity under which breathing counts as stable
    pub stable_velocity: f64,
    /// Value fed to the estimator when no face is visible
    pub neutral_level: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.9,
            phase_gain: 50.0,
            amplitude: 0.3,
            stable_velocity: 0.005,
            neutral_level: 0.5,
        }
    }
}

/// Ceiling rules and per-tick growth/decay rates of the energy model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub seed: f64,
    pub baseline_ceiling: f64,
    pub posture_threshold: f64,
    pub posture_ceiling: f64,
    pub gesture_ceiling: f64,
    pub eyes_closed_ceiling: f64,
    pub distracted_ceiling: f64,
    /// Seconds a gesture keeps the ceiling floored after it disappears
    pub hysteresis_secs: f64,
    pub gesture_boost: f64,
    pub focused_gesture_boost: f64,
    /// Concentration above which the focused boost applies
    pub focus_concentration: f64,
    pub holistic_ratio: f64,
    pub holistic_rate: f64,
    pub passive_posture_threshold: f64,
    pub passive_rate: f64,
    pub sitting_target: f64,
    pub sitting_rate: f64,
    pub decay_rate: f64,
    /// Consecutive eyes-closed ticks that trigger alignment
    pub alignment_trigger_ticks: u32,
    pub alignment_secs: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            seed: 0.4,
            baseline_ceiling: 0.10,
            posture_threshold: 0.60,
            posture_ceiling: 0.30,
            gesture_ceiling: 0.60,
            eyes_closed_ceiling: 1.00,
            distracted_ceiling: 0.10,
            hysteresis_secs: 1.5,
            gesture_boost: 0.20,
            focused_gesture_boost: 0.25,
            focus_concentration: 40.0,
            holistic_ratio: 0.85,
            holistic_rate: 0.05,
            passive_posture_threshold: 0.5,
            passive_rate: 0.03,
            sitting_target: 0.30,
            sitting_rate: 0.01,
            decay_rate: 0.05,
            alignment_trigger_ticks: 15,
            alignment_secs: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeditationConfig {
    pub closed_gain: f64,
    pub centered_gain: f64,
    /// Highest concentration reachable with open eyes
    pub open_cap: f64,
    pub distracted_loss: f64,
    pub samadhi_threshold: f64,
    pub deep_focus_threshold: f64,
}

impl Default for MeditationConfig {
    fn default() -> Self {
        Self {
            closed_gain: 1.0,
            centered_gain: 0.5,
            open_cap: 90.0,
            distracted_loss: 0.5,
            samadhi_threshold: 90.0,
            deep_focus_threshold: 80.0,
        }
    }
}

/// HRV acceptance window, score normalization ranges, insight cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysiologyConfig {
    pub min_ibi_ms: f64,
    pub max_ibi_ms: f64,
    pub history_len: usize,
    pub bpm_low: f64,
    pub bpm_high: f64,
    pub hrv_low: f64,
    pub hrv_high: f64,
    pub insight_interval_secs: f64,
    /// Doshas within this distance of their mean count as balanced
    pub balance_band: f64,
    /// Bpm samples required before findings and insights are emitted
    pub min_samples: usize,
    pub centered_focus_floor: f64,
    pub distracted_focus_cap: f64,
}

impl Default for PhysiologyConfig {
    fn default() -> Self {
        Self {
            min_ibi_ms: 300.0,
            max_ibi_ms: 1500.0,
            history_len: 20,
            bpm_low: 60.0,
            bpm_high: 100.0,
            hrv_low: 10.0,
            hrv_high: 100.0,
            insight_interval_secs: 15.0,
            balance_band: 15.0,
            min_samples: 5,
            centered_focus_floor: 80.0,
            distracted_focus_cap: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Seconds without any reading before the link counts as disconnected
    pub stale_secs: f64,
    /// Seconds without a beat event before heart-rate state resets
    pub no_beat_secs: f64,
    pub max_spo2: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            stale_secs: 5.0,
            no_beat_secs: 3.0,
            max_spo2: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KumbhakaConfig {
    pub charge_rate: f64,
    pub decay_rate: f64,
    pub min_bpm: f64,
}

impl Default for KumbhakaConfig {
    fn default() -> Self {
        Self {
            charge_rate: 0.8,
            decay_rate: 2.0,
            min_bpm: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub low_posture_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            low_posture_threshold: 0.5,
        }
    }
}

/// Full configuration of a fusion session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub gesture: GestureConfig,
    pub face: FaceConfig,
    pub breathing: BreathingConfig,
    pub energy: EnergyConfig,
    pub meditation: MeditationConfig,
    pub physiology: PhysiologyConfig,
    pub sensor: SensorConfig,
    pub kumbhaka: KumbhakaConfig,
    pub analytics: AnalyticsConfig,
}

impl FusionConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: FusionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check every threshold is finite, non-negative and consistently ordered
    pub fn validate(&self) -> Result<(), ComputeError> {
        let e = &self.energy;
        let p = &self.physiology;

        let named = [
            ("gesture.touch_threshold", self.gesture.touch_threshold),
            ("gesture.surya_threshold", self.gesture.surya_threshold),
            ("gesture.anjali_threshold", self.gesture.anjali_threshold),
            ("gesture.min_hand_scale", self.gesture.min_hand_scale),
            ("face.eye_closed_ratio", self.face.eye_closed_ratio),
            ("face.head_turn_threshold", self.face.head_turn_threshold),
            ("face.iris_gaze_threshold", self.face.iris_gaze_threshold),
            ("face.iris_gain", self.face.iris_gain),
            ("face.mouth_open_threshold", self.face.mouth_open_threshold),
            ("face.nose_touch_radius", self.face.nose_touch_radius),
            ("breathing.phase_gain", self.breathing.phase_gain),
            ("breathing.amplitude", self.breathing.amplitude),
            ("breathing.stable_velocity", self.breathing.stable_velocity),
            ("breathing.neutral_level", self.breathing.neutral_level),
            ("energy.hysteresis_secs", e.hysteresis_secs),
            ("energy.gesture_boost", e.gesture_boost),
            ("energy.focused_gesture_boost", e.focused_gesture_boost),
            ("energy.focus_concentration", e.focus_concentration),
            ("energy.holistic_rate", e.holistic_rate),
            ("energy.passive_rate", e.passive_rate),
            ("energy.sitting_rate", e.sitting_rate),
            ("energy.decay_rate", e.decay_rate),
            ("energy.alignment_secs", e.alignment_secs),
            ("meditation.closed_gain", self.meditation.closed_gain),
            ("meditation.centered_gain", self.meditation.centered_gain),
            ("meditation.distracted_loss", self.meditation.distracted_loss),
            ("physiology.insight_interval_secs", p.insight_interval_secs),
            ("physiology.balance_band", p.balance_band),
            ("sensor.stale_secs", self.sensor.stale_secs),
            ("sensor.no_beat_secs", self.sensor.no_beat_secs),
            ("kumbhaka.charge_rate", self.kumbhaka.charge_rate),
            ("kumbhaka.decay_rate", self.kumbhaka.decay_rate),
            ("kumbhaka.min_bpm", self.kumbhaka.min_bpm),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }

        let unit = [
            ("energy.seed", e.seed),
            ("energy.baseline_ceiling", e.baseline_ceiling),
            ("energy.posture_threshold", e.posture_threshold),
            ("energy.posture_ceiling", e.posture_ceiling),
            ("energy.gesture_ceiling", e.gesture_ceiling),
            ("energy.eyes_closed_ceiling", e.eyes_closed_ceiling),
            ("energy.distracted_ceiling", e.distracted_ceiling),
            ("energy.holistic_ratio", e.holistic_ratio),
            ("energy.passive_posture_threshold", e.passive_posture_threshold),
            ("energy.sitting_target", e.sitting_target),
            ("analytics.low_posture_threshold", self.analytics.low_posture_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ComputeError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let percent = [
            ("meditation.open_cap", self.meditation.open_cap),
            ("meditation.samadhi_threshold", self.meditation.samadhi_threshold),
            ("meditation.deep_focus_threshold", self.meditation.deep_focus_threshold),
            ("physiology.centered_focus_floor", p.centered_focus_floor),
            ("physiology.distracted_focus_cap", p.distracted_focus_cap),
            ("sensor.max_spo2", self.sensor.max_spo2),
        ];
        for (name, value) in percent {
            if !(0.0..=100.0).contains(&value) {
                return Err(ComputeError::InvalidConfig(format!(
                    "{name} must be within [0, 100], got {value}"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.breathing.smoothing) {
            return Err(ComputeError::InvalidConfig(format!(
                "breathing.smoothing must be within [0, 1), got {}",
                self.breathing.smoothing
            )));
        }

        let ordered = [
            ("physiology ibi window", p.min_ibi_ms, p.max_ibi_ms),
            ("physiology bpm range", p.bpm_low, p.bpm_high),
            ("physiology hrv range", p.hrv_low, p.hrv_high),
        ];
        for (name, lo, hi) in ordered {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(ComputeError::InvalidConfig(format!(
                    "{name} must satisfy low < high, got [{lo}, {hi}]"
                )));
            }
        }

        if p.history_len == 0 {
            return Err(ComputeError::InvalidConfig(
                "physiology.history_len must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
