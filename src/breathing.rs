//! Breathing phase from vertical nose motion
//!
//! The nose rises and falls slightly with each breath. Smoothing its per-tick
//! velocity and integrating it into a wrapped phase gives a cheap pacing signal.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::config::BreathingConfig;

/// Estimator output for one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathingState {
    /// Phase in [0, 2π)
    pub phase: f64,
    /// Pacing factor in [1 - amplitude, 1 + amplitude]
    pub factor: f64,
    pub smoothed_velocity: f64,
    pub is_stable: bool,
}

#[derive(Debug, Clone)]
pub struct BreathingEstimator {
    config: BreathingConfig,
    prev_level: Option<f64>,
    smoothed: f64,
    phase: f64,
}

impl BreathingEstimator {
    pub fn new(config: BreathingConfig) -> Self {
        Self {
            config,
            prev_level: None,
            smoothed: 0.0,
            phase: 0.0,
        }
    }

    /// Feed the nose height; `None` feeds the neutral level
    pub fn update(&mut self, nose_y: Option<f64>) -> BreathingState {
        let level = nose_y.unwrap_or(self.config.neutral_level);

        // First sample only seeds the previous level
        if let Some(prev) = self.prev_level.replace(level) {
            let dy = level - prev;
            let k = self.config.smoothing;
            self.smoothed = k * self.smoothed + (1.0 - k) * dy;
            self.phase = (self.phase + self.smoothed * self.config.phase_gain).rem_euclid(TAU);
            // rem_euclid rounds up to TAU for tiny negative steps
            if self.phase >= TAU {
                self.phase = 0.0;
            }
        }

        self.state()
    }

    pub fn state(&self) -> BreathingState {
        BreathingState {
            phase: self.phase,
            factor: 1.0 + self.config.amplitude * self.phase.sin(),
            smoothed_velocity: self.smoothed,
            is_stable: self.smoothed.abs() < self.config.stable_velocity,
        }
    }
}

impl Default for BreathingEstimator {
    fn default() -> Self {
        Self::new(BreathingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_only_seeds() {
        let mut est = BreathingEstimator::default();
        let s = est.update(Some(0.42));
        assert_eq!(s.phase, 0.0);
        assert_eq!(s.factor, 1.0);
        assert!(s.is_stable);
    }

    #[test]
    fn test_smoothing_and_phase() {
        let mut est = BreathingEstimator::default();
        est.update(Some(0.50));
        let s = est.update(Some(0.52));
        // 0.1 * 0.02, then 0.002 * 50
        assert!((s.smoothed_velocity - 0.002).abs() < 1e-12);
        assert!((s.phase - 0.1).abs() < 1e-9);
        assert!((s.factor - (1.0 + 0.3 * 0.1f64.sin())).abs() < 1e-12);
        assert!(s.is_stable);
    }

    #[test]
    fn test_phase_wraps_into_range() {
        let mut est = BreathingEstimator::default();
        let mut y = 0.5;
        est.update(Some(y));
        for _ in 0..200 {
            y -= 0.03;
            let s = est.update(Some(y));
            assert!((0.0..TAU).contains(&s.phase));
            assert!(s.factor >= 0.7 - 1e-12 && s.factor <= 1.3 + 1e-12);
        }
        assert!(!est.state().is_stable);
    }

    #[test]
    fn test_tiny_negative_step_stays_below_tau() {
        let mut est = BreathingEstimator::default();
        est.update(Some(0.30000000000000004));
        let s = est.update(Some(0.3));
        assert!(s.phase < TAU);
        assert!(s.phase >= 0.0);
    }

    #[test]
    fn test_missing_face_feeds_neutral_level() {
        let mut est = BreathingEstimator::default();
        for _ in 0..10 {
            est.update(None);
        }
        let s = est.state();
        assert_eq!(s.smoothed_velocity, 0.0);
        assert_eq!(s.phase, 0.0);
    }
}
