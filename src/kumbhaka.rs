//! Breath-retention (kumbhaka) charge meter

use serde::{Deserialize, Serialize};

use crate::config::KumbhakaConfig;

const MAX_PRANA: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KumbhakaState {
    /// Charge level in [0, 100]
    pub prana: f64,
    pub is_holding: bool,
}

/// Charges while the touch gesture is held with a live pulse, drains otherwise
#[derive(Debug, Clone, Default)]
pub struct KumbhakaTracker {
    config: KumbhakaConfig,
    state: KumbhakaState,
}

impl KumbhakaTracker {
    pub fn new(config: KumbhakaConfig) -> Self {
        Self {
            config,
            state: KumbhakaState::default(),
        }
    }

    pub fn update(&mut self, touching: bool, bpm: f64) -> KumbhakaState {
        let holding = touching && bpm > self.config.min_bpm;
        self.state.prana = if holding {
            (self.state.prana + self.config.charge_rate).min(MAX_PRANA)
        } else {
            (self.state.prana - self.config.decay_rate).max(0.0)
        };
        self.state.is_holding = holding;
        self.state
    }

    pub fn state(&self) -> KumbhakaState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charges_while_touching() {
        let mut k = KumbhakaTracker::default();
        let mut s = k.state();
        for _ in 0..10 {
            s = k.update(true, 70.0);
        }
        assert!((s.prana - 8.0).abs() < 1e-9);
        assert!(s.is_holding);
    }

    #[test]
    fn test_charge_caps_at_100() {
        let mut k = KumbhakaTracker::default();
        for _ in 0..200 {
            k.update(true, 70.0);
        }
        assert_eq!(k.state().prana, 100.0);
    }

    #[test]
    fn test_releases_immediately() {
        let mut k = KumbhakaTracker::default();
        for _ in 0..10 {
            k.update(true, 70.0);
        }
        let s = k.update(false, 70.0);
        assert!(!s.is_holding);
        assert!((s.prana - 6.0).abs() < 1e-9);
        for _ in 0..10 {
            k.update(false, 70.0);
        }
        assert_eq!(k.state().prana, 0.0);
    }

    #[test]
    fn test_no_pulse_never_charges() {
        let mut k = KumbhakaTracker::default();
        let s = k.update(true, 0.0);
        assert_eq!(s.prana, 0.0);
        assert!(!s.is_holding);
    }
}
