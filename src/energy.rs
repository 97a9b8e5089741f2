//! Energy state model
//!
//! Seven bounded accumulators driven by fused posture, gesture and eye signals.
//! Each tick is split into two pure functions:
//!
//! - [`ceiling`] maps the tick's inputs to an upper bound `C`
//! - [`step`] grows channels toward targets at or below `C`, then pulls any
//!   channel above `C` back down
//!
//! [`EnergyStateModel`] owns the vector plus the two wall-clock pieces of state:
//! the gesture hysteresis window and the alignment ramp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{secs, EnergyConfig};
use crate::types::{Channel, EnergyVector, CHANNEL_COUNT};

/// Fused per-tick signals consumed by the energy model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyInputs {
    pub posture_score: f64,
    pub body_present: bool,
    /// Channel of the mudra detected this tick
    pub gesture: Option<Channel>,
    pub eyes_closed: bool,
    /// Head turned away from the camera
    pub distracted: bool,
    pub concentration: f64,
    /// Nothing at all was observed this tick
    pub frame_empty: bool,
}

/// Ceiling for one tick.
///
/// Rules apply in order and only raise `C`, except distraction which forces
/// the floor value unconditionally. `hysteresis_active` floors the ceiling at
/// the gesture level when a gesture fired recently.
pub fn ceiling(inputs: &EnergyInputs, hysteresis_active: bool, config: &EnergyConfig) -> f64 {
    let mut c = config.baseline_ceiling;
    if inputs.posture_score > config.posture_threshold {
        c = c.max(config.posture_ceiling);
    }
    if inputs.gesture.is_some() || hysteresis_active {
        c = c.max(config.gesture_ceiling);
    }
    if inputs.eyes_closed {
        c = c.max(config.eyes_closed_ceiling);
    }
    if inputs.distracted {
        c = config.distracted_ceiling;
    }
    c
}

/// Advance the vector one tick under ceiling `c`.
///
/// Growth never lifts a channel past `c`, so the only way a channel sits above
/// the ceiling is a ceiling drop, which enforcement undoes at `decay_rate` per tick.
pub fn step(
    energies: &EnergyVector,
    c: f64,
    inputs: &EnergyInputs,
    config: &EnergyConfig,
) -> EnergyVector {
    let mut next = *energies;

    if !inputs.distracted {
        if let Some(active) = inputs.gesture {
            let boost = if inputs.eyes_closed || inputs.concentration > config.focus_concentration
            {
                config.focused_gesture_boost
            } else {
                config.gesture_boost
            };
            let holistic = c * config.holistic_ratio;
            for (i, e) in next.iter_mut().enumerate() {
                if i == active.index() {
                    *e = (*e + boost).min(c);
                } else {
                    *e = drift(*e, holistic, config.holistic_rate);
                }
            }
        } else if inputs.body_present
            && (inputs.posture_score > config.passive_posture_threshold || inputs.eyes_closed)
        {
            for e in next.iter_mut() {
                *e = drift(*e, c, config.passive_rate);
            }
        } else if inputs.body_present {
            let target = config.sitting_target.min(c);
            for e in next.iter_mut() {
                *e = drift(*e, target, config.sitting_rate);
            }
        }
    }

    for e in next.iter_mut() {
        if *e > c {
            *e = (*e - config.decay_rate).max(c);
        }
        *e = e.clamp(0.0, 1.0);
    }

    next
}

/// Move up toward `target` by at most `rate`; never moves down
fn drift(value: f64, target: f64, rate: f64) -> f64 {
    if value < target {
        (value + rate).min(target)
    } else {
        value
    }
}

/// Read-only view of the energy state after a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySnapshot {
    pub energies: EnergyVector,
    pub ceiling: f64,
    pub active_channel: Option<Channel>,
    pub hysteresis_active: bool,
    pub alignment_active: bool,
    /// Alignment floor in [0, 1]; 0 outside alignment
    pub alignment_progress: f64,
}

impl EnergySnapshot {
    pub fn mean(&self) -> f64 {
        self.energies.iter().sum::<f64>() / CHANNEL_COUNT as f64
    }

    /// Lowest channel; ties resolve to the channel nearest the root
    pub fn weakest(&self) -> Channel {
        let mut idx = 0;
        for (i, e) in self.energies.iter().enumerate() {
            if *e < self.energies[idx] {
                idx = i;
            }
        }
        Channel::ALL[idx]
    }

    /// Highest channel; ties resolve to the channel nearest the root
    pub fn strongest(&self) -> Channel {
        let mut idx = 0;
        for (i, e) in self.energies.iter().enumerate() {
            if *e > self.energies[idx] {
                idx = i;
            }
        }
        Channel::ALL[idx]
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.energies[channel.index()]
    }
}

/// Owns the energy vector across ticks
#[derive(Debug, Clone)]
pub struct EnergyStateModel {
    config: EnergyConfig,
    energies: EnergyVector,
    last_ceiling: f64,
    last_gesture_at: Option<DateTime<Utc>>,
    active_channel: Option<Channel>,
    closed_ticks: u32,
    alignment_started: Option<DateTime<Utc>>,
    alignment_progress: f64,
    alignment_count: u32,
    hysteresis_active: bool,
}

impl EnergyStateModel {
    pub fn new(config: EnergyConfig) -> Self {
        let seed = config.seed;
        Self {
            last_ceiling: config.baseline_ceiling,
            config,
            energies: [seed; CHANNEL_COUNT],
            last_gesture_at: None,
            active_channel: None,
            closed_ticks: 0,
            alignment_started: None,
            alignment_progress: 0.0,
            alignment_count: 0,
            hysteresis_active: false,
        }
    }

    /// Advance one tick
    pub fn tick(&mut self, inputs: &EnergyInputs, now: DateTime<Utc>) -> EnergySnapshot {
        if inputs.eyes_closed {
            self.closed_ticks = self.closed_ticks.saturating_add(1);
        } else {
            self.closed_ticks = 0;
        }
        self.update_alignment(now);

        self.hysteresis_active = self
            .last_gesture_at
            .is_some_and(|at| now - at < secs(self.config.hysteresis_secs));

        let c = ceiling(inputs, self.hysteresis_active, &self.config);
        if (c - self.last_ceiling).abs() > f64::EPSILON {
            debug!(from = self.last_ceiling, to = c, "energy ceiling changed");
        }
        self.last_ceiling = c;

        if inputs.gesture.is_some() && !inputs.distracted {
            self.last_gesture_at = Some(now);
            self.active_channel = inputs.gesture;
        }

        // An empty frame carries no evidence either way
        if inputs.frame_empty {
            return self.snapshot();
        }

        if self.alignment_started.is_some() {
            let floor = self.alignment_progress.min(c);
            for e in self.energies.iter_mut() {
                *e = e.max(floor);
            }
        }

        self.energies = step(&self.energies, c, inputs, &self.config);
        self.snapshot()
    }

    fn update_alignment(&mut self, now: DateTime<Utc>) {
        if let Some(started) = self.alignment_started {
            let elapsed = (now - started).num_milliseconds() as f64 / 1000.0;
            if elapsed >= self.config.alignment_secs {
                self.alignment_started = None;
                self.alignment_progress = 0.0;
                info!(count = self.alignment_count, "alignment mode ended");
            } else {
                self.alignment_progress = (elapsed / self.config.alignment_secs).clamp(0.0, 1.0);
            }
            return;
        }

        if self.closed_ticks >= self.config.alignment_trigger_ticks {
            self.alignment_started = Some(now);
            self.alignment_progress = 0.0;
            self.alignment_count += 1;
            self.closed_ticks = 0;
            info!(count = self.alignment_count, "alignment mode activated");
        }
    }

    pub fn snapshot(&self) -> EnergySnapshot {
        EnergySnapshot {
            energies: self.energies,
            ceiling: self.last_ceiling,
            active_channel: self.active_channel,
            hysteresis_active: self.hysteresis_active,
            alignment_active: self.alignment_started.is_some(),
            alignment_progress: self.alignment_progress,
        }
    }

    pub fn energies(&self) -> &EnergyVector {
        &self.energies
    }

    pub fn alignment_count(&self) -> u32 {
        self.alignment_count
    }

    pub fn is_aligning(&self) -> bool {
        self.alignment_started.is_some()
    }
}

impl Default for EnergyStateModel {
    fn default() -> Self {
        Self::new(EnergyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn seated(posture: f64) -> EnergyInputs {
        EnergyInputs {
            posture_score: posture,
            body_present: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_ceiling_rules() {
        let cfg = EnergyConfig::default();
        let mut inputs = EnergyInputs::default();
        assert_eq!(ceiling(&inputs, false, &cfg), 0.10);

        inputs.posture_score = 0.9;
        assert_eq!(ceiling(&inputs, false, &cfg), 0.30);

        inputs.gesture = Some(Channel::Crown);
        assert_eq!(ceiling(&inputs, false, &cfg), 0.60);

        inputs.eyes_closed = true;
        assert_eq!(ceiling(&inputs, false, &cfg), 1.00);

        inputs.distracted = true;
        assert_eq!(ceiling(&inputs, true, &cfg), 0.10);
    }

    #[test]
    fn test_hysteresis_floors_ceiling() {
        let cfg = EnergyConfig::default();
        let inputs = seated(0.9);
        assert_eq!(ceiling(&inputs, false, &cfg), 0.30);
        assert_eq!(ceiling(&inputs, true, &cfg), 0.60);
    }

    #[test]
    fn test_active_channel_boost_and_holistic_drift() {
        let cfg = EnergyConfig::default();
        let inputs = EnergyInputs {
            gesture: Some(Channel::Root),
            body_present: true,
            ..Default::default()
        };
        let next = step(&[0.1; CHANNEL_COUNT], 0.6, &inputs, &cfg);
        assert!((next[0] - 0.3).abs() < 1e-12);
        assert!((next[1] - 0.15).abs() < 1e-12);

        // Focused boost when concentration is high
        let focused = EnergyInputs {
            concentration: 50.0,
            ..inputs
        };
        let next = step(&[0.1; CHANNEL_COUNT], 0.6, &focused, &cfg);
        assert!((next[0] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_holistic_drift_does_not_overshoot() {
        let cfg = EnergyConfig::default();
        let inputs = EnergyInputs {
            gesture: Some(Channel::Root),
            ..Default::default()
        };
        // Target is 0.85 * 0.6 = 0.51
        let next = step(&[0.49; CHANNEL_COUNT], 0.6, &inputs, &cfg);
        assert!((next[3] - 0.51).abs() < 1e-12);
    }

    #[test]
    fn test_no_body_no_growth() {
        let cfg = EnergyConfig::default();
        let inputs = EnergyInputs {
            posture_score: 0.0,
            ..Default::default()
        };
        let next = step(&[0.05; CHANNEL_COUNT], 0.1, &inputs, &cfg);
        assert_eq!(next, [0.05; CHANNEL_COUNT]);
    }

    #[test]
    fn test_distraction_skips_growth_and_enforces() {
        let cfg = EnergyConfig::default();
        let inputs = EnergyInputs {
            gesture: Some(Channel::Crown),
            body_present: true,
            posture_score: 0.9,
            distracted: true,
            ..Default::default()
        };
        let c = ceiling(&inputs, true, &cfg);
        let next = step(&[0.4; CHANNEL_COUNT], c, &inputs, &cfg);
        for e in next {
            assert!((e - 0.35).abs() < 1e-12);
        }
    }

    #[test]
    fn test_good_posture_settles_at_posture_ceiling() {
        let mut model = EnergyStateModel::default();
        let mut snap = model.snapshot();
        for i in 0..40 {
            snap = model.tick(&seated(0.9), at(i * 100));
        }
        assert_eq!(snap.ceiling, 0.30);
        for e in snap.energies {
            assert!((e - 0.30).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gesture_hysteresis_window() {
        let mut model = EnergyStateModel::default();
        let gesture = EnergyInputs {
            gesture: Some(Channel::Crown),
            ..seated(0.9)
        };
        for i in 0..5 {
            model.tick(&gesture, at(i * 100));
        }
        // Last gesture at 400ms
        let snap = model.tick(&seated(0.9), at(1_800));
        assert!(snap.hysteresis_active);
        assert_eq!(snap.ceiling, 0.60);
        assert_eq!(snap.active_channel, Some(Channel::Crown));

        let snap = model.tick(&seated(0.9), at(2_400));
        assert!(!snap.hysteresis_active);
        assert_eq!(snap.ceiling, 0.30);
    }

    #[test]
    fn test_distracted_gesture_does_not_refresh_hysteresis() {
        let mut model = EnergyStateModel::default();
        let distracted = EnergyInputs {
            gesture: Some(Channel::Root),
            distracted: true,
            ..seated(0.9)
        };
        model.tick(&distracted, at(0));
        let snap = model.tick(&seated(0.9), at(100));
        assert!(!snap.hysteresis_active);
        assert_eq!(snap.active_channel, None);
    }

    #[test]
    fn test_empty_frame_holds_state() {
        let mut model = EnergyStateModel::default();
        let idle = EnergyInputs {
            frame_empty: true,
            ..Default::default()
        };
        for i in 0..50 {
            model.tick(&idle, at(i * 100));
        }
        assert_eq!(model.energies(), &[0.4; CHANNEL_COUNT]);
    }

    #[test]
    fn test_alignment_ramp_and_exit() {
        let mut model = EnergyStateModel::default();
        let closed = EnergyInputs {
            eyes_closed: true,
            body_present: true,
            ..Default::default()
        };
        for i in 0..15 {
            model.tick(&closed, at(i * 100));
        }
        assert!(model.is_aligning());
        assert_eq!(model.alignment_count(), 1);

        let snap = model.tick(&closed, at(1_400 + 4_000));
        assert!((snap.alignment_progress - 0.5).abs() < 1e-9);
        for e in snap.energies {
            assert!(e >= 0.5);
        }

        let snap = model.tick(&closed, at(1_400 + 8_000));
        assert!(!snap.alignment_active);
        assert_eq!(model.alignment_count(), 1);
    }

    #[test]
    fn test_snapshot_stats() {
        let snap = EnergySnapshot {
            energies: [0.5, 0.1, 0.9, 0.5, 0.5, 0.1, 0.9],
            ceiling: 1.0,
            active_channel: None,
            hysteresis_active: false,
            alignment_active: false,
            alignment_progress: 0.0,
        };
        assert!((snap.mean() - 3.5 / 7.0).abs() < 1e-12);
        assert_eq!(snap.weakest(), Channel::Sacral);
        assert_eq!(snap.strongest(), Channel::SolarPlexus);
        assert_eq!(snap.get(Channel::Crown), 0.9);
    }

    fn arb_inputs() -> impl Strategy<Value = EnergyInputs> {
        (
            0.0f64..1.0,
            any::<bool>(),
            proptest::option::of(0usize..CHANNEL_COUNT),
            any::<bool>(),
            any::<bool>(),
            0.0f64..100.0,
            any::<bool>(),
        )
            .prop_map(
                |(posture_score, body_present, gesture, eyes_closed, distracted, concentration, frame_empty)| {
                    EnergyInputs {
                        posture_score,
                        body_present,
                        gesture: gesture.and_then(Channel::from_index),
                        eyes_closed,
                        distracted,
                        concentration,
                        frame_empty,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn prop_energies_stay_bounded(
            ticks in proptest::collection::vec((arb_inputs(), 0i64..3_000), 1..120)
        ) {
            let mut model = EnergyStateModel::default();
            let mut now = t0();
            for (inputs, gap_ms) in ticks {
                now += Duration::milliseconds(gap_ms);
                let snap = model.tick(&inputs, now);
                for e in snap.energies {
                    prop_assert!((0.0..=1.0).contains(&e));
                }
            }
        }

        #[test]
        fn prop_ceiling_enforced_within_bound(
            start in proptest::array::uniform7(0.0f64..=1.0),
            inputs in arb_inputs(),
        ) {
            let cfg = EnergyConfig::default();
            let c = ceiling(&inputs, false, &cfg);
            let worst = start.iter().cloned().fold(0.0, f64::max);
            let bound = ((worst - c) / cfg.decay_rate).ceil().max(0.0) as usize;

            let mut e = start;
            for _ in 0..bound {
                e = step(&e, c, &inputs, &cfg);
            }
            for v in e {
                prop_assert!(v <= c + 1e-9);
            }
        }
    }
}
