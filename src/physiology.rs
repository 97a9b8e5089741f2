//! Heart-rate derived metrics
//!
//! Turns a pre-filtered bpm value plus beat pulses into HRV (RMSSD), stress,
//! calm and focus scores, and the three dosha scores.
//!
//! ## Scores
//!
//! All scores are in [0, 100], built from `norm(v, lo, hi) = clamp((v - lo) / (hi - lo), 0, 1)`:
//!
//! - stress = 70 * norm(bpm) + 30 * (1 - norm(hrv))
//! - calm = 100 - stress
//! - focus = 100 - var(bpm history), then floored or capped by gaze
//!
//! A bpm of zero is the idle case: every score is zero and history is dropped
//! so nothing is extrapolated from a stale pulse.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{secs, PhysiologyConfig};

pub const WAITING_INSIGHT: &str = "Waiting for sensor...";
pub const SCANNING_INSIGHT: &str = "Scanning bio-rhythms...";
pub const SCANNING_FINDING: &str = "Scanning...";

/// Variance assumed until enough bpm samples exist
const FALLBACK_BPM_VARIANCE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dosha {
    Vata,
    Pitta,
    Kapha,
    Balanced,
}

impl Dosha {
    pub fn finding(&self) -> &'static str {
        match self {
            Dosha::Vata => "Dominant: Vata (High Movement/Anxiety)",
            Dosha::Pitta => "Dominant: Pitta (High Energy/Heat)",
            Dosha::Kapha => "Dominant: Kapha (High Stability/Lethargy)",
            Dosha::Balanced => "Finding: Tridosha Balanced (Excellent)",
        }
    }
}

/// Recent dosha scores, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoshaTrend {
    pub vata: Vec<f64>,
    pub pitta: Vec<f64>,
    pub kapha: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysiologyMetrics {
    pub heart_rate: f64,
    pub hrv_rmssd_ms: f64,
    pub stress: f64,
    pub calm: f64,
    pub focus: f64,
    pub vata: f64,
    pub pitta: f64,
    pub kapha: f64,
    /// None while idle
    pub dominant: Option<Dosha>,
    pub insight: String,
    pub finding: String,
    pub trend: DoshaTrend,
}

impl PhysiologyMetrics {
    pub fn idle() -> Self {
        Self {
            heart_rate: 0.0,
            hrv_rmssd_ms: 0.0,
            stress: 0.0,
            calm: 0.0,
            focus: 0.0,
            vata: 0.0,
            pitta: 0.0,
            kapha: 0.0,
            dominant: None,
            insight: WAITING_INSIGHT.to_string(),
            finding: SCANNING_FINDING.to_string(),
            trend: DoshaTrend::default(),
        }
    }
}

/// Clamp (v - lo) / (hi - lo) into [0, 1]
pub fn norm(v: f64, lo: f64, hi: f64) -> f64 {
    ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Root mean square of successive differences; 0 with fewer than 3 intervals
pub fn rmssd(ibis: &[f64]) -> f64 {
    if ibis.len() < 3 {
        return 0.0;
    }
    let sum_sq: f64 = ibis.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    (sum_sq / (ibis.len() - 1) as f64).sqrt()
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn push_bounded(ring: &mut VecDeque<f64>, value: f64, cap: usize) {
    ring.push_back(value);
    while ring.len() > cap {
        ring.pop_front();
    }
}

#[derive(Debug, Clone)]
pub struct PhysiologyEngine {
    config: PhysiologyConfig,
    ibi_history: VecDeque<f64>,
    bpm_history: VecDeque<f64>,
    vata_history: VecDeque<f64>,
    pitta_history: VecDeque<f64>,
    kapha_history: VecDeque<f64>,
    last_beat: Option<DateTime<Utc>>,
    last_insight_at: Option<DateTime<Utc>>,
    insight: String,
}

impl PhysiologyEngine {
    pub fn new(config: PhysiologyConfig) -> Self {
        Self {
            config,
            ibi_history: VecDeque::new(),
            bpm_history: VecDeque::new(),
            vata_history: VecDeque::new(),
            pitta_history: VecDeque::new(),
            kapha_history: VecDeque::new(),
            last_beat: None,
            last_insight_at: None,
            insight: SCANNING_INSIGHT.to_string(),
        }
    }

    /// Accept an inter-beat interval if it lies in the plausible window
    pub fn record_ibi(&mut self, ibi_ms: f64) -> bool {
        let accepted = (self.config.min_ibi_ms..=self.config.max_ibi_ms).contains(&ibi_ms);
        if accepted {
            push_bounded(&mut self.ibi_history, ibi_ms, self.config.history_len);
        } else {
            debug!(ibi_ms, "rejected inter-beat interval");
        }
        accepted
    }

    /// Register a beat pulse; the first pulse only seeds the clock
    pub fn on_beat(&mut self, at: DateTime<Utc>) {
        if let Some(prev) = self.last_beat.replace(at) {
            let ibi_ms = (at - prev).num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0;
            self.record_ibi(ibi_ms);
        }
    }

    pub fn hrv(&self) -> f64 {
        let ibis: Vec<f64> = self.ibi_history.iter().copied().collect();
        rmssd(&ibis)
    }

    pub fn ibi_history(&self) -> &VecDeque<f64> {
        &self.ibi_history
    }

    /// Drop all heart-rate derived state
    pub fn reset(&mut self) {
        self.ibi_history.clear();
        self.bpm_history.clear();
        self.vata_history.clear();
        self.pitta_history.clear();
        self.kapha_history.clear();
        self.last_beat = None;
        self.last_insight_at = None;
        self.insight = SCANNING_INSIGHT.to_string();
    }

    /// Compute metrics for one tick
    pub fn analyze(
        &mut self,
        bpm: f64,
        beat: bool,
        gaze_centered: bool,
        now: DateTime<Utc>,
    ) -> PhysiologyMetrics {
        if bpm <= 0.0 {
            if !self.bpm_history.is_empty() || self.last_beat.is_some() {
                debug!("heart rate lost, clearing physiology history");
            }
            self.reset();
            return PhysiologyMetrics::idle();
        }

        if beat {
            self.on_beat(now);
        }
        let cap = self.config.history_len;
        push_bounded(&mut self.bpm_history, bpm, cap);

        let cfg = &self.config;
        let hrv = self.hrv();
        let nb = norm(bpm, cfg.bpm_low, cfg.bpm_high);
        let nh = norm(hrv, cfg.hrv_low, cfg.hrv_high);

        let stress = (70.0 * nb + 30.0 * (1.0 - nh)).clamp(0.0, 100.0);
        let calm = 100.0 - stress;

        let samples = self.bpm_history.len();
        let bpm_var = if samples > cfg.min_samples {
            let bpms: Vec<f64> = self.bpm_history.iter().copied().collect();
            variance(&bpms)
        } else {
            FALLBACK_BPM_VARIANCE
        };
        let focus = if gaze_centered {
            (100.0 - bpm_var).max(cfg.centered_focus_floor)
        } else {
            (100.0 - bpm_var).min(cfg.distracted_focus_cap)
        }
        .clamp(0.0, 100.0);

        let vata = 100.0 * nh;
        let pitta = 100.0 * nb;
        let kapha = (80.0 * (1.0 - nb) + 20.0 * (1.0 - nh)).min(100.0);
        let dominant = dominant_dosha(vata, pitta, kapha, cfg.balance_band);

        let finding = if samples > cfg.min_samples {
            dominant.finding().to_string()
        } else {
            SCANNING_FINDING.to_string()
        };

        let interval = secs(cfg.insight_interval_secs);
        let due = self.last_insight_at.map_or(true, |at| now - at >= interval);
        if due {
            self.last_insight_at = Some(now);
            self.insight = if samples > cfg.min_samples {
                insight_for(calm, stress, focus).to_string()
            } else {
                SCANNING_INSIGHT.to_string()
            };
        }

        push_bounded(&mut self.vata_history, vata, cap);
        push_bounded(&mut self.pitta_history, pitta, cap);
        push_bounded(&mut self.kapha_history, kapha, cap);

        PhysiologyMetrics {
            heart_rate: bpm,
            hrv_rmssd_ms: hrv,
            stress,
            calm,
            focus,
            vata,
            pitta,
            kapha,
            dominant: Some(dominant),
            insight: self.insight.clone(),
            finding,
            trend: DoshaTrend {
                vata: self.vata_history.iter().copied().collect(),
                pitta: self.pitta_history.iter().copied().collect(),
                kapha: self.kapha_history.iter().copied().collect(),
            },
        }
    }
}

impl Default for PhysiologyEngine {
    fn default() -> Self {
        Self::new(PhysiologyConfig::default())
    }
}

/// Highest dosha, or balanced when all three sit near their mean
fn dominant_dosha(vata: f64, pitta: f64, kapha: f64, band: f64) -> Dosha {
    let mean = (vata + pitta + kapha) / 3.0;
    if [vata, pitta, kapha].iter().all(|v| (v - mean).abs() < band) {
        return Dosha::Balanced;
    }
    if vata >= pitta && vata >= kapha {
        Dosha::Vata
    } else if pitta >= kapha {
        Dosha::Pitta
    } else {
        Dosha::Kapha
    }
}

fn insight_for(calm: f64, stress: f64, focus: f64) -> &'static str {
    if calm > 80.0 {
        "Deep state of relaxation detected."
    } else if calm > 60.0 {
        "Heart rhythm is steady and calm."
    } else if stress > 80.0 {
        "High arousal. Focus on slow exhalations."
    } else if stress > 60.0 {
        "Slight tension. Soften your shoulders."
    } else if focus > 80.0 {
        "Excellent physiological coherence."
    } else {
        "Breathing is syncing with heart rate."
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

    #[test]
    fn test_rmssd_of_known_series() {
        assert!((rmssd(&[800.0, 820.0, 810.0, 805.0, 815.0]) - 12.5).abs() < 1e-9);
        assert_eq!(rmssd(&[800.0, 820.0]), 0.0);
    }

    #[test]
    fn test_ibi_window_is_inclusive() {
        let mut engine = PhysiologyEngine::default();
        assert!(engine.record_ibi(300.0));
        assert!(engine.record_ibi(1500.0));
        assert!(!engine.record_ibi(299.0));
        assert!(!engine.record_ibi(1600.0));
        assert_eq!(engine.ibi_history().len(), 2);
    }

    #[test]
    fn test_beats_produce_intervals() {
        let mut engine = PhysiologyEngine::default();
        let mut now = t0();
        engine.on_beat(now);
        assert!(engine.ibi_history().is_empty());
        for ms in [800, 820, 810, 805, 815] {
            now += Duration::milliseconds(ms);
            engine.on_beat(now);
        }
        let ibis: Vec<f64> = engine.ibi_history().iter().copied().collect();
        assert_eq!(ibis, vec![800.0, 820.0, 810.0, 805.0, 815.0]);
        assert!((engine.hrv() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut engine = PhysiologyEngine::default();
        for i in 0..50 {
            engine.record_ibi(800.0 + i as f64);
        }
        assert_eq!(engine.ibi_history().len(), 20);
        assert_eq!(engine.ibi_history().front(), Some(&830.0));
    }

    #[test]
    fn test_zero_bpm_is_idle() {
        let mut engine = PhysiologyEngine::default();
        for i in 0..10 {
            engine.analyze(75.0, true, true, t0() + Duration::milliseconds(i * 800));
        }
        let m = engine.analyze(0.0, false, true, t0() + Duration::seconds(10));
        assert_eq!(m.stress, 0.0);
        assert_eq!(m.calm, 0.0);
        assert_eq!(m.focus, 0.0);
        assert_eq!(m.insight, WAITING_INSIGHT);
        assert!(engine.ibi_history().is_empty());
    }

    #[test]
    fn test_scores_for_resting_heart() {
        let mut engine = PhysiologyEngine::default();
        let m = engine.analyze(60.0, false, true, t0());
        // norm_bpm = 0, no hrv yet: stress comes only from low variability
        assert!((m.stress - 30.0).abs() < 1e-9);
        assert!((m.calm - 70.0).abs() < 1e-9);
        assert!((m.focus - 90.0).abs() < 1e-9);
        assert_eq!(m.pitta, 0.0);
        assert!((m.kapha - 100.0).abs() < 1e-9);
        assert_eq!(m.dominant, Some(Dosha::Kapha));
        assert_eq!(m.insight, SCANNING_INSIGHT);
        assert_eq!(m.finding, SCANNING_FINDING);
    }

    #[test]
    fn test_gaze_caps_focus() {
        let mut engine = PhysiologyEngine::default();
        let m = engine.analyze(72.0, false, false, t0());
        assert!(m.focus <= 40.0);
    }

    #[test]
    fn test_insight_refreshes_on_interval() {
        let mut engine = PhysiologyEngine::default();
        let mut m = engine.analyze(62.0, false, true, t0());
        assert_eq!(m.insight, SCANNING_INSIGHT);

        for i in 1..10 {
            m = engine.analyze(62.0, false, true, t0() + Duration::seconds(i));
        }
        // Enough samples now, but the 15 s window has not elapsed
        assert_eq!(m.insight, SCANNING_INSIGHT);
        assert_ne!(m.finding, SCANNING_FINDING);

        let m = engine.analyze(62.0, false, true, t0() + Duration::seconds(15));
        // stress = 70 * 0.05 + 30 = 33.5, calm = 66.5
        assert_eq!(m.insight, "Heart rhythm is steady and calm.");
    }

    #[test]
    fn test_focus_clamped_after_gaze_adjustment() {
        let mut engine = PhysiologyEngine::new(PhysiologyConfig {
            centered_focus_floor: 150.0,
            distracted_focus_cap: -20.0,
            ..Default::default()
        });
        let m = engine.analyze(72.0, false, true, t0());
        assert_eq!(m.focus, 100.0);
        let m = engine.analyze(72.0, false, false, t0() + Duration::seconds(1));
        assert_eq!(m.focus, 0.0);
    }

    #[test]
    fn test_dominant_dosha_balance() {
        assert_eq!(dominant_dosha(40.0, 45.0, 50.0, 15.0), Dosha::Balanced);
        assert_eq!(dominant_dosha(90.0, 10.0, 20.0, 15.0), Dosha::Vata);
        assert_eq!(dominant_dosha(10.0, 90.0, 20.0, 15.0), Dosha::Pitta);
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_range(
            readings in proptest::collection::vec((0.0f64..220.0, any::<bool>(), any::<bool>(), 200i64..2_000), 1..80)
        ) {
            let mut engine = PhysiologyEngine::default();
            let mut now = t0();
            for (bpm, beat, centered, gap) in readings {
                now += Duration::milliseconds(gap);
                let m = engine.analyze(bpm, beat, centered, now);
                for v in [m.stress, m.calm, m.focus, m.vata, m.pitta, m.kapha] {
                    prop_assert!((0.0..=100.0).contains(&v));
                }
            }
        }
    }
}
