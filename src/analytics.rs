//! Session analytics
//!
//! Accumulates per-channel dwell time, mudra counts and posture samples for
//! the end-of-session report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::types::{Channel, GestureLabel, CHANNEL_COUNT};

/// End-of-session report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Seconds spent with each channel active
    pub channel_dwell_secs: BTreeMap<Channel, f64>,
    /// Activations per mudra
    pub gesture_counts: BTreeMap<GestureLabel, u32>,
    /// Mean posture score over ticks with a body; 0 without samples
    pub mean_posture: f64,
    pub posture_samples: usize,
    pub posture_alerts: u32,
    pub alignment_count: u32,
}

#[derive(Debug, Clone)]
pub struct SessionAnalytics {
    config: AnalyticsConfig,
    session_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    dwell: [f64; CHANNEL_COUNT],
    current_channel: Option<(Channel, DateTime<Utc>)>,
    gesture_counts: BTreeMap<GestureLabel, u32>,
    last_gesture: Option<GestureLabel>,
    posture_samples: Vec<f64>,
    posture_alerts: u32,
    alignment_count: u32,
}

impl SessionAnalytics {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4(),
            started_at: None,
            last_seen: None,
            dwell: [0.0; CHANNEL_COUNT],
            current_channel: None,
            gesture_counts: GestureLabel::MUDRAS.iter().map(|g| (*g, 0)).collect(),
            last_gesture: None,
            posture_samples: Vec::new(),
            posture_alerts: 0,
            alignment_count: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        self.last_seen = Some(now);
    }

    /// Note the channel active at `now`; time since the previous call goes to
    /// the channel that was active then
    pub fn record_channel(&mut self, channel: Option<Channel>, now: DateTime<Utc>) {
        self.touch(now);
        if let Some((prev, since)) = self.current_channel {
            let elapsed = (now - since).num_milliseconds().max(0) as f64 / 1000.0;
            self.dwell[prev.index()] += elapsed;
        }
        self.current_channel = channel.map(|c| (c, now));
    }

    /// Count a mudra when it first appears; holding it does not re-count
    pub fn record_gesture(&mut self, gesture: Option<GestureLabel>) {
        if let Some(label) = gesture {
            if label.is_mudra() && self.last_gesture != Some(label) {
                *self.gesture_counts.entry(label).or_insert(0) += 1;
            }
        }
        self.last_gesture = gesture;
    }

    pub fn record_posture(&mut self, score: f64) {
        self.posture_samples.push(score);
        if score < self.config.low_posture_threshold {
            self.posture_alerts += 1;
        }
    }

    pub fn record_alignment(&mut self) {
        self.alignment_count += 1;
    }

    /// Report as of the last recorded tick
    pub fn summary(&self) -> SessionSummary {
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let ended_at = self.last_seen.unwrap_or(started_at);

        let mut dwell = self.dwell;
        if let Some((channel, since)) = self.current_channel {
            dwell[channel.index()] += (ended_at - since).num_milliseconds().max(0) as f64 / 1000.0;
        }

        let mean_posture = if self.posture_samples.is_empty() {
            0.0
        } else {
            self.posture_samples.iter().sum::<f64>() / self.posture_samples.len() as f64
        };

        SessionSummary {
            session_id: self.session_id,
            started_at,
            ended_at,
            duration_secs: (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
            channel_dwell_secs: Channel::ALL.iter().map(|c| (*c, dwell[c.index()])).collect(),
            gesture_counts: self.gesture_counts.clone(),
            mean_posture,
            posture_samples: self.posture_samples.len(),
            posture_alerts: self.posture_alerts,
            alignment_count: self.alignment_count,
        }
    }
}

impl Default for SessionAnalytics {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_dwell_goes_to_previous_channel() {
        let mut a = SessionAnalytics::default();
        a.record_channel(Some(Channel::Crown), at(0));
        a.record_channel(Some(Channel::Crown), at(1_000));
        a.record_channel(Some(Channel::Root), at(2_500));
        a.record_channel(None, at(3_000));
        a.record_channel(None, at(9_000));

        let s = a.summary();
        assert_eq!(s.channel_dwell_secs[&Channel::Crown], 2.5);
        assert_eq!(s.channel_dwell_secs[&Channel::Root], 0.5);
        assert_eq!(s.channel_dwell_secs[&Channel::Heart], 0.0);
        assert_eq!(s.duration_secs, 9.0);
    }

    #[test]
    fn test_open_channel_counted_in_summary() {
        let mut a = SessionAnalytics::default();
        a.record_channel(Some(Channel::Throat), at(0));
        a.record_channel(Some(Channel::Throat), at(4_000));
        assert_eq!(a.summary().channel_dwell_secs[&Channel::Throat], 4.0);
    }

    #[test]
    fn test_gesture_counts_rising_edges() {
        let mut a = SessionAnalytics::default();
        for g in [
            Some(GestureLabel::Gyan),
            Some(GestureLabel::Gyan),
            None,
            Some(GestureLabel::Gyan),
            Some(GestureLabel::Prana),
            Some(GestureLabel::Fist),
        ] {
            a.record_gesture(g);
        }
        let s = a.summary();
        assert_eq!(s.gesture_counts[&GestureLabel::Gyan], 2);
        assert_eq!(s.gesture_counts[&GestureLabel::Prana], 1);
        assert_eq!(s.gesture_counts[&GestureLabel::Surya], 0);
        assert!(!s.gesture_counts.contains_key(&GestureLabel::Fist));
    }

    #[test]
    fn test_posture_mean_and_alerts() {
        let mut a = SessionAnalytics::default();
        for score in [0.9, 0.3, 0.6] {
            a.record_posture(score);
        }
        let s = a.summary();
        assert!((s.mean_posture - 0.6).abs() < 1e-9);
        assert_eq!(s.posture_alerts, 1);
        assert_eq!(s.posture_samples, 3);
    }

    #[test]
    fn test_empty_summary() {
        let mut a = SessionAnalytics::default();
        a.record_alignment();
        let s = a.summary();
        assert_eq!(s.mean_posture, 0.0);
        assert_eq!(s.duration_secs, 0.0);
        assert_eq!(s.alignment_count, 1);
        assert_eq!(s.session_id, a.session_id());
    }
}
