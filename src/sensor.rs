//! Latest-value link to the heart-rate producer
//!
//! The producer runs on its own clock. Readings are pushed in with
//! [`SensorLink::ingest`] whenever they arrive and the session pulls one
//! resampled value per tick with [`SensorLink::sample`]; nothing ever blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{secs, SensorConfig};
use crate::types::PhysiologyReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connected,
    /// Readings arrive but no beat for a while
    Idle,
    /// No reading at all for a while, or never connected
    Disconnected,
}

/// Physiology values as seen by one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub heart_rate: f64,
    pub spo2: f64,
    /// A beat arrived since the previous tick
    pub beat: bool,
    pub status: LinkStatus,
}

#[derive(Debug, Clone)]
pub struct SensorLink {
    config: SensorConfig,
    heart_rate: f64,
    spo2: f64,
    pending_beat: bool,
    last_reading_at: Option<DateTime<Utc>>,
    last_beat_at: Option<DateTime<Utc>>,
    status: LinkStatus,
}

impl SensorLink {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            heart_rate: 0.0,
            spo2: 0.0,
            pending_beat: false,
            last_reading_at: None,
            last_beat_at: None,
            status: LinkStatus::Disconnected,
        }
    }

    /// Store a reading from the producer
    pub fn ingest(&mut self, reading: &PhysiologyReading, at: DateTime<Utc>) {
        if self.status == LinkStatus::Disconnected {
            info!(heart_rate = reading.heart_rate, "sensor connected");
            self.status = LinkStatus::Connected;
            // The no-beat timeout counts from the moment of connection
            self.last_beat_at = Some(at);
        }
        self.last_reading_at = Some(at);

        if reading.heart_rate <= 0.0 {
            self.heart_rate = 0.0;
            self.spo2 = 0.0;
        } else {
            self.heart_rate = reading.heart_rate;
            self.spo2 = reading.spo2.min(self.config.max_spo2);
        }

        if reading.beat_event {
            self.pending_beat = true;
            self.last_beat_at = Some(at);
        }
    }

    /// Resample the latest values for a tick at `now`
    pub fn sample(&mut self, now: DateTime<Utc>) -> SensorSample {
        let status = match (self.last_reading_at, self.last_beat_at) {
            (Some(read), _) if now - read > secs(self.config.stale_secs) => LinkStatus::Disconnected,
            (Some(_), Some(beat)) if now - beat > secs(self.config.no_beat_secs) => LinkStatus::Idle,
            (Some(_), _) => LinkStatus::Connected,
            (None, _) => LinkStatus::Disconnected,
        };

        if status != self.status {
            match status {
                LinkStatus::Disconnected => warn!(stale_secs = self.config.stale_secs, "sensor timed out"),
                LinkStatus::Idle => warn!(no_beat_secs = self.config.no_beat_secs, "no heart beat detected"),
                LinkStatus::Connected => info!("sensor beat resumed"),
            }
            self.status = status;
        }

        if status != LinkStatus::Connected {
            self.heart_rate = 0.0;
            self.spo2 = 0.0;
            self.pending_beat = false;
        }

        SensorSample {
            heart_rate: self.heart_rate,
            spo2: self.spo2,
            beat: std::mem::take(&mut self.pending_beat),
            status,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }
}

impl Default for SensorLink {
    fn default() -> Self {
        Self::new(SensorConfig::default())
    }
}
