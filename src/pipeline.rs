//! Pipeline orchestration
//!
//! This module provides the public API for Mudra Flux. A [`FusionSession`]
//! owns one instance of every stage and runs them once per tick:
//!
//! 1. SensorLink - resample the latest physiology reading
//! 2. GestureClassifier, PostureScorer, FaceAnalyzer - leaf signals
//! 3. BreathingEstimator, MeditationStateMachine, PhysiologyEngine
//! 4. EnergyStateModel - fuse everything into the channel vector
//! 5. KumbhakaTracker, SessionAnalytics, coach message

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytics::{SessionAnalytics, SessionSummary};
use crate::breathing::{BreathingEstimator, BreathingState};
use crate::coach::coach_message;
use crate::config::FusionConfig;
use crate::energy::{EnergyInputs, EnergySnapshot, EnergyStateModel};
use crate::error::ComputeError;
use crate::face::{FaceAnalyzer, FaceReading};
use crate::gesture::GestureClassifier;
use crate::kumbhaka::{KumbhakaState, KumbhakaTracker};
use crate::meditation::{MeditationState, MeditationStateMachine};
use crate::physiology::{PhysiologyEngine, PhysiologyMetrics};
use crate::posture::{PostureAssessment, PostureScorer};
use crate::sensor::{LinkStatus, SensorLink};
use crate::types::{GestureLabel, PhysiologyReading, TickInput};

/// Everything the session produced for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Mudra detected this tick
    pub gesture: Option<GestureLabel>,
    /// Open palm / fist / peace reading of the first hand
    pub hand_shape: Option<GestureLabel>,
    pub posture: PostureAssessment,
    pub face: FaceReading,
    pub breathing: BreathingState,
    pub meditation: MeditationState,
    pub energy: EnergySnapshot,
    pub physiology: PhysiologyMetrics,
    pub sensor: LinkStatus,
    pub spo2: f64,
    pub touching_nose: bool,
    pub kumbhaka: KumbhakaState,
    pub coach: String,
}

/// Snapshots for a whole replayed session plus its summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub snapshots: Vec<TickSnapshot>,
    pub summary: SessionSummary,
}

/// Stateful fusion engine for one user session.
///
/// Each session owns its own trackers, so several sessions can run side by
/// side without sharing state.
pub struct FusionSession {
    config: FusionConfig,
    gestures: GestureClassifier,
    posture: PostureScorer,
    face: FaceAnalyzer,
    breathing: BreathingEstimator,
    energy: EnergyStateModel,
    meditation: MeditationStateMachine,
    physiology: PhysiologyEngine,
    sensor: SensorLink,
    kumbhaka: KumbhakaTracker,
    analytics: SessionAnalytics,
    last_tick: Option<DateTime<Utc>>,
    was_aligning: bool,
}

impl Default for FusionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FusionSession {
    /// Create a session with default tuning
    pub fn new() -> Self {
        Self::build(FusionConfig::default())
    }

    /// Create a session with a validated configuration
    pub fn with_config(config: FusionConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FusionConfig) -> Self {
        let session = Self {
            gestures: GestureClassifier::new(config.gesture.clone()),
            posture: PostureScorer::new(),
            face: FaceAnalyzer::new(config.face.clone()),
            breathing: BreathingEstimator::new(config.breathing.clone()),
            energy: EnergyStateModel::new(config.energy.clone()),
            meditation: MeditationStateMachine::new(config.meditation.clone()),
            physiology: PhysiologyEngine::new(config.physiology.clone()),
            sensor: SensorLink::new(config.sensor.clone()),
            kumbhaka: KumbhakaTracker::new(config.kumbhaka.clone()),
            analytics: SessionAnalytics::new(config.analytics.clone()),
            config,
            last_tick: None,
            was_aligning: false,
        };
        info!(session_id = %session.analytics.session_id(), "fusion session created");
        session
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Push a physiology reading that arrived outside a tick
    pub fn ingest_physiology(
        &mut self,
        reading: &PhysiologyReading,
        at: DateTime<Utc>,
    ) -> Result<(), ComputeError> {
        reading.validate()?;
        self.sensor.ingest(reading, at);
        Ok(())
    }

    /// Validate a tick and reject timestamps that go backwards, then run it
    pub fn try_tick(&mut self, input: &TickInput) -> Result<TickSnapshot, ComputeError> {
        input.validate()?;
        if let Some(last) = self.last_tick {
            if input.timestamp < last {
                return Err(ComputeError::NonMonotonicTick(format!(
                    "{} is before previous tick {}",
                    input.timestamp.to_rfc3339(),
                    last.to_rfc3339()
                )));
            }
        }
        Ok(self.tick(input))
    }

    /// Run one tick. Never fails: missing inputs are normal states.
    pub fn tick(&mut self, input: &TickInput) -> TickSnapshot {
        let now = input.timestamp;
        let frame = &input.frame;
        self.last_tick = Some(now);

        if let Some(reading) = &input.physiology {
            self.sensor.ingest(reading, now);
        }
        let sample = self.sensor.sample(now);

        let gesture = self.gestures.classify(&frame.hands);
        let hand_shape = frame
            .hands
            .first()
            .and_then(|hand| self.gestures.classify_shape(hand));
        let posture = self.posture.assess(frame.body.as_ref());
        let face = self.face.analyze(frame.face.as_ref(), sample.heart_rate);
        let breathing = self.breathing.update(face.nose_y);

        let centered = face.gaze.is_centered();
        let distracted = face.gaze.is_distracted();
        let meditation = self
            .meditation
            .update(face.eyes_closed, centered, breathing.is_stable, now);
        let physiology = self
            .physiology
            .analyze(sample.heart_rate, sample.beat, centered, now);

        let channel = gesture.and_then(|g| g.channel());
        let energy = self.energy.tick(
            &EnergyInputs {
                posture_score: posture.score,
                body_present: posture.has_body(),
                gesture: channel,
                eyes_closed: face.eyes_closed,
                distracted,
                concentration: meditation.concentration,
                frame_empty: frame.is_empty(),
            },
            now,
        );

        let touching_nose = input.touch.unwrap_or_else(|| {
            self.face
                .detects_nose_touch(frame.face.as_ref(), &frame.hands)
        });
        let kumbhaka = self.kumbhaka.update(touching_nose, sample.heart_rate);

        self.analytics
            .record_channel(channel.filter(|_| !distracted), now);
        self.analytics.record_gesture(gesture);
        if posture.has_body() {
            self.analytics.record_posture(posture.score);
        }
        if energy.alignment_active && !self.was_aligning {
            self.analytics.record_alignment();
        }
        self.was_aligning = energy.alignment_active;

        let coach = coach_message(&energy, face.mood, gesture == Some(GestureLabel::Gyan));

        debug!(
            gesture = ?gesture,
            ceiling = energy.ceiling,
            mean_energy = energy.mean(),
            concentration = meditation.concentration,
            "tick processed"
        );

        TickSnapshot {
            timestamp: now,
            gesture,
            hand_shape,
            posture,
            face,
            breathing,
            meditation,
            energy,
            physiology,
            sensor: sample.status,
            spo2: sample.spo2,
            touching_nose,
            kumbhaka,
            coach,
        }
    }

    /// Session report as of the last tick
    pub fn summary(&self) -> SessionSummary {
        self.analytics.summary()
    }
}

/// Run a batch of ticks through a fresh session
pub fn process_ticks(
    ticks: &[TickInput],
    config: FusionConfig,
) -> Result<SessionReport, ComputeError> {
    if ticks.is_empty() {
        return Err(ComputeError::EmptyInput);
    }

    let mut session = FusionSession::with_config(config)?;
    let snapshots = ticks
        .iter()
        .map(|tick| session.try_tick(tick))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SessionReport {
        snapshots,
        summary: session.summary(),
    })
}

/// Parse a tick stream: a JSON array, or one JSON object per line
pub fn parse_ticks(input: &str) -> Result<Vec<TickInput>, ComputeError> {
    if input.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(input)?);
    }

    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| ComputeError::ParseError(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}

/// A tick rejected by [`validate_stream`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickIssue {
    /// 1-based line for NDJSON, 1-based element for a JSON array
    pub position: usize,
    pub error: String,
}

/// Check every tick of a stream without running it.
///
/// Each tick is decoded, validated and checked against the previous valid
/// timestamp. Returns the number of ticks seen and the rejected ones; only a
/// malformed JSON array is an error for the whole stream.
pub fn validate_stream(input: &str) -> Result<(usize, Vec<TickIssue>), ComputeError> {
    let entries: Vec<(usize, Result<TickInput, ComputeError>)> =
        if input.trim_start().starts_with('[') {
            let values: Vec<serde_json::Value> = serde_json::from_str(input)?;
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i + 1, serde_json::from_value(v).map_err(ComputeError::from)))
                .collect()
        } else {
            input
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| (i + 1, serde_json::from_str(line).map_err(ComputeError::from)))
                .collect()
        };

    let total = entries.len();
    let mut issues = Vec::new();
    let mut last: Option<DateTime<Utc>> = None;
    for (position, decoded) in entries {
        let checked = decoded.and_then(|tick| {
            tick.validate()?;
            if last.is_some_and(|prev| tick.timestamp < prev) {
                return Err(ComputeError::NonMonotonicTick(tick.timestamp.to_rfc3339()));
            }
            last = Some(tick.timestamp);
            Ok(())
        });
        if let Err(e) = checked {
            debug!(position, error = %e, "invalid tick");
            issues.push(TickIssue {
                position,
                error: e.to_string(),
            });
        }
    }

    Ok((total, issues))
}

/// Parse and replay an NDJSON (or JSON array) tick stream
pub fn replay_ndjson(input: &str, config: FusionConfig) -> Result<SessionReport, ComputeError> {
    let ticks = parse_ticks(input)?;
    process_ticks(&ticks, config)
}
