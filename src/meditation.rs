//! Meditation depth from eye closure and gaze

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MeditationConfig;

const MAX_CONCENTRATION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeditationStage {
    Distracted,
    Dharana,
    Dhyana,
    Samadhi,
}

impl MeditationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeditationStage::Distracted => "Distracted",
            MeditationStage::Dharana => "Dharana",
            MeditationStage::Dhyana => "Dhyana",
            MeditationStage::Samadhi => "Samadhi",
        }
    }

    fn eyes_closed(&self) -> bool {
        matches!(self, MeditationStage::Dhyana | MeditationStage::Samadhi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeditationState {
    /// Concentration in [0, 100]
    pub concentration: f64,
    pub stage: MeditationStage,
    /// Dharana above the deep-focus threshold
    pub deep: bool,
    /// When the current eyes-closed stretch began
    pub dwell_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MeditationStateMachine {
    config: MeditationConfig,
    state: MeditationState,
}

impl MeditationStateMachine {
    pub fn new(config: MeditationConfig) -> Self {
        Self {
            config,
            state: MeditationState {
                concentration: 0.0,
                stage: MeditationStage::Distracted,
                deep: false,
                dwell_start: None,
            },
        }
    }

    pub fn update(
        &mut self,
        eyes_closed: bool,
        gaze_centered: bool,
        breath_stable: bool,
        now: DateTime<Utc>,
    ) -> MeditationState {
        let cfg = &self.config;
        let prev = self.state.stage;
        let mut c = self.state.concentration;

        let stage = if eyes_closed {
            c = (c + cfg.closed_gain).min(MAX_CONCENTRATION);
            if c > cfg.samadhi_threshold && breath_stable {
                MeditationStage::Samadhi
            } else {
                MeditationStage::Dhyana
            }
        } else if gaze_centered {
            // Open eyes never push past the cap, but do not pull down either
            if c < cfg.open_cap {
                c = (c + cfg.centered_gain).min(cfg.open_cap);
            }
            MeditationStage::Dharana
        } else {
            c = (c - cfg.distracted_loss).max(0.0);
            MeditationStage::Distracted
        };

        if stage.eyes_closed() && !prev.eyes_closed() {
            self.state.dwell_start = Some(now);
        }
        if stage != prev {
            info!(from = prev.as_str(), to = stage.as_str(), concentration = c, "meditation stage changed");
        }

        self.state.concentration = c.clamp(0.0, MAX_CONCENTRATION);
        self.state.stage = stage;
        self.state.deep = stage == MeditationStage::Dharana && c > cfg.deep_focus_threshold;
        self.state
    }

    pub fn state(&self) -> &MeditationState {
        &self.state
    }
}

impl Default for MeditationStateMachine {
    fn default() -> Self {
        Self::new(MeditationConfig::default())
    }
}
