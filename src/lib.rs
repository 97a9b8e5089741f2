//! Mudra Flux - real-time gesture, posture and heart-rate state fusion
//!
//! Flux turns per-frame body landmarks and an optional heart-rate stream into a
//! fused session state through a deterministic per-tick pipeline:
//! landmarks → gesture / posture / face readings → breathing, meditation and
//! physiology trackers → seven-channel energy model → coaching and analytics.
//!
//! ## Modules
//!
//! - **Classifiers**: stateless gesture, posture and face readings per frame
//! - **Trackers**: breathing, meditation, physiology, sensor link and kumbhaka state
//! - **Energy**: ceiling-constrained channel vector with alignment mode
//! - **Pipeline**: [`FusionSession`] wiring every stage together, plus batch replay

pub mod analytics;
pub mod breathing;
pub mod coach;
pub mod config;
pub mod energy;
pub mod error;
pub mod face;
pub mod gesture;
pub mod kumbhaka;
pub mod meditation;
pub mod physiology;
pub mod pipeline;
pub mod posture;
pub mod sensor;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analytics::SessionSummary;
pub use config::FusionConfig;
pub use error::ComputeError;
pub use pipeline::{process_ticks, replay_ndjson, FusionSession, SessionReport, TickSnapshot};

pub use types::{
    BodyLandmarks, Channel, FaceLandmarks, GestureLabel, HandLandmarks, LandmarkFrame,
    PhysiologyReading, Point, TickInput,
};

/// Flux version reported by the CLI and FFI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported alongside session reports
pub const PRODUCER_NAME: &str = "mudra-flux";
