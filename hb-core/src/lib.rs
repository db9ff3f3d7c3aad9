//! Hyundai Bridge Core Library
//!
//! This crate provides the telemetry normalization engine (path-tolerant
//! extraction and the canonical vehicle state), the flattening serializer and
//! payload formatting used by the sinks, and the single-flight command guard.

pub mod command;
pub mod error;
pub mod flatten;
pub mod guard;
pub mod model;
pub mod paths;
pub mod publish;
pub mod snapshot;
pub mod vehicle;

pub use command::{ClimateRequest, CommandOutcome, VehicleCommand};
pub use error::{classify_failure, CommandFailure};
pub use guard::{CommandGuard, CommandPermit};
pub use model::{CanonicalState, DoorStates, PlugState, Severity};
pub use snapshot::TelemetrySnapshot;
pub use vehicle::VehicleClient;
