//! Vehicle-facing operations
//!
//! Every operation takes the single-flight guard before talking to the
//! vehicle and releases it on return, including error paths. Status fetches
//! normalize the snapshot, remember the result and hand it to the sinks.

use crate::state::AppState;
use hb_core::{
    classify_failure, CanonicalState, ClimateRequest, CommandFailure, CommandOutcome,
    TelemetrySnapshot, VehicleClient, VehicleCommand,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Another vehicle operation is in progress, try again later")]
    Busy,

    #[error("Vehicle not ready")]
    NotReady,

    #[error("{0}")]
    Failed(String),
}

/// A status fetch and its normalized form
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub snapshot: Arc<TelemetrySnapshot>,
    pub state: CanonicalState,
}

async fn attached_vehicle(state: &AppState) -> Result<Arc<dyn VehicleClient>, OperationError> {
    state.vehicle().await.ok_or(OperationError::NotReady)
}

/// Fetch the vehicle status and publish it
///
/// `refresh = false` returns the backend's cached status; `refresh = true`
/// wakes the vehicle.
pub async fn refresh_status(
    state: &AppState,
    refresh: bool,
) -> Result<StatusReport, OperationError> {
    let vehicle = attached_vehicle(state).await?;

    let snapshot = {
        let _permit = state.guard.try_acquire().ok_or(OperationError::Busy)?;
        debug!(refresh, vehicle = vehicle.name(), "Fetching vehicle status");
        vehicle
            .fetch_status(refresh)
            .await
            .map_err(|e| OperationError::Failed(format!("{:#}", e)))?
    };

    let snapshot = Arc::new(snapshot);
    let canonical = CanonicalState::build(&snapshot);
    state.record(&canonical).await;
    state.sinks.dispatch(Arc::clone(&snapshot), canonical.clone());

    Ok(StatusReport {
        snapshot,
        state: canonical,
    })
}

/// Issue a command to the vehicle
///
/// A backend "duplicate request" rejection is a soft success
/// ([`CommandOutcome::VehicleBusy`]); every other failure is returned.
pub async fn run_command(
    state: &AppState,
    command: VehicleCommand,
) -> Result<CommandOutcome, OperationError> {
    let vehicle = attached_vehicle(state).await?;
    let _permit = state.guard.try_acquire().ok_or_else(|| {
        warn!(command = command.name(), "Rejected, another vehicle operation is running");
        OperationError::Busy
    })?;

    info!(command = command.name(), vehicle = vehicle.name(), "Sending command");
    match vehicle.execute(&command).await {
        Ok(()) => {
            info!(command = command.name(), "Command completed");
            Ok(CommandOutcome::Completed)
        }
        Err(e) => match classify_failure(&e) {
            CommandFailure::VehicleBusy { detail } => {
                warn!(command = command.name(), "Vehicle busy: {}", detail);
                Ok(CommandOutcome::VehicleBusy)
            }
            CommandFailure::Failed { detail } => {
                error!(command = command.name(), "Command failed: {}", detail);
                Err(OperationError::Failed(detail))
            }
        },
    }
}

/// Stop climate when the last status showed it running, otherwise start it
/// with the default parameters
pub fn toggle_command(climate_on: bool) -> VehicleCommand {
    if climate_on {
        VehicleCommand::StopClimate
    } else {
        VehicleCommand::StartClimate(ClimateRequest::default())
    }
}
