//! Vehicle client trait definition

use crate::command::{ClimateRequest, VehicleCommand};
use crate::snapshot::TelemetrySnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Trait for vehicle account clients
///
/// Implementations own the session with the vehicle backend. Every call may
/// fail; errors are classified by the caller (see
/// [`classify_failure`](crate::error::classify_failure)) and never retried.
#[async_trait]
pub trait VehicleClient: Send + Sync {
    /// Display name of the vehicle (nickname, VIN, ...)
    fn name(&self) -> &str;

    /// Fetch the current status document
    ///
    /// With `refresh = false` the backend's cached status is returned; with
    /// `refresh = true` the vehicle itself is woken up and queried.
    async fn fetch_status(&self, refresh: bool) -> Result<TelemetrySnapshot>;

    async fn lock(&self) -> Result<()>;

    async fn unlock(&self) -> Result<()>;

    async fn start_climate(&self, request: &ClimateRequest) -> Result<()>;

    async fn stop_climate(&self) -> Result<()>;

    async fn start_charge(&self) -> Result<()>;

    async fn stop_charge(&self) -> Result<()>;

    /// Issue a command through the matching method
    async fn execute(&self, command: &VehicleCommand) -> Result<()> {
        match command {
            VehicleCommand::Lock => self.lock().await,
            VehicleCommand::Unlock => self.unlock().await,
            VehicleCommand::StartClimate(request) => self.start_climate(request).await,
            VehicleCommand::StopClimate => self.stop_climate().await,
            VehicleCommand::StartCharge => self.start_charge().await,
            VehicleCommand::StopCharge => self.stop_charge().await,
        }
    }
}
