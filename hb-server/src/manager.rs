//! Vehicle session manager
//!
//! Attaches the vehicle client at startup and runs the optional background
//! status poll. Polls go through the same guard as user commands, so a poll
//! that collides with a command is skipped rather than queued.

use crate::bridge::{self, OperationError};
use crate::state::AppState;
use hb_adapters::DemoVehicle;
use hb_core::VehicleClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How often a disabled poller re-reads the interval from the config
const IDLE_RECHECK: Duration = Duration::from_secs(30);

/// Main manager loop
pub async fn run(state: AppState) {
    attach_vehicle(&state).await;
    info!("Vehicle manager started");

    loop {
        let interval = state.config.read().await.poll_interval_secs;
        if interval == 0 {
            sleep(IDLE_RECHECK).await;
            continue;
        }

        sleep(Duration::from_secs(interval)).await;
        poll_once(&state).await;
    }
}

/// Attach a vehicle client according to the current config
pub async fn attach_vehicle(state: &AppState) {
    let config = state.config.read().await.clone();

    if config.demo_mode {
        let vehicle = DemoVehicle::new();
        info!("Demo mode: attached simulated vehicle {}", vehicle.name());
        state.attach_vehicle(Arc::new(vehicle)).await;
    } else if !config.has_credentials() {
        warn!("No Bluelink credentials configured, vehicle commands are unavailable");
    } else {
        warn!(
            user = %config.bluelink_user,
            region = %config.region,
            brand = %config.brand,
            "No account client available for these credentials; enable demoMode to use the simulated vehicle"
        );
    }
}

async fn poll_once(state: &AppState) {
    match bridge::refresh_status(state, false).await {
        Ok(report) => debug!(
            battery = report.state.battery_percent,
            range = report.state.range_km,
            "Background status poll complete"
        ),
        Err(OperationError::Busy) => debug!("Vehicle busy, skipping background poll"),
        Err(OperationError::NotReady) => debug!("No vehicle attached, skipping background poll"),
        Err(e) => warn!("Background status poll failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ConfigStore};

    fn state_with(config: AppConfig) -> AppState {
        AppState::new(ConfigStore::new("unused.json"), config)
    }

    #[tokio::test]
    async fn test_demo_mode_attaches_vehicle() {
        let state = state_with(AppConfig {
            demo_mode: true,
            ..AppConfig::default()
        });
        attach_vehicle(&state).await;
        let vehicle = state.vehicle().await.expect("demo vehicle attached");
        assert_eq!(vehicle.name(), "Demo");
    }

    #[tokio::test]
    async fn test_missing_credentials_attach_nothing() {
        let state = state_with(AppConfig::default());
        attach_vehicle(&state).await;
        assert!(state.vehicle().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_skips_while_guard_held() {
        let state = state_with(AppConfig {
            demo_mode: true,
            ..AppConfig::default()
        });
        attach_vehicle(&state).await;

        {
            let _permit = state.guard.try_acquire().unwrap();
            poll_once(&state).await;
            assert!(state.latest.read().await.is_none());
        }

        poll_once(&state).await;
        assert!(state.latest.read().await.is_some());
    }
}
