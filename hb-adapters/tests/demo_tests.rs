//! Integration tests for the DemoVehicle

use hb_adapters::DemoVehicle;
use hb_core::{CanonicalState, ClimateRequest, PlugState, VehicleClient, VehicleCommand};

async fn state_of(vehicle: &DemoVehicle, refresh: bool) -> CanonicalState {
    let snapshot = vehicle
        .fetch_status(refresh)
        .await
        .expect("fetch_status() should not error");
    CanonicalState::build(&snapshot)
}

#[tokio::test]
async fn test_demo_vehicle_name() {
    let vehicle = DemoVehicle::new();
    assert_eq!(vehicle.name(), "Demo");
}

#[tokio::test]
async fn test_demo_snapshot_normalizes() {
    let vehicle = DemoVehicle::new();
    let state = state_of(&vehicle, false).await;

    assert_eq!(state.battery_percent, 64);
    assert_eq!(state.range_km, 294);
    assert!(state.locked, "demo vehicle starts locked");
    assert!(state.aux_battery_ok);
    assert_eq!(state.plug_state, PlugState::Connected);
    assert!(!state.climate_on);
    assert!(!state.doors.any_open());
    assert!(state.last_update.is_some(), "demo snapshot carries a date stamp");
}

#[tokio::test]
async fn test_demo_lock_and_unlock() {
    let vehicle = DemoVehicle::new();

    vehicle.unlock().await.expect("unlock() should succeed");
    assert!(!state_of(&vehicle, false).await.locked);

    vehicle.lock().await.expect("lock() should succeed");
    assert!(state_of(&vehicle, false).await.locked);
}

#[tokio::test]
async fn test_demo_lock_fails_with_open_door() {
    let vehicle = DemoVehicle::new();
    vehicle.set_door_open(1, true).await;

    let err = vehicle.lock().await.expect_err("lock() should fail with an open door");
    assert!(err.to_string().contains("door is open"));

    let state = state_of(&vehicle, false).await;
    assert!(state.doors.front_right);
}

#[tokio::test]
async fn test_demo_climate_start_and_stop() {
    let vehicle = DemoVehicle::new();
    let request = ClimateRequest {
        temperature: 23.0,
        ..ClimateRequest::default()
    };

    vehicle
        .execute(&VehicleCommand::StartClimate(request))
        .await
        .expect("climate start should succeed");
    let state = state_of(&vehicle, false).await;
    assert!(state.climate_on);
    assert_eq!(state.climate_display_temp.as_deref(), Some("23"));
    assert!(state.seat_heat_active);
    assert!(state.wheel_heat_active);

    vehicle
        .execute(&VehicleCommand::StopClimate)
        .await
        .expect("climate stop should succeed");
    let state = state_of(&vehicle, false).await;
    assert!(!state.climate_on);
    assert_eq!(state.climate_display_temp, None);
    assert!(!state.seat_heat_active);
}

#[tokio::test]
async fn test_demo_charging_progresses_on_refresh() {
    let vehicle = DemoVehicle::new();
    vehicle.start_charge().await.expect("start_charge() should succeed");

    let before = state_of(&vehicle, false).await;
    assert_eq!(before.plug_state, PlugState::Charging);

    let after = state_of(&vehicle, true).await;
    assert!(after.battery_percent > before.battery_percent);

    vehicle.stop_charge().await.expect("stop_charge() should succeed");
    assert_eq!(state_of(&vehicle, false).await.plug_state, PlugState::Paused);
}

#[tokio::test]
async fn test_demo_charging_finishes_at_full() {
    let vehicle = DemoVehicle::new();
    vehicle.start_charge().await.unwrap();

    let mut state = state_of(&vehicle, true).await;
    for _ in 0..50 {
        if state.plug_state == PlugState::Finished {
            break;
        }
        state = state_of(&vehicle, true).await;
    }
    assert_eq!(state.plug_state, PlugState::Finished);
    assert_eq!(state.battery_percent, 100);
}

#[tokio::test]
async fn test_demo_aux_battery_warning() {
    let vehicle = DemoVehicle::new();
    vehicle.set_aux_battery_ok(false).await;
    assert!(!state_of(&vehicle, false).await.aux_battery_ok);
}
