//! Demo vehicle that simulates an electric car for testing
//!
//! Keeps a small state machine (battery, lock, doors, climate, charging) and
//! renders it into a status document shaped like the one newer vehicles
//! report. Commands mutate the state; a refreshing status fetch advances the
//! charging simulation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Local;
use hb_core::{ClimateRequest, TelemetrySnapshot, VehicleClient};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Usable battery capacity, used to turn state of charge into range
const KM_PER_PERCENT: f64 = 4.6;

/// State of charge gained per refreshing status fetch while charging
const CHARGE_STEP: f64 = 2.5;

/// Minutes to full at the simulated charge rate
const MINUTES_PER_PERCENT: f64 = 1.2;

// Charge sequence codes as reported by the backend
const SEQ_IDLE: i64 = 0;
const SEQ_FINISHED: i64 = 2;
const SEQ_CHARGING: i64 = 8;
const SEQ_PAUSED: i64 = 12;

#[derive(Debug, Clone)]
struct DemoState {
    battery: f64,
    locked: bool,
    doors_open: [bool; 4],
    trunk_open: bool,
    climate_on: bool,
    target_temp: f64,
    defrost: bool,
    plugged_in: bool,
    charge_sequence: i64,
    aux_battery_ok: bool,
    updated: String,
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            battery: 64.0,
            locked: true,
            doors_open: [false; 4],
            trunk_open: false,
            climate_on: false,
            target_temp: 21.0,
            defrost: false,
            plugged_in: true,
            charge_sequence: SEQ_IDLE,
            aux_battery_ok: true,
            updated: stamp_now(),
        }
    }
}

impl DemoState {
    fn advance(&mut self) {
        if self.charge_sequence == SEQ_CHARGING {
            self.battery = (self.battery + CHARGE_STEP).min(100.0);
            if self.battery >= 100.0 {
                self.charge_sequence = SEQ_FINISHED;
            }
        }
        self.updated = stamp_now();
    }

    fn remaining_minutes(&self) -> i64 {
        if self.charge_sequence == SEQ_CHARGING {
            ((100.0 - self.battery) * MINUTES_PER_PERCENT).round() as i64
        } else {
            0
        }
    }

    fn to_document(&self) -> Value {
        let open = |b: bool| i64::from(b);
        let blower = if self.climate_on { 4 } else { 0 };
        let seat = if self.climate_on { 3 } else { 2 };
        let temperature = if self.climate_on {
            Value::String(format!("{}", self.target_temp))
        } else {
            Value::String("OFF".to_string())
        };

        json!({
            "Green": {
                "BatteryManagement": {
                    "BatteryRemain": { "Ratio": (self.battery * 10.0).round() / 10.0 }
                },
                "ChargingInformation": {
                    "SequenceDetails": self.charge_sequence,
                    "ConnectorFastening": { "State": open(self.plugged_in) },
                    "Charging": { "RemainTime": self.remaining_minutes() }
                }
            },
            "Drivetrain": {
                "FuelSystem": { "DTE": { "Total": (self.battery * KM_PER_PERCENT).round() } }
            },
            "Electronics": {
                "Battery": { "Auxiliary": { "FailWarning": open(!self.aux_battery_ok) } }
            },
            "Cabin": {
                "Door": {
                    "Row1": {
                        "Driver": { "Lock": open(!self.locked), "Open": open(self.doors_open[0]) },
                        "Passenger": { "Lock": open(!self.locked), "Open": open(self.doors_open[1]) }
                    },
                    "Row2": {
                        "Left": { "Lock": open(!self.locked), "Open": open(self.doors_open[2]) },
                        "Right": { "Lock": open(!self.locked), "Open": open(self.doors_open[3]) }
                    }
                },
                "HVAC": {
                    "Row1": {
                        "Driver": {
                            "Blower": { "SpeedLevel": blower },
                            "Temperature": { "Value": temperature }
                        }
                    }
                },
                "Seat": {
                    "Row1": { "Driver": { "Climate": { "State": seat } } }
                },
                "SteeringWheel": { "Heat": { "State": open(self.climate_on && self.target_temp > 22.0) } }
            },
            "Body": {
                "Trunk": { "Open": open(self.trunk_open) },
                "Hood": { "Open": 0 },
                "Windshield": { "Rear": { "Defog": { "State": open(self.climate_on && self.defrost) } } }
            },
            "Location": { "Date": self.updated }
        })
    }
}

fn stamp_now() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Demo vehicle client
pub struct DemoVehicle {
    name: String,
    state: Mutex<DemoState>,
    latency: Duration,
}

impl DemoVehicle {
    pub fn new() -> Self {
        Self {
            name: "Demo".to_string(),
            state: Mutex::new(DemoState::default()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call, to make overlapping requests observable
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Open or close a door (0 = front left .. 3 = rear right, 4 = trunk)
    pub async fn set_door_open(&self, index: usize, open: bool) {
        let mut state = self.state.lock().await;
        match index {
            0..=3 => state.doors_open[index] = open,
            _ => state.trunk_open = open,
        }
    }

    pub async fn set_aux_battery_ok(&self, ok: bool) {
        self.state.lock().await.aux_battery_ok = ok;
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for DemoVehicle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleClient for DemoVehicle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_status(&self, refresh: bool) -> Result<TelemetrySnapshot> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if refresh {
            state.advance();
        }
        Ok(TelemetrySnapshot::new(state.to_document()))
    }

    async fn lock(&self) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if state.doors_open.iter().any(|open| *open) {
            bail!("Cannot lock: a door is open");
        }
        state.locked = true;
        Ok(())
    }

    async fn unlock(&self) -> Result<()> {
        self.simulate_latency().await;
        self.state.lock().await.locked = false;
        Ok(())
    }

    async fn start_climate(&self, request: &ClimateRequest) -> Result<()> {
        self.simulate_latency().await;
        debug!(
            temperature = request.temperature,
            duration = request.duration,
            "demo climate start"
        );
        let mut state = self.state.lock().await;
        state.climate_on = request.climate || request.heating;
        state.target_temp = request.temperature;
        state.defrost = request.defrost;
        Ok(())
    }

    async fn stop_climate(&self) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.climate_on = false;
        state.defrost = false;
        Ok(())
    }

    async fn start_charge(&self) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if !state.plugged_in {
            bail!("Cannot start charging: connector not fastened");
        }
        state.charge_sequence = if state.battery >= 100.0 {
            SEQ_FINISHED
        } else {
            SEQ_CHARGING
        };
        Ok(())
    }

    async fn stop_charge(&self) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if state.charge_sequence == SEQ_CHARGING {
            state.charge_sequence = SEQ_PAUSED;
        }
        Ok(())
    }
}
