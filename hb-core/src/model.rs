//! Canonical vehicle state
//!
//! Defines the schema-stable projection of a status snapshot that every
//! consumer (dashboard, sinks) works from. Building it never fails: absent
//! fields resolve to declared defaults.

use crate::flatten::scalar_to_string;
use crate::paths;
use crate::snapshot::{strict_code, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder shown when the update stamp is too short to parse
pub const STAMP_PLACEHOLDER: &str = "--:--";

const BATTERY_GOOD: u8 = 60;
const BATTERY_CRITICAL: u8 = 20;
const RANGE_GOOD: u32 = 300;
const RANGE_CRITICAL: u32 = 50;

/// Normalized vehicle state derived from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalState {
    /// High-voltage battery state of charge (0-100)
    pub battery_percent: u8,
    pub battery_severity: Severity,

    /// Remaining range in kilometers
    pub range_km: u32,
    pub range_severity: Severity,

    /// 12V auxiliary battery health
    pub aux_battery_ok: bool,

    pub plug_state: PlugState,
    pub plug_severity: Severity,

    pub locked: bool,
    pub doors: DoorStates,

    /// Blower running; independent of the target temperature
    pub climate_on: bool,
    pub climate_display_temp: Option<String>,

    pub seat_heat_active: bool,
    pub wheel_heat_active: bool,
    pub rear_defog_active: bool,

    /// Formatted as `DD.MM. HH:MM`
    pub last_update: Option<String>,
}

/// Open/closed state per body opening
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorStates {
    pub front_left: bool,
    pub front_right: bool,
    pub rear_left: bool,
    pub rear_right: bool,
    pub trunk: bool,
    pub hood: bool,
}

impl DoorStates {
    pub fn any_open(&self) -> bool {
        self.front_left
            || self.front_right
            || self.rear_left
            || self.rear_right
            || self.trunk
            || self.hood
    }
}

/// Display severity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warning,
    Critical,
    Info,
    Neutral,
}

impl Severity {
    pub fn for_battery(percent: u8) -> Self {
        if percent >= BATTERY_GOOD {
            Severity::Good
        } else if percent < BATTERY_CRITICAL {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    pub fn for_range(km: u32) -> Self {
        if km >= RANGE_GOOD {
            Severity::Good
        } else if km < RANGE_CRITICAL {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Info => "info",
            Severity::Neutral => "neutral",
        }
    }
}

/// Charge port / charging phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlugState {
    Disconnected,
    Connected,
    Charging,
    Paused,
    Finished,
}

impl PlugState {
    /// Classify from the charge sequence code, falling back to remaining time
    ///
    /// The sequence code always wins; remaining time is only consulted when
    /// the code is absent or unrecognized.
    pub fn classify(sequence: Option<i64>, fastened: bool, remain_minutes: f64) -> Self {
        match sequence {
            Some(8) => PlugState::Charging,
            Some(12) => PlugState::Paused,
            Some(2) => PlugState::Finished,
            Some(0) if fastened => PlugState::Connected,
            Some(0) => PlugState::Disconnected,
            _ if remain_minutes > 0.0 => PlugState::Charging,
            _ => PlugState::Disconnected,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlugState::Charging | PlugState::Finished => Severity::Good,
            PlugState::Paused => Severity::Warning,
            PlugState::Connected => Severity::Info,
            PlugState::Disconnected => Severity::Neutral,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PlugState::Disconnected => "plug-circle-xmark",
            PlugState::Connected => "plug",
            PlugState::Charging => "bolt",
            PlugState::Paused => "pause",
            PlugState::Finished => "check",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlugState::Disconnected => "Not plugged in",
            PlugState::Connected => "Plugged in",
            PlugState::Charging => "Charging",
            PlugState::Paused => "Paused",
            PlugState::Finished => "Finished",
        }
    }

    pub fn is_charging(&self) -> bool {
        matches!(self, PlugState::Charging)
    }
}

impl CanonicalState {
    /// Build the canonical state from a snapshot
    pub fn build(snapshot: &TelemetrySnapshot) -> Self {
        let battery_percent =
            round_clamped(snapshot.extract_f64(paths::BATTERY_RATIO, 0.0), 100.0) as u8;
        let range_km =
            round_clamped(snapshot.extract_f64(paths::RANGE_TOTAL, 0.0), u32::MAX as f64) as u32;

        let aux_battery_ok = match snapshot.extract(paths::AUX_FAIL_WARNING) {
            Some(_) => snapshot.extract_code(paths::AUX_FAIL_WARNING) == Some(0),
            None => match snapshot.extract(paths::AUX_LEGACY_STATUS) {
                Some(_) => snapshot.extract_code(paths::AUX_LEGACY_STATUS) == Some(1),
                None => true,
            },
        };

        let plug_state = PlugState::classify(
            snapshot.extract_code(paths::CHARGE_SEQUENCE),
            snapshot.extract_code(paths::CONNECTOR_FASTENING) == Some(1),
            snapshot.extract_f64(paths::CHARGE_REMAIN_TIME, 0.0),
        );

        // An absent lock reading counts as locked
        let locked = snapshot
            .extract(paths::DRIVER_LOCK)
            .map_or(true, |v| strict_code(v) == Some(0));

        let doors = DoorStates {
            front_left: snapshot.any_equals(paths::DOOR_FRONT_LEFT, 1),
            front_right: snapshot.any_equals(paths::DOOR_FRONT_RIGHT, 1),
            rear_left: snapshot.any_equals(paths::DOOR_REAR_LEFT, 1),
            rear_right: snapshot.any_equals(paths::DOOR_REAR_RIGHT, 1),
            trunk: snapshot.any_equals(paths::TRUNK_OPEN, 1),
            hood: snapshot.any_equals(paths::HOOD_OPEN, 1),
        };

        let climate_on = snapshot.extract_f64(paths::BLOWER_SPEED, 0.0) > 0.0;
        let climate_display_temp = climate_on.then(|| {
            snapshot
                .extract(paths::HVAC_TEMPERATURE)
                .filter(|v| is_truthy(v) && v.as_str() != Some("OFF"))
                .map(scalar_to_string)
                .unwrap_or_else(|| "ON".to_string())
        });

        let seat = snapshot.extract_f64(paths::SEAT_CLIMATE, 0.0);

        // First candidate carrying a usable stamp; an empty string falls through
        let last_update = paths::LAST_UPDATE
            .iter()
            .filter_map(|path| snapshot.resolve(path))
            .find(|v| is_truthy(v))
            .map(|v| format_stamp(&scalar_to_string(v)));

        Self {
            battery_percent,
            battery_severity: Severity::for_battery(battery_percent),
            range_km,
            range_severity: Severity::for_range(range_km),
            aux_battery_ok,
            plug_state,
            plug_severity: plug_state.severity(),
            locked,
            doors,
            climate_on,
            climate_display_temp,
            seat_heat_active: seat > 0.0 && seat != 2.0,
            wheel_heat_active: snapshot.extract_f64(paths::WHEEL_HEAT, 0.0) > 0.0,
            rear_defog_active: snapshot.extract_f64(paths::REAR_DEFOG, 0.0) > 0.0,
            last_update,
        }
    }
}

/// Format a `YYYYMMDDHHmmss` stamp as `DD.MM. HH:MM`
///
/// Stamps shorter than 14 characters yield the placeholder.
pub fn format_stamp(raw: &str) -> String {
    if raw.chars().count() < 14 {
        return STAMP_PLACEHOLDER.to_string();
    }
    match (raw.get(6..8), raw.get(4..6), raw.get(8..10), raw.get(10..12)) {
        (Some(day), Some(month), Some(hour), Some(minute)) => {
            format!("{day}.{month}. {hour}:{minute}")
        }
        _ => STAMP_PLACEHOLDER.to_string(),
    }
}

/// Loose truthiness: zero, empty strings and `false` count as unset
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn round_clamped(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.round().clamp(0.0, max)
}
