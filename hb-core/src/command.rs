//! Vehicle commands and their parameters

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Climate start parameters
///
/// Keys not modelled here are kept in `extra` and passed through to the
/// vehicle client untouched (seat heating levels and similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateRequest {
    /// `null` (a form field that did not parse) means the default
    #[serde(default = "default_temperature", deserialize_with = "temperature_or_default")]
    pub temperature: f64,
    /// Minutes
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub defrost: bool,
    #[serde(default = "default_true")]
    pub heating: bool,
    #[serde(default = "default_true")]
    pub climate: bool,
    #[serde(default)]
    pub windscreen_heating: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_temperature() -> f64 {
    21.0
}

fn temperature_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_temperature))
}

fn default_duration() -> u32 {
    15
}

fn default_true() -> bool {
    true
}

impl Default for ClimateRequest {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            duration: default_duration(),
            defrost: false,
            heating: true,
            climate: true,
            windscreen_heating: false,
            extra: Map::new(),
        }
    }
}

impl ClimateRequest {
    /// Overlay a request body on the defaults
    ///
    /// Defrost always switches windscreen heating on. Anything that is not a
    /// JSON object yields the defaults.
    pub fn from_body(body: &Value) -> serde_json::Result<Self> {
        let mut request: ClimateRequest = match body {
            Value::Object(_) => serde_json::from_value(body.clone())?,
            _ => ClimateRequest::default(),
        };
        if request.defrost {
            request.windscreen_heating = true;
        }
        Ok(request)
    }
}

/// Commands that can be issued to the vehicle
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Lock,
    Unlock,
    StartClimate(ClimateRequest),
    StopClimate,
    StartCharge,
    StopCharge,
}

impl VehicleCommand {
    /// Stable name reported back to callers
    pub fn name(&self) -> &'static str {
        match self {
            VehicleCommand::Lock => "lock",
            VehicleCommand::Unlock => "unlock",
            VehicleCommand::StartClimate(_) => "climate_start",
            VehicleCommand::StopClimate => "climate_stop",
            VehicleCommand::StartCharge => "charge_start",
            VehicleCommand::StopCharge => "charge_stop",
        }
    }
}

/// Result of a command that did not hard-fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// The backend reported a duplicate request; the command may still run
    VehicleBusy,
}
