//! Payload formatting for the downstream sinks
//!
//! MQTT republishes the raw snapshot (full JSON plus one retained topic per
//! leaf). UDP sends a fixed five-line report aimed at a Loxone virtual input.

use crate::flatten::flatten;
use crate::model::{is_truthy, CanonicalState};
use crate::paths;
use crate::snapshot::TelemetrySnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

pub const DEFAULT_BASE_TOPIC: &str = "hyundai";

/// A single retained MQTT publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl MqttMessage {
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }
}

/// Lower-cased base topic, `hyundai` when nothing is configured
pub fn mqtt_base_topic(configured: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        DEFAULT_BASE_TOPIC.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

pub fn bridge_status_topic(base: &str) -> String {
    format!("{}/bridge/status", base)
}

/// All messages published for one fresh snapshot
///
/// `{base}/json` and `{base}/lastupdate` come first, followed by one message
/// per flattened leaf of the document as received.
pub fn mqtt_messages<'a>(
    base: &'a str,
    snapshot: &'a TelemetrySnapshot,
    now: DateTime<Utc>,
) -> impl Iterator<Item = MqttMessage> + 'a {
    let json = serde_json::to_string(snapshot.raw()).unwrap_or_else(|_| "null".to_string());
    let head = [
        MqttMessage::retained(format!("{}/json", base), json),
        MqttMessage::retained(
            format!("{}/lastupdate", base),
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    ];

    let leaves = snapshot
        .as_map()
        .into_iter()
        .flat_map(move |map| flatten(base, map))
        .map(|(topic, payload)| MqttMessage::retained(topic, payload));

    head.into_iter().chain(leaves)
}

/// Five-line status report for the UDP receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UdpReport {
    pub battery_percent: u8,
    pub range_km: u32,
    pub locked: bool,
    pub climate_active: bool,
    pub charging: bool,
}

impl UdpReport {
    /// Build the report
    ///
    /// Climate here is a target-temperature heuristic and can disagree with
    /// [`CanonicalState::climate_on`], which follows the blower.
    pub fn from_state(snapshot: &TelemetrySnapshot, state: &CanonicalState) -> Self {
        Self {
            battery_percent: state.battery_percent,
            range_km: state.range_km,
            locked: state.locked,
            climate_active: temperature_climate_active(snapshot),
            charging: state.plug_state.is_charging(),
        }
    }

    pub fn payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UdpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hyundai_BatSoc: {}", self.battery_percent)?;
        writeln!(f, "Hyundai_Range: {}", self.range_km)?;
        writeln!(f, "Hyundai_Locked: {}", u8::from(self.locked))?;
        writeln!(f, "Hyundai_Climate: {}", u8::from(self.climate_active))?;
        write!(f, "Hyundai_Charging: {}", u8::from(self.charging))
    }
}

/// Climate counts as active when a target temperature is set and not "OFF"
pub fn temperature_climate_active(snapshot: &TelemetrySnapshot) -> bool {
    match snapshot.extract(paths::HVAC_TEMPERATURE) {
        Some(value) => {
            is_truthy(value) && value.as_str() != Some("OFF") && value.as_str() != Some("0")
        }
        None => false,
    }
}

/// Loxone VirtualInUdp template matching the report lines
pub fn loxone_template(port: u16) -> String {
    let commands = [
        ("Hyundai SOC", "Hyundai_BatSoc", Some("%")),
        ("Hyundai Range", "Hyundai_Range", Some("km")),
        ("Hyundai Locked", "Hyundai_Locked", None),
        ("Hyundai Climate", "Hyundai_Climate", None),
        ("Hyundai Charging", "Hyundai_Charging", None),
    ];

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><VirtualInUdp Title="Hyundai Bridge" Address="" Port="{}"><Info templateType="1" minVersion="16011106"/>"#,
        port
    );
    for (title, key, unit) in commands {
        let unit = unit.map(|u| format!(r#" Unit="{}""#, u)).unwrap_or_default();
        xml.push_str(&format!(
            r#"<VirtualInUdpCmd Title="{}" Check="{}: \v" Analog="true"{} />"#,
            title, key, unit
        ));
    }
    xml.push_str("</VirtualInUdp>");
    xml
}
