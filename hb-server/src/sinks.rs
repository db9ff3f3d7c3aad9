//! Output sink implementations
//!
//! Sinks republish each fresh status snapshot to local consumers: an MQTT
//! broker (retained topic tree) and a UDP receiver (five-line report).
//! Delivery is fire-and-forget; failures are logged and never reach the
//! HTTP caller.

use crate::config::AppConfig;
use anyhow::Result;
use chrono::Utc;
use hb_core::publish::{bridge_status_topic, mqtt_base_topic, mqtt_messages, UdpReport};
use hb_core::{CanonicalState, TelemetrySnapshot};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const MQTT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MQTT_CHANNEL_CAPACITY: usize = 256;

/// Trait for output sinks
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hand a snapshot to the sink without waiting for delivery
    fn send(&self, snapshot: &Arc<TelemetrySnapshot>, state: &CanonicalState) -> Result<()>;
}

/// MQTT connection state as shown on the settings page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttStatus {
    NotConfigured,
    Disabled,
    Connecting,
    Connected,
    Offline,
    Error(String),
}

impl fmt::Display for MqttStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttStatus::NotConfigured => write!(f, "Not configured"),
            MqttStatus::Disabled => write!(f, "Disabled (no host)"),
            MqttStatus::Connecting => write!(f, "Connecting..."),
            MqttStatus::Connected => write!(f, "Connected"),
            MqttStatus::Offline => write!(f, "Offline"),
            MqttStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// MQTT sink: retained topic tree below a lower-cased base topic
pub struct MqttSink {
    client: AsyncClient,
    base: String,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl MqttSink {
    /// Start connecting to the configured broker
    ///
    /// Returns immediately; the connection is driven by a background task
    /// that reconnects until the sink is dropped.
    pub fn connect(config: &AppConfig, status: Arc<RwLock<MqttStatus>>) -> Self {
        let base = mqtt_base_topic(&config.mqtt_topic);
        let client_id = format!("hyundai_bridge_{:08x}", rand::random::<u32>());

        let mut options = MqttOptions::new(client_id, config.mqtt_host.trim(), config.mqtt_port);
        options.set_keep_alive(MQTT_KEEP_ALIVE);
        if !config.mqtt_user.is_empty() {
            options.set_credentials(config.mqtt_user.clone(), config.mqtt_pass.clone());
        }
        options.set_last_will(LastWill::new(
            bridge_status_topic(&base),
            b"offline".to_vec(),
            QoS::AtLeastOnce,
            true,
        ));

        info!(
            "MQTT: connecting to mqtt://{}:{} (base topic {})",
            config.mqtt_host, config.mqtt_port, base
        );

        let (client, eventloop) = AsyncClient::new(options, MQTT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        tokio::spawn(drive_event_loop(
            eventloop,
            client.clone(),
            base.clone(),
            connected.clone(),
            status,
            cancel.clone(),
        ));

        Self {
            client,
            base,
            connected,
            cancel,
        }
    }

    pub fn base_topic(&self) -> &str {
        &self.base
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Sink for MqttSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn send(&self, snapshot: &Arc<TelemetrySnapshot>, _state: &CanonicalState) -> Result<()> {
        if !self.is_connected() {
            debug!("MQTT not connected, skipping publish");
            return Ok(());
        }

        let client = self.client.clone();
        let base = self.base.clone();
        let snapshot = Arc::clone(snapshot);
        tokio::spawn(async move {
            let mut published = 0usize;
            for message in mqtt_messages(&base, &snapshot, Utc::now()) {
                if let Err(e) = client
                    .publish(message.topic, QoS::AtLeastOnce, message.retain, message.payload)
                    .await
                {
                    warn!("MQTT publish failed: {}", e);
                    return;
                }
                published += 1;
            }
            debug!(topics = published, "MQTT snapshot published below {}", base);
        });
        Ok(())
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.client.try_disconnect();
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    base: String,
    connected: Arc<AtomicBool>,
    status: Arc<RwLock<MqttStatus>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connected");
                    connected.store(true, Ordering::Release);
                    *status.write().await = MqttStatus::Connected;

                    // try_publish: awaiting here would stall the loop that drains the queue
                    if let Err(e) = client.try_publish(
                        bridge_status_topic(&base),
                        QoS::AtLeastOnce,
                        true,
                        b"online".to_vec(),
                    ) {
                        warn!("MQTT: failed to announce bridge status: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("MQTT disconnected by broker");
                    connected.store(false, Ordering::Release);
                    *status.write().await = MqttStatus::Offline;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT error: {}", e);
                    connected.store(false, Ordering::Release);
                    *status.write().await = MqttStatus::Error(e.to_string());
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(MQTT_RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    debug!("MQTT event loop stopped");
}

/// UDP sink: one datagram per snapshot
pub struct UdpSink {
    host: String,
    port: u16,
}

impl UdpSink {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// `None` when UDP is disabled or host/port are unset
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let host = config.udp_host.trim();
        if !config.enable_udp || host.is_empty() || config.udp_port == 0 {
            return None;
        }
        Some(Self::new(host.to_string(), config.udp_port))
    }
}

impl Sink for UdpSink {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn send(&self, snapshot: &Arc<TelemetrySnapshot>, state: &CanonicalState) -> Result<()> {
        let payload = UdpReport::from_state(snapshot, state).payload();
        let host = self.host.clone();
        let port = self.port;
        tokio::spawn(async move {
            if let Err(e) = send_datagram(&host, port, payload.as_bytes()).await {
                warn!("UDP send error to {}:{}: {}", host, port, e);
            }
        });
        Ok(())
    }
}

async fn send_datagram(host: &str, port: u16, payload: &[u8]) -> std::io::Result<usize> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.send_to(payload, (host, port)).await
}

/// Owns the active sinks and rebuilds them when the config changes
#[derive(Clone)]
pub struct SinkHub {
    sinks: Arc<RwLock<Vec<Box<dyn Sink>>>>,
    mqtt_status: Arc<RwLock<MqttStatus>>,
}

impl SinkHub {
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Vec::new())),
            mqtt_status: Arc::new(RwLock::new(MqttStatus::NotConfigured)),
        }
    }

    /// Tear down the current sinks and build new ones from `config`
    ///
    /// A publish already in flight on the old sinks may still complete.
    pub async fn reconfigure(&self, config: &AppConfig) {
        let mut sinks = self.sinks.write().await;
        sinks.clear();

        if config.mqtt_host.trim().is_empty() {
            *self.mqtt_status.write().await = MqttStatus::Disabled;
        } else {
            *self.mqtt_status.write().await = MqttStatus::Connecting;
            sinks.push(Box::new(MqttSink::connect(config, self.mqtt_status.clone())));
        }

        if let Some(udp) = UdpSink::from_config(config) {
            info!("UDP: sending reports to {}:{}", udp.host, udp.port);
            sinks.push(Box::new(udp));
        }
    }

    /// Publish to every sink without blocking the caller
    pub fn dispatch(&self, snapshot: Arc<TelemetrySnapshot>, state: CanonicalState) {
        let sinks = self.sinks.clone();
        tokio::spawn(async move {
            let sinks = sinks.read().await;
            for sink in sinks.iter() {
                if let Err(e) = sink.send(&snapshot, &state) {
                    warn!(sink = sink.name(), "Sink error: {}", e);
                }
            }
        });
    }

    pub async fn mqtt_status(&self) -> MqttStatus {
        self.mqtt_status.read().await.clone()
    }

    pub async fn active_sinks(&self) -> Vec<&'static str> {
        self.sinks.read().await.iter().map(|s| s.name()).collect()
    }
}

impl Default for SinkHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    fn sample() -> Arc<TelemetrySnapshot> {
        Arc::new(TelemetrySnapshot::new(json!({
            "Green": { "BatteryManagement": { "BatteryRemain": { "Ratio": 55 } } },
            "Drivetrain": { "FuelSystem": { "DTE": { "Total": 210 } } }
        })))
    }

    #[test]
    fn test_udp_sink_requires_enabled_host_and_port() {
        let mut config = AppConfig {
            udp_host: "10.0.0.5".to_string(),
            udp_port: 7888,
            ..AppConfig::default()
        };
        assert!(UdpSink::from_config(&config).is_none(), "disabled");

        config.enable_udp = true;
        assert_eq!(
            UdpSink::from_config(&config).map(|s| (s.host.clone(), s.port)),
            Some(("10.0.0.5".to_string(), 7888))
        );

        config.udp_port = 0;
        assert!(UdpSink::from_config(&config).is_none(), "no port");

        config.udp_port = 7888;
        config.udp_host = "  ".to_string();
        assert!(UdpSink::from_config(&config).is_none(), "no host");
    }

    #[test]
    fn test_mqtt_status_display() {
        assert_eq!(MqttStatus::Connected.to_string(), "Connected");
        assert_eq!(
            MqttStatus::Error("connection refused".to_string()).to_string(),
            "Error: connection refused"
        );
    }

    #[tokio::test]
    async fn test_udp_sink_sends_report_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let snapshot = sample();
        let state = CanonicalState::build(&snapshot);
        let sink = UdpSink::new("127.0.0.1".to_string(), port);
        sink.send(&snapshot, &state).unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        let text = std::str::from_utf8(&buf[..len]).unwrap();
        assert_eq!(text, UdpReport::from_state(&snapshot, &state).payload());
        assert!(text.starts_with("Hyundai_BatSoc: 55\nHyundai_Range: 210\n"));
    }

    #[tokio::test]
    async fn test_hub_without_targets_has_no_sinks() {
        let hub = SinkHub::new();
        assert_eq!(hub.mqtt_status().await, MqttStatus::NotConfigured);

        hub.reconfigure(&AppConfig::default()).await;
        assert!(hub.active_sinks().await.is_empty());
        assert_eq!(hub.mqtt_status().await, MqttStatus::Disabled);

        // Nothing to deliver to; must not panic
        let snapshot = sample();
        let state = CanonicalState::build(&snapshot);
        hub.dispatch(snapshot, state);
    }

    #[tokio::test]
    async fn test_hub_dispatches_to_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let hub = SinkHub::new();
        hub.reconfigure(&AppConfig {
            udp_host: "127.0.0.1".to_string(),
            udp_port: port,
            enable_udp: true,
            ..AppConfig::default()
        })
        .await;
        assert_eq!(hub.active_sinks().await, vec!["udp"]);

        let snapshot = sample();
        let state = CanonicalState::build(&snapshot);
        hub.dispatch(snapshot, state);

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        assert!(std::str::from_utf8(&buf[..len]).unwrap().contains("Hyundai_Charging: 0"));
    }

    #[tokio::test]
    async fn test_mqtt_sink_skips_publish_while_disconnected() {
        let config = AppConfig {
            // Nothing listens on port 1 of localhost
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1,
            mqtt_topic: "Garage/IONIQ".to_string(),
            ..AppConfig::default()
        };
        let status = Arc::new(RwLock::new(MqttStatus::Connecting));
        let sink = MqttSink::connect(&config, status.clone());

        assert_eq!(sink.base_topic(), "garage/ioniq");
        assert!(!sink.is_connected());

        let snapshot = sample();
        let state = CanonicalState::build(&snapshot);
        assert!(sink.send(&snapshot, &state).is_ok());

        let refused = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if matches!(*status.read().await, MqttStatus::Error(_)) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(refused.is_ok(), "connect failure is reported as an error status");
        assert!(!sink.is_connected());
    }

    /// One MQTT 3.1.1 control packet: fixed header byte and body
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    struct Published {
        topic: String,
        payload: String,
        retain: bool,
    }

    /// Read until the next PUBLISH, acknowledging QoS 1 deliveries
    async fn next_publish(stream: &mut TcpStream) -> Published {
        loop {
            let (header, body) = read_packet(stream).await;
            if header >> 4 != 3 {
                continue;
            }
            let qos = (header >> 1) & 0x03;
            let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
            let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
            let mut offset = 2 + topic_len;
            if qos > 0 {
                let puback = [0x40, 0x02, body[offset], body[offset + 1]];
                stream.write_all(&puback).await.unwrap();
                offset += 2;
            }
            return Published {
                topic,
                payload: String::from_utf8(body[offset..].to_vec()).unwrap(),
                retain: header & 0x01 == 1,
            };
        }
    }

    #[tokio::test]
    async fn test_mqtt_sink_announces_online_and_publishes_snapshot() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = AppConfig {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: listener.local_addr().unwrap().port(),
            mqtt_topic: "Garage".to_string(),
            ..AppConfig::default()
        };
        let status = Arc::new(RwLock::new(MqttStatus::Connecting));
        let sink = MqttSink::connect(&config, status.clone());

        let exchange = async {
            let (mut stream, _) = listener.accept().await.unwrap();

            let (header, connect) = read_packet(&mut stream).await;
            assert_eq!(header >> 4, 1, "first packet is CONNECT");
            let connect = String::from_utf8_lossy(&connect).into_owned();
            assert!(connect.contains("hyundai_bridge_"));
            assert!(connect.contains("garage/bridge/status"), "last will topic");
            assert!(connect.contains("offline"), "last will payload");

            assert!(!sink.is_connected());
            stream.write_all(&CONNACK_ACCEPTED).await.unwrap();

            let online = next_publish(&mut stream).await;
            assert_eq!(online.topic, "garage/bridge/status");
            assert_eq!(online.payload, "online");
            assert!(online.retain);
            assert!(sink.is_connected());
            assert_eq!(*status.read().await, MqttStatus::Connected);

            let snapshot = sample();
            let state = CanonicalState::build(&snapshot);
            sink.send(&snapshot, &state).unwrap();

            let wanted = [
                "garage/json",
                "garage/lastupdate",
                "garage/green/batterymanagement/batteryremain/ratio",
                "garage/drivetrain/fuelsystem/dte/total",
            ];
            let mut received = HashMap::new();
            while !wanted.iter().all(|t| received.contains_key(*t)) {
                let message = next_publish(&mut stream).await;
                assert!(message.retain, "{} should be retained", message.topic);
                received.insert(message.topic, message.payload);
            }
            received
        };

        let received = tokio::time::timeout(Duration::from_secs(5), exchange)
            .await
            .expect("broker exchange should finish");

        let json: serde_json::Value = serde_json::from_str(&received["garage/json"]).unwrap();
        assert_eq!(&json, sample().raw());
        assert!(received["garage/lastupdate"].ends_with('Z'));
        assert_eq!(received["garage/green/batterymanagement/batteryremain/ratio"], "55");
        assert_eq!(received["garage/drivetrain/fuelsystem/dte/total"], "210");
    }
}
