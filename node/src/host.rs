use std::{
    io::ErrorKind,
    net::{IpAddr, UdpSocket},
    path::{Path, PathBuf},
};

use anyhow::Context;
use drybox_common::{LinkStatus, NetworkConfig, RuntimeConfig, Secrets};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    app::{run_node, NodeParts},
    bringup::NetworkLink,
    mqtt::MqttBroker,
    sim::{SimulatedPanel, SimulatedSht40},
};

const MACHINE_ID_PATH: &str = "/etc/machine-id";
const HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = load_config().await;
    info!(
        mqtt = %format_args!("{}:{}", config.network.mqtt_host, config.network.mqtt_port),
        http_port = config.web.http_port,
        "configuration loaded"
    );

    let parts = NodeParts {
        sensor_bus: SimulatedSht40::drifting(),
        display_bus: SimulatedPanel::new(),
        link: HostLink::with_broker(&config.network),
        broker: MqttBroker::new(&config.network),
        hardware_id: hardware_id().await,
    };

    run_node(config, parts, interrupted()).await
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for interrupt: {err}");
        std::future::pending::<()>().await;
    }
}

async fn load_config() -> RuntimeConfig {
    let config_path = env_path("DRYBOX_CONFIG", "drybox.json");
    let mut config = read_json::<RuntimeConfig>(&config_path)
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load {}: {err:#}", config_path.display());
            None
        })
        .unwrap_or_default();

    let secrets_path = env_path("DRYBOX_SECRETS", "secrets.json");
    match read_json::<Secrets>(&secrets_path).await {
        Ok(Some(secrets)) => secrets.apply(&mut config.network),
        Ok(None) => debug!("no secrets file at {}", secrets_path.display()),
        Err(err) => warn!("failed to load {}: {err:#}", secrets_path.display()),
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();
    config
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(serde_json::from_slice(&raw).context("invalid JSON")?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn apply_env_overrides(config: &mut RuntimeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let network = &mut config.network;
    let text_fields: [(&str, &mut String); 5] = [
        ("WIFI_SSID", &mut network.wifi_ssid),
        ("WIFI_PASS", &mut network.wifi_pass),
        ("MQTT_HOST", &mut network.mqtt_host),
        ("MQTT_USER", &mut network.mqtt_user),
        ("MQTT_PASS", &mut network.mqtt_pass),
    ];
    for (key, field) in text_fields {
        if let Some(value) = lookup(key) {
            *field = value;
        }
    }

    if let Some(port) = parsed(&lookup, "MQTT_PORT") {
        network.mqtt_port = port;
    }
    if let Some(tls) = parsed(&lookup, "MQTT_TLS") {
        network.mqtt_tls = tls;
    }
    if let Some(port) = parsed(&lookup, "DRYBOX_HTTP_PORT") {
        config.web.http_port = port;
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}

async fn hardware_id() -> Vec<u8> {
    if let Ok(raw) = tokio::fs::read_to_string(MACHINE_ID_PATH).await {
        if let Some(bytes) = decode_hex(raw.trim()) {
            return bytes;
        }
    }
    match tokio::fs::read_to_string(HOSTNAME_PATH).await {
        Ok(name) if !name.trim().is_empty() => name.trim().as_bytes().to_vec(),
        _ => b"drybox".to_vec(),
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() || text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(text.get(at..at + 2)?, 16).ok())
        .collect()
}

#[derive(Default)]
struct HostLink {
    target: Option<(String, u16)>,
}

impl HostLink {
    fn with_broker(network: &NetworkConfig) -> Self {
        Self {
            target: Some((network.mqtt_host.clone(), network.mqtt_port)),
        }
    }
}

impl NetworkLink for HostLink {
    fn activate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn disable_power_save(&mut self) -> anyhow::Result<()> {
        debug!("power save is not managed on the host");
        Ok(())
    }

    fn begin_association(&mut self, ssid: &str, _pass: &str) -> anyhow::Result<()> {
        if !ssid.is_empty() {
            debug!("ssid `{ssid}` is ignored on the host");
        }
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        let Some((host, port)) = &self.target else {
            return LinkStatus::Down;
        };

        let local = UdpSocket::bind("0.0.0.0:0")
            .and_then(|socket| {
                socket.connect((host.as_str(), *port))?;
                socket.local_addr()
            })
            .map(|addr| addr.ip());

        match local {
            Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => LinkStatus::Associated(ip),
            Ok(_) => LinkStatus::Connecting,
            Err(err) => {
                debug!("no route to {host}:{port}: {err}");
                LinkStatus::Connecting
            }
        }
    }
}
