use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sht40::{CrcPolicy, MIN_SETTLE_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sample_period_ms: u64,
    pub publish_period_ms: u64,
    pub publish_startup_delay_ms: u64,
    pub bringup_attempts: u32,
    pub bringup_poll_interval_ms: u64,
    pub sensor_settle_ms: u32,
    pub broker_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 3_000,
            publish_period_ms: 30_000,
            publish_startup_delay_ms: 10_000,
            bringup_attempts: 30,
            bringup_poll_interval_ms: 1_000,
            sensor_settle_ms: 20,
            broker_timeout_ms: 10_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl TimingConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }

    pub fn publish_startup_delay(&self) -> Duration {
        Duration::from_millis(self.publish_startup_delay_ms)
    }

    pub fn bringup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.bringup_poll_interval_ms)
    }

    pub fn sensor_settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.sensor_settle_ms))
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sanitize(&mut self) {
        self.sample_period_ms = self.sample_period_ms.max(100);
        self.publish_period_ms = self.publish_period_ms.max(1_000);
        self.bringup_attempts = self.bringup_attempts.max(1);
        self.bringup_poll_interval_ms = self.bringup_poll_interval_ms.max(10);
        self.sensor_settle_ms = self.sensor_settle_ms.max(MIN_SETTLE_MS);
        self.broker_timeout_ms = self.broker_timeout_ms.max(100);
        self.request_timeout_ms = self.request_timeout_ms.max(100);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_tls: bool,
    pub mqtt_keep_alive_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 8883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_tls: true,
            mqtt_keep_alive_secs: 60,
        }
    }
}

impl NetworkConfig {
    pub fn sanitize(&mut self) {
        self.mqtt_keep_alive_secs = self.mqtt_keep_alive_secs.max(5);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub sensor_address: u8,
    pub display_address: u8,
    pub display_width: u32,
    pub display_height: u32,
    pub verify_sensor_crc: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sensor_address: crate::sht40::DEFAULT_ADDRESS,
            display_address: crate::sh1106::DEFAULT_ADDRESS,
            display_width: 128,
            display_height: 64,
            verify_sensor_crc: true,
        }
    }
}

impl HardwareConfig {
    pub fn crc_policy(&self) -> CrcPolicy {
        if self.verify_sensor_crc {
            CrcPolicy::Verify
        } else {
            CrcPolicy::Ignore
        }
    }

    pub fn sanitize(&mut self) {
        // Page addressing needs whole 8-row pages.
        self.display_height = (self.display_height / 8).max(1) * 8;
        self.display_width = self.display_width.clamp(8, 132);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub http_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { http_port: 80 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub timing: TimingConfig,
    pub network: NetworkConfig,
    pub hardware: HardwareConfig,
    pub web: WebConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.timing.sanitize();
        self.network.sanitize();
        self.hardware.sanitize();
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub ssid: String,
    pub password: String,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    #[serde(default)]
    pub mqtt_user: String,
    #[serde(default)]
    pub mqtt_pass: String,
}

impl Secrets {
    pub fn apply(self, network: &mut NetworkConfig) {
        network.wifi_ssid = self.ssid;
        network.wifi_pass = self.password;
        network.mqtt_host = self.mqtt_broker;
        network.mqtt_port = self.mqtt_port;
        network.mqtt_user = self.mqtt_user;
        network.mqtt_pass = self.mqtt_pass;
    }
}
