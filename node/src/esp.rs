use std::net::Ipv4Addr;

use anyhow::{anyhow, Context};
use drybox_common::{Fault, LinkStatus, NetworkConfig, RuntimeConfig, Secrets};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    i2c::{I2cConfig, I2cDriver},
    prelude::*,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    log::EspLogger,
    mqtt::client::{
        EspAsyncMqttClient, EspAsyncMqttConnection, EventPayload, LwtConfiguration,
        MqttClientConfiguration, QoS,
    },
    nvs::EspDefaultNvsPartition,
    sys::{self, esp},
    wifi::EspWifi,
};
use log::{info, warn};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::{
    app::{run_node, NodeParts},
    bringup::NetworkLink,
    telemetry::{bounded_close, Broker, BrokerSession, Message, SessionOptions},
};

const I2C_BAUDRATE_KHZ: u32 = 100;

pub fn run() -> anyhow::Result<()> {
    sys::link_patches();
    EspLogger::initialize_default();

    // tokio's reactor needs eventfd
    let eventfd = sys::esp_vfs_eventfd_config_t {
        max_fds: 2,
        ..Default::default()
    };
    esp!(unsafe { sys::esp_vfs_eventfd_register(&eventfd) })?;

    let config = build_config();
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
    let display_bus = I2cDriver::new(peripherals.i2c0, pins.gpio21, pins.gpio22, &i2c_config)
        .context("failed to open display I2C bus")?;
    let sensor_bus = I2cDriver::new(peripherals.i2c1, pins.gpio25, pins.gpio26, &i2c_config)
        .context("failed to open sensor I2C bus")?;

    let wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs_partition))
        .context("failed to create wifi driver")?;

    let parts = NodeParts {
        sensor_bus,
        display_bus,
        link: EspLink { wifi },
        broker: EspBroker::new(&config.network),
        hardware_id: factory_mac()?.to_vec(),
    };

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run_node(config, parts, std::future::pending()))
}

fn build_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    if let (Some(ssid), Some(password), Some(mqtt_broker)) = (
        option_env!("WIFI_SSID"),
        option_env!("WIFI_PASS"),
        option_env!("MQTT_HOST"),
    ) {
        Secrets {
            ssid: ssid.into(),
            password: password.into(),
            mqtt_broker: mqtt_broker.into(),
            mqtt_port: option_env!("MQTT_PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or(config.network.mqtt_port),
            mqtt_user: option_env!("MQTT_USER").unwrap_or_default().into(),
            mqtt_pass: option_env!("MQTT_PASS").unwrap_or_default().into(),
        }
        .apply(&mut config.network);
    } else {
        warn!("no build-time credentials; association will fail");
    }

    config.sanitize();
    config
}

fn factory_mac() -> anyhow::Result<[u8; 6]> {
    let mut mac = [0_u8; 6];
    esp!(unsafe { sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) })
        .context("failed to read factory MAC")?;
    Ok(mac)
}

struct EspLink {
    wifi: EspWifi<'static>,
}

impl NetworkLink for EspLink {
    fn activate(&mut self) -> anyhow::Result<()> {
        // station mode needs a configuration before start
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;
        Ok(())
    }

    fn disable_power_save(&mut self) -> anyhow::Result<()> {
        esp!(unsafe { sys::esp_wifi_set_ps(sys::wifi_ps_type_t_WIFI_PS_NONE) })?;
        info!("wifi power save disabled");
        Ok(())
    }

    fn begin_association(&mut self, ssid: &str, pass: &str) -> anyhow::Result<()> {
        let auth_method = if pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
                password: pass
                    .try_into()
                    .map_err(|_| anyhow!("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))?;
        self.wifi.connect()?;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match self.wifi.is_connected() {
            Ok(true) => {}
            Ok(false) => return LinkStatus::Connecting,
            Err(err) => {
                warn!("wifi status query failed: {err:?}");
                return LinkStatus::Down;
            }
        }

        match self.wifi.sta_netif().get_ip_info() {
            Ok(info) if info.ip != Ipv4Addr::UNSPECIFIED => LinkStatus::Associated(info.ip),
            _ => LinkStatus::Connecting,
        }
    }
}

struct EspBroker {
    url: String,
    user: String,
    pass: String,
    tls: bool,
}

impl EspBroker {
    fn new(network: &NetworkConfig) -> Self {
        let scheme = if network.mqtt_tls { "mqtts" } else { "mqtt" };
        Self {
            url: format!("{scheme}://{}:{}", network.mqtt_host, network.mqtt_port),
            user: network.mqtt_user.clone(),
            pass: network.mqtt_pass.clone(),
            tls: network.mqtt_tls,
        }
    }
}

impl Broker for EspBroker {
    type Session = EspSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<EspSession, Fault> {
        let will = &options.last_will;
        let conf = MqttClientConfiguration {
            client_id: Some(&options.client_id),
            keep_alive_interval: Some(options.keep_alive),
            username: (!self.user.is_empty()).then_some(self.user.as_str()),
            password: (!self.pass.is_empty()).then_some(self.pass.as_str()),
            lwt: Some(LwtConfiguration {
                topic: will.topic,
                payload: will.payload.as_bytes(),
                qos: QoS::AtMostOnce,
                retain: will.retain,
            }),
            crt_bundle_attach: if self.tls {
                Some(sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };

        let (client, connection) = EspAsyncMqttClient::new(&self.url, &conf)
            .map_err(|err| Fault::broker(format!("{err:?}")))?;

        let (connected_tx, connected_rx) = oneshot::channel();
        let events = tokio::spawn(drain_events(connection, connected_tx));

        match connected_rx.await {
            Ok(()) => Ok(EspSession {
                client: Some(client),
                events,
            }),
            Err(_) => {
                events.abort();
                Err(Fault::broker("connection closed before CONNACK"))
            }
        }
    }
}

// Returns whether the connection ended with a disconnect event.
async fn drain_events(
    mut connection: EspAsyncMqttConnection,
    connected: oneshot::Sender<()>,
) -> bool {
    let mut connected = Some(connected);
    while let Ok(event) = connection.next().await {
        match event.payload() {
            EventPayload::Connected(_) => {
                if let Some(tx) = connected.take() {
                    let _ = tx.send(());
                }
            }
            EventPayload::Disconnected => return true,
            EventPayload::Error(err) => warn!("mqtt event error: {err:?}"),
            _ => {}
        }
    }
    false
}

struct EspSession {
    client: Option<EspAsyncMqttClient>,
    events: JoinHandle<bool>,
}

impl BrokerSession for EspSession {
    async fn publish(&mut self, message: &Message) -> Result<(), Fault> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| Fault::broker("session already closed"))?;
        client
            .publish(
                message.topic,
                QoS::AtMostOnce,
                message.retain,
                message.payload.as_bytes(),
            )
            .await
            .map(|_| ())
            .map_err(|err| Fault::broker(format!("{err:?}")))
    }

    async fn disconnect(mut self) -> Result<(), Fault> {
        // destroying the client sends DISCONNECT and closes the socket;
        // the drain task sees the close, or the wait gives up after the grace
        let events = &mut self.events;
        drop(self.client.take());
        bounded_close(async move {
            match events.await {
                Ok(true) => Ok(()),
                _ => Err(Fault::broker("connection ended without disconnect event")),
            }
        })
        .await
    }
}

impl Drop for EspSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}
