use drybox_common::{Fault, NetworkConfig};
use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Outgoing, QoS, Transport,
};
use tracing::debug;

use crate::telemetry::{bounded_close, Broker, BrokerSession, Message, SessionOptions};

const REQUEST_CAPACITY: usize = 8;

pub struct MqttBroker {
    host: String,
    port: u16,
    user: String,
    pass: String,
    tls: bool,
}

impl MqttBroker {
    pub fn new(network: &NetworkConfig) -> Self {
        Self {
            host: network.mqtt_host.clone(),
            port: network.mqtt_port,
            user: network.mqtt_user.clone(),
            pass: network.mqtt_pass.clone(),
            tls: network.mqtt_tls,
        }
    }

    fn options(&self, session: &SessionOptions) -> MqttOptions {
        let mut options = MqttOptions::new(&session.client_id, &self.host, self.port);
        options.set_keep_alive(session.keep_alive);
        options.set_clean_session(true);

        let will = &session.last_will;
        options.set_last_will(LastWill::new(
            will.topic,
            will.payload.clone(),
            QoS::AtMostOnce,
            will.retain,
        ));

        if !self.user.is_empty() {
            options.set_credentials(&self.user, &self.pass);
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

impl Broker for MqttBroker {
    type Session = MqttSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<MqttSession, Fault> {
        let (client, mut eventloop) = AsyncClient::new(self.options(options), REQUEST_CAPACITY);

        drive_until(&mut eventloop, |event| {
            matches!(event, Event::Incoming(Incoming::ConnAck(_)))
        })
        .await?;
        debug!("mqtt connected to {}:{}", self.host, self.port);

        Ok(MqttSession { client, eventloop })
    }
}

pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl BrokerSession for MqttSession {
    async fn publish(&mut self, message: &Message) -> Result<(), Fault> {
        self.client
            .publish(
                message.topic,
                QoS::AtMostOnce,
                message.retain,
                message.payload.clone().into_bytes(),
            )
            .await
            .map_err(Fault::broker)?;

        // Wait for the packet to reach the transport before the next one.
        drive_until(&mut self.eventloop, |event| {
            matches!(event, Event::Outgoing(Outgoing::Publish(_)))
        })
        .await
    }

    async fn disconnect(mut self) -> Result<(), Fault> {
        self.client.disconnect().await.map_err(Fault::broker)?;
        bounded_close(drive_until(&mut self.eventloop, |event| {
            matches!(event, Event::Outgoing(Outgoing::Disconnect))
        }))
        .await
    }
}

async fn drive_until(
    eventloop: &mut EventLoop,
    done: impl Fn(&Event) -> bool,
) -> Result<(), Fault> {
    loop {
        let event = eventloop.poll().await.map_err(Fault::broker)?;
        if done(&event) {
            return Ok(());
        }
    }
}
