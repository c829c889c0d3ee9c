use std::{fmt::Write as _, future::Future, sync::Arc, time::Duration};

use drybox_common::{
    Fault, NetworkConfig, Reading, SharedReadingState, TimingConfig, STATUS_OFFLINE,
    STATUS_ONLINE, TOPIC_DEW_POINT, TOPIC_HUMIDITY, TOPIC_STATUS, TOPIC_TEMPERATURE,
};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info};

use crate::faults::log_fault;

const TASK: &str = "telemetry";

pub const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: &'static str,
    pub payload: String,
    pub retain: bool,
}

impl Message {
    pub fn retained(topic: &'static str, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: true,
        }
    }

    pub fn transient(topic: &'static str, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub client_id: String,
    pub last_will: Message,
    pub keep_alive: Duration,
}

impl SessionOptions {
    pub fn new(client_id: String, network: &NetworkConfig) -> Self {
        Self {
            client_id,
            last_will: Message::retained(TOPIC_STATUS, STATUS_OFFLINE),
            keep_alive: Duration::from_secs(network.mqtt_keep_alive_secs),
        }
    }
}

pub trait Broker {
    type Session: BrokerSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<Self::Session, Fault>;
}

pub trait BrokerSession {
    async fn publish(&mut self, message: &Message) -> Result<(), Fault>;

    async fn disconnect(self) -> Result<(), Fault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped,
    Published,
}

pub fn telemetry_messages(reading: &Reading) -> [Message; 4] {
    [
        Message::retained(TOPIC_STATUS, STATUS_ONLINE),
        Message::transient(TOPIC_TEMPERATURE, format!("{:.2}", reading.temperature_c)),
        Message::transient(TOPIC_HUMIDITY, format!("{:.2}", reading.humidity_pct)),
        Message::transient(TOPIC_DEW_POINT, format!("{:.2}", reading.dew_point_c)),
    ]
}

pub fn client_id_from_unique_id(unique_id: &[u8]) -> String {
    unique_id
        .iter()
        .fold(String::with_capacity(unique_id.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

pub struct TelemetryPublishTask<B> {
    broker: B,
    state: Arc<SharedReadingState>,
    options: SessionOptions,
    startup_delay: Duration,
    period: Duration,
    cycle_timeout: Duration,
}

impl<B: Broker> TelemetryPublishTask<B> {
    pub fn new(
        broker: B,
        state: Arc<SharedReadingState>,
        options: SessionOptions,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            broker,
            state,
            options,
            startup_delay: timing.publish_startup_delay(),
            period: timing.publish_period(),
            cycle_timeout: timing.broker_timeout(),
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, Fault> {
        if !self.state.address().is_assigned() {
            return Ok(CycleOutcome::Skipped);
        }

        let reading = self.state.reading();
        let limit = self.cycle_timeout;

        timeout(limit, publish_once(&mut self.broker, &self.options, &reading))
            .await
            .map_err(|_| {
                Fault::Broker(format!("publish cycle exceeded {} ms", limit.as_millis()))
            })??;

        Ok(CycleOutcome::Published)
    }

    pub async fn run(mut self) {
        info!(
            delay_ms = self.startup_delay.as_millis() as u64,
            period_ms = self.period.as_millis() as u64,
            "telemetry task started"
        );
        sleep(self.startup_delay).await;

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(CycleOutcome::Published) => info!("telemetry published"),
                Ok(CycleOutcome::Skipped) => debug!("no network address; publish skipped"),
                Err(fault) => log_fault(TASK, &fault),
            }
        }
    }
}

async fn publish_once<B: Broker>(
    broker: &mut B,
    options: &SessionOptions,
    reading: &Reading,
) -> Result<(), Fault> {
    let mut session = broker.connect(options).await?;
    for message in telemetry_messages(reading) {
        session.publish(&message).await?;
    }
    session.disconnect().await
}

// Waits for a session close to be confirmed. An unconfirmed close is a
// broker fault rather than a silent success; the whole cycle is still
// capped by `broker_timeout_ms`.
pub async fn bounded_close(close: impl Future<Output = Result<(), Fault>>) -> Result<(), Fault> {
    timeout(DISCONNECT_GRACE, close)
        .await
        .map_err(|_| Fault::broker("disconnect not confirmed in time"))?
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    use super::*;
    use crate::testing::{BrokerEvent, FakeBroker};

    fn assigned_state() -> Arc<SharedReadingState> {
        let state = Arc::new(SharedReadingState::new());
        state.assign_address(Ipv4Addr::new(192, 168, 1, 5));
        state.store_reading(Reading {
            temperature_c: 21.456,
            humidity_pct: 40.0,
            dew_point_c: 7.5,
        });
        state
    }

    fn task(
        broker: FakeBroker,
        state: Arc<SharedReadingState>,
    ) -> TelemetryPublishTask<FakeBroker> {
        let options = SessionOptions::new("a1b2".into(), &NetworkConfig::default());
        TelemetryPublishTask::new(broker, state, options, &TimingConfig::default())
    }

    #[test]
    fn client_id_is_lowercase_hex() {
        assert_eq!(client_id_from_unique_id(&[0x24, 0x0a, 0xc4, 0xff]), "240ac4ff");
        assert_eq!(client_id_from_unique_id(&[]), "");
    }

    #[test]
    fn session_options_carry_offline_will() {
        let options = SessionOptions::new("id".into(), &NetworkConfig::default());
        assert_eq!(options.last_will, Message::retained("drybox/status", "offline"));
        assert_eq!(options.keep_alive, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_without_address() {
        let broker = FakeBroker::new();
        let journal = broker.journal();
        let mut task = task(broker, Arc::new(SharedReadingState::new()));

        assert_eq!(task.run_cycle().await.unwrap(), CycleOutcome::Skipped);
        assert!(journal.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unassigned_node_never_opens_a_session() {
        let broker = FakeBroker::new();
        let journal = broker.journal();
        let task = task(broker, Arc::new(SharedReadingState::new()));

        let _ = timeout(Duration::from_secs(600), task.run()).await;

        assert!(journal.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_status_then_readings_then_disconnects() {
        let broker = FakeBroker::new();
        let journal = broker.journal();
        let mut task = task(broker, assigned_state());

        assert_eq!(task.run_cycle().await.unwrap(), CycleOutcome::Published);
        assert_eq!(
            journal.events(),
            vec![
                BrokerEvent::Connect("a1b2".into()),
                BrokerEvent::Publish(Message::retained("drybox/status", "online")),
                BrokerEvent::Publish(Message::transient("drybox/teplota", "21.46")),
                BrokerEvent::Publish(Message::transient("drybox/vlhkost", "40.00")),
                BrokerEvent::Publish(Message::transient("drybox/rosny_bod", "7.50")),
                BrokerEvent::Disconnect,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_is_retried_next_cycle() {
        let broker = FakeBroker::new();
        broker.journal().fail_connects(1);
        let journal = broker.journal();
        let mut task = task(broker, assigned_state());

        let err = task.run_cycle().await.unwrap_err();
        assert_eq!(err.kind(), "BROKER");
        assert_eq!(task.run_cycle().await.unwrap(), CycleOutcome::Published);
        assert_eq!(journal.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_abandons_session_without_disconnect() {
        let broker = FakeBroker::new();
        broker.journal().fail_publish(2);
        let journal = broker.journal();
        let mut task = task(broker, assigned_state());

        let err = task.run_cycle().await.unwrap_err();

        assert!(matches!(err, Fault::Broker(_)));
        let events = journal.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&BrokerEvent::Dropped));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_broker_is_bounded_by_cycle_timeout() {
        let broker = FakeBroker::new();
        broker.journal().stall_connects();
        let mut task = task(broker, assigned_state());
        let started = Instant::now();

        let err = task.run_cycle().await.unwrap_err();

        assert!(matches!(err, Fault::Broker(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_waits_for_startup_delay() {
        let broker = FakeBroker::new();
        let journal = broker.journal();
        let task = task(broker, assigned_state());
        let started = Instant::now();

        let _ = timeout(Duration::from_millis(75_000), task.run()).await;

        let offsets: Vec<u64> = journal
            .connect_times()
            .into_iter()
            .map(|at| (at - started).as_secs())
            .collect();
        assert_eq!(offsets, vec![10, 40, 70]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_close_fails_after_grace() {
        let started = Instant::now();

        let err = bounded_close(std::future::pending()).await.unwrap_err();

        assert!(matches!(err, Fault::Broker(_)));
        assert_eq!(started.elapsed(), DISCONNECT_GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn close_outcome_passes_through() {
        assert!(bounded_close(async { Ok(()) }).await.is_ok());

        let err = bounded_close(async { Err(Fault::broker("dropped")) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "broker fault: dropped");
    }
}
