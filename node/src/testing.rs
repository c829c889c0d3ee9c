use std::{
    net::Ipv4Addr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use drybox_common::{Fault, LinkStatus};
use tokio::time::Instant;

use crate::{
    bringup::NetworkLink,
    telemetry::{Broker, BrokerSession, Message, SessionOptions},
};

pub struct ScriptedLink {
    associate_on: Option<u32>,
    ip: Ipv4Addr,
    pub polls: u32,
    pub power_save_disabled: bool,
    pub fail_activate: bool,
}

impl ScriptedLink {
    pub fn never_associates() -> Self {
        Self {
            associate_on: None,
            ip: Ipv4Addr::UNSPECIFIED,
            polls: 0,
            power_save_disabled: false,
            fail_activate: false,
        }
    }

    pub fn associates_after(poll: u32, ip: Ipv4Addr) -> Self {
        Self {
            associate_on: Some(poll),
            ip,
            ..Self::never_associates()
        }
    }
}

impl NetworkLink for ScriptedLink {
    fn activate(&mut self) -> anyhow::Result<()> {
        if self.fail_activate {
            anyhow::bail!("radio unavailable");
        }
        Ok(())
    }

    fn disable_power_save(&mut self) -> anyhow::Result<()> {
        self.power_save_disabled = true;
        Ok(())
    }

    fn begin_association(&mut self, _ssid: &str, _pass: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        self.polls += 1;
        match self.associate_on {
            Some(poll) if self.polls >= poll => LinkStatus::Associated(self.ip),
            _ => LinkStatus::Connecting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connect(String),
    Publish(Message),
    Disconnect,
    Dropped,
}

#[derive(Default)]
struct JournalInner {
    events: Vec<BrokerEvent>,
    connect_times: Vec<Instant>,
    failing_connects: u32,
    stall_connects: bool,
    failing_publish: Option<usize>,
    publishes: usize,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<JournalInner>>);

impl Journal {
    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<BrokerEvent> {
        self.lock().events.clone()
    }

    pub fn connects(&self) -> usize {
        self.lock().connect_times.len()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.lock().connect_times.clone()
    }

    pub fn fail_connects(&self, count: u32) {
        self.lock().failing_connects = count;
    }

    pub fn stall_connects(&self) {
        self.lock().stall_connects = true;
    }

    pub fn fail_publish(&self, nth: usize) {
        self.lock().failing_publish = Some(nth);
    }

    fn record(&self, event: BrokerEvent) {
        self.lock().events.push(event);
    }
}

#[derive(Default)]
pub struct FakeBroker {
    journal: Journal,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl Broker for FakeBroker {
    type Session = FakeSession;

    async fn connect(&mut self, options: &SessionOptions) -> Result<FakeSession, Fault> {
        let stall = self.journal.lock().stall_connects;
        if stall {
            std::future::pending::<()>().await;
        }

        {
            let mut inner = self.journal.lock();
            if inner.failing_connects > 0 {
                inner.failing_connects -= 1;
                return Err(Fault::broker("connection refused"));
            }
            inner.connect_times.push(Instant::now());
        }

        self.journal
            .record(BrokerEvent::Connect(options.client_id.clone()));
        Ok(FakeSession {
            journal: self.journal.clone(),
            closed: false,
        })
    }
}

pub struct FakeSession {
    journal: Journal,
    closed: bool,
}

impl BrokerSession for FakeSession {
    async fn publish(&mut self, message: &Message) -> Result<(), Fault> {
        {
            let mut inner = self.journal.lock();
            inner.publishes += 1;
            if inner.failing_publish == Some(inner.publishes) {
                return Err(Fault::broker("publish rejected"));
            }
        }
        self.journal.record(BrokerEvent::Publish(message.clone()));
        Ok(())
    }

    async fn disconnect(mut self) -> Result<(), Fault> {
        self.closed = true;
        self.journal.record(BrokerEvent::Disconnect);
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if !self.closed {
            self.journal.record(BrokerEvent::Dropped);
        }
    }
}
