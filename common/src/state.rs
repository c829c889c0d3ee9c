use std::{
    net::Ipv4Addr,
    sync::{OnceLock, PoisonError, RwLock},
};

use crate::types::{NetworkAddress, Reading, Snapshot};

// The reading is replaced as a whole record under the lock, so readers never
// observe a temperature from one sample next to a dew point from another.
// The address can be assigned once and is immutable afterwards.
#[derive(Debug, Default)]
pub struct SharedReadingState {
    reading: RwLock<Reading>,
    address: OnceLock<Ipv4Addr>,
}

impl SharedReadingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reading(&self) -> Reading {
        *self.reading.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store_reading(&self, reading: Reading) {
        *self.reading.write().unwrap_or_else(PoisonError::into_inner) = reading;
    }

    pub fn address(&self) -> NetworkAddress {
        match self.address.get() {
            Some(ip) => NetworkAddress::Assigned(*ip),
            None => NetworkAddress::Unassigned,
        }
    }

    pub fn assign_address(&self, ip: Ipv4Addr) -> bool {
        self.address.set(ip).is_ok()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            reading: self.reading(),
            address: self.address(),
        }
    }
}
