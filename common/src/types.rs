use std::{fmt, net::Ipv4Addr};

use crate::dew_point::dew_point;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub dew_point_c: f32,
}

impl Reading {
    pub fn from_sample(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            dew_point_c: dew_point(temperature_c, humidity_pct),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkAddress {
    #[default]
    Unassigned,
    Assigned(Ipv4Addr),
}

impl NetworkAddress {
    pub fn is_assigned(self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    pub fn ip(self) -> Option<Ipv4Addr> {
        match self {
            Self::Assigned(ip) => Some(ip),
            Self::Unassigned => None,
        }
    }
}

// The sentinel renders as the all-zero address, the same text the display
// and page show before association.
impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned(ip) => write!(f, "{ip}"),
            Self::Unassigned => write!(f, "{}", Ipv4Addr::UNSPECIFIED),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub reading: Reading,
    pub address: NetworkAddress,
}
