use thiserror::Error;

use crate::{sh1106::DisplayError, sht40::SensorError};

#[derive(Debug, Error)]
pub enum Fault {
    #[error("sensor fault: {0}")]
    Sensor(String),
    #[error("display fault: {0}")]
    Display(String),
    #[error("broker fault: {0}")]
    Broker(String),
    #[error("request aborted: {0}")]
    Request(String),
}

impl Fault {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sensor(_) => "SENSOR",
            Self::Display(_) => "DISPLAY",
            Self::Broker(_) => "BROKER",
            Self::Request(_) => "REQUEST",
        }
    }

    pub fn broker(err: impl std::fmt::Display) -> Self {
        Self::Broker(err.to_string())
    }

    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }
}

impl<E: std::fmt::Debug> From<SensorError<E>> for Fault {
    fn from(err: SensorError<E>) -> Self {
        Self::Sensor(err.to_string())
    }
}

impl<E: std::fmt::Debug> From<DisplayError<E>> for Fault {
    fn from(err: DisplayError<E>) -> Self {
        Self::Display(err.to_string())
    }
}
