pub mod bringup;
pub mod config;
pub mod dew_point;
pub mod fault;
pub mod layout;
pub mod page;
pub mod sh1106;
pub mod sht40;
pub mod state;
pub mod topics;
pub mod types;

pub use bringup::{BringupState, LinkStatus};
pub use config::{HardwareConfig, NetworkConfig, RuntimeConfig, Secrets, TimingConfig, WebConfig};
pub use dew_point::dew_point;
pub use fault::Fault;
pub use layout::DisplayRenderer;
pub use state::SharedReadingState;
pub use topics::*;
pub use types::{NetworkAddress, Reading, Snapshot};
