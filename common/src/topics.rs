pub const TOPIC_STATUS: &str = "drybox/status";
pub const TOPIC_TEMPERATURE: &str = "drybox/teplota";
pub const TOPIC_HUMIDITY: &str = "drybox/vlhkost";
pub const TOPIC_DEW_POINT: &str = "drybox/rosny_bod";

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";
