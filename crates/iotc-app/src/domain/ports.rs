mod configuration;
mod messaging;

pub use configuration::{ConfigKey, ConfigStore, read_config_string, read_device_id};
pub use messaging::{MessagePublisher, PublishError};
