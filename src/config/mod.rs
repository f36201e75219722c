pub mod settings;
pub mod store;

pub use settings::LoggingSettings;
pub use store::{ConfigError, ConfigStore};
