use std::path::PathBuf;

use crate::config::store::ConfigStore;

/// Raw logging options read from the `logging` section of the config file.
///
/// Values are kept as written; interpretation (and rejection of unknown
/// formatters or handlers) happens when the logger is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Severity name (trace, debug, info, warn, error, fatal, panic)
    pub level: String,

    /// Record shape: "text" or "json"
    pub formatter: String,

    /// Output target: "file" or "console"
    pub handler: String,

    /// Directory holding entry.log when the handler is "file"
    pub path: PathBuf,
}

impl LoggingSettings {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            level: store.get_string("logging.level"),
            formatter: store.get_string("logging.formatter"),
            handler: store.get_string("logging.handler"),
            path: PathBuf::from(store.get_string("logging.path")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_logging_section() {
        let store = ConfigStore::from_yaml_str(
            "logging:\n  level: debug\n  formatter: json\n  handler: file\n  path: /tmp/logs\n",
        )
        .unwrap();

        let settings = LoggingSettings::from_store(&store);
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.formatter, "json");
        assert_eq!(settings.handler, "file");
        assert_eq!(settings.path, PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn test_missing_keys_are_empty() {
        let store = ConfigStore::from_yaml_str("other:\n  key: value\n").unwrap();

        assert_eq!(LoggingSettings::from_store(&store), LoggingSettings::default());
    }
}
