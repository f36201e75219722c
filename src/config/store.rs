use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config type \"{0}\"")]
    UnsupportedType(String),
}

/// Supported on-disk encodings, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "yml" | "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedType(ext)),
        }
    }
}

/// Read-only key-value view of a configuration file.
///
/// Nested sections are flattened into dotted keys, so
///
/// ```yaml
/// logging:
///   level: debug
/// ```
///
/// is addressed as `logging.level`. Keys are case-insensitive and every
/// scalar is kept in its string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    values: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Load a configuration file, picking the parser from its extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = Format::from_path(path)?;

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = match format {
            Format::Yaml => Self::from_yaml_str(&content),
            Format::Json => Self::from_json_str(&content),
        };

        // Re-attach the file path to parse failures from the in-memory parsers
        parsed.map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        let mut store = Self::default();
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(map) => {
                for (k, v) in map {
                    store.insert_yaml(yaml_key(&k), v);
                }
            }
            _ => return Err(parse_error("top-level value must be a mapping".to_string())),
        }
        Ok(store)
    }

    /// Parse a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        let mut store = Self::default();
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    store.insert_json(k, v);
                }
            }
            _ => return Err(parse_error("top-level value must be an object".to_string())),
        }
        Ok(store)
    }

    fn insert_yaml(&mut self, key: String, value: serde_yaml::Value) {
        use serde_yaml::Value;

        match value {
            Value::Null => self.set(key, String::new()),
            Value::Bool(b) => self.set(key, b.to_string()),
            Value::Number(n) => self.set(key, n.to_string()),
            Value::String(s) => self.set(key, s),
            Value::Mapping(map) => {
                for (k, v) in map {
                    self.insert_yaml(format!("{}.{}", key, yaml_key(&k)), v);
                }
            }
            Value::Tagged(tagged) => self.insert_yaml(key, tagged.value),
            Value::Sequence(_) => {}
        }
    }

    fn insert_json(&mut self, key: String, value: serde_json::Value) {
        use serde_json::Value;

        match value {
            Value::Null => self.set(key, String::new()),
            Value::Bool(b) => self.set(key, b.to_string()),
            Value::Number(n) => self.set(key, n.to_string()),
            Value::String(s) => self.set(key, s),
            Value::Object(map) => {
                for (k, v) in map {
                    self.insert_json(format!("{}.{}", key, k), v);
                }
            }
            Value::Array(_) => {}
        }
    }

    fn set(&mut self, key: String, value: String) {
        self.values.insert(key.to_lowercase(), value);
    }

    /// Look up a key, returning `None` when it is absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Look up a key, returning an empty string when it is absent.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }
}

#[cfg(test)]
impl ConfigStore {
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_error(message: String) -> ConfigError {
    ConfigError::Parse {
        path: PathBuf::new(),
        message,
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
