//! Configuration environment
//!
//! Property sources are consulted by priority. Constants computed by the
//! application context are published into an overlay that takes precedence
//! over every source, so `${name}` interpolation sees them.

use crate::error::{ContainerError, ContainerResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Upper bound on nested `${...}` substitutions
const MAX_EXPANSION_DEPTH: usize = 16;

/// Typed configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Textual form used for interpolation
    ///
    /// Arrays are joined with `,`; tables have no textual form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(values) => {
                let parts: Option<Vec<String>> = values.iter().map(ConfigValue::to_text).collect();
                parts.map(|parts| parts.join(","))
            }
            ConfigValue::Object(_) => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// A named source of configuration properties
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;

    /// Higher numbers win
    fn priority(&self) -> i32 {
        0
    }
}

/// Environment - prioritized property sources plus computed constants
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
    constants: RwLock<HashMap<String, ConfigValue>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self
            .sources
            .read()
            .iter()
            .map(|source| source.name().to_string())
            .collect();

        f.debug_struct("Environment")
            .field("sources", &sources)
            .field("constants", &self.constants.read().len())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            constants: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        tracing::debug!(
            "Adding property source '{}' with priority {}",
            source.name(),
            source.priority()
        );
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Builder-style variant of [`add_property_source`](Self::add_property_source)
    pub fn with_property_source(self, source: impl PropertySource + 'static) -> Self {
        self.add_property_source(Box::new(source));
        self
    }

    /// Publish a computed constant, shadowing any source
    pub fn publish_constant(&self, name: impl Into<String>, value: ConfigValue) {
        let name = name.into();
        tracing::debug!("Publishing constant '{}' = {:?}", name, value);
        self.constants.write().insert(name, value);
    }

    pub fn clear_constants(&self) {
        self.constants.write().clear();
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.constants.read().get(key) {
            tracing::trace!("Config '{}' found among constants", key);
            return Some(value.clone());
        }

        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }

        tracing::trace!("Config '{}' not found in any source", key);
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.to_text())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Replace every `${name}` in `input` by the value of `name`
    ///
    /// Substituted values are expanded again. Unknown names and unterminated
    /// placeholders are kept verbatim.
    pub fn expand(&self, input: &str) -> String {
        self.expand_with_depth(input, 0)
    }

    fn expand_with_depth(&self, input: &str, depth: usize) -> String {
        if depth >= MAX_EXPANSION_DEPTH {
            tracing::warn!("Expansion of '{}' is nested too deeply, leaving it as is", input);
            return input.to_string();
        }

        let mut result = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let placeholder = &rest[start..];

            let Some(end) = placeholder.find('}') else {
                rest = placeholder;
                break;
            };

            let name = &placeholder[2..end];
            match self.get_string(name) {
                Some(value) => result.push_str(&self.expand_with_depth(&value, depth + 1)),
                None => result.push_str(&placeholder[..=end]),
            }

            rest = &placeholder[end + 1..];
        }

        result.push_str(rest);
        result
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Property Sources ==========

/// Process environment variables under a prefix
///
/// `WEAVE_GATEWAY_PORT` is visible as `gateway.port`.
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    /// `prefix` such as `"WEAVE_"`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn env_to_key(&self, variable: &str) -> String {
        variable
            .strip_prefix(&self.prefix)
            .unwrap_or(variable)
            .to_lowercase()
            .replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace('.', "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key)).ok().map(ConfigValue::from)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter_map(|(variable, _)| {
                variable
                    .starts_with(&self.prefix)
                    .then(|| self.env_to_key(&variable))
            })
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl From<&toml::Value> for ConfigValue {
    fn from(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
            toml::Value::Array(items) => ConfigValue::Array(items.iter().map(ConfigValue::from).collect()),
            toml::Value::Table(table) => ConfigValue::Object(
                table
                    .iter()
                    .map(|(key, item)| (key.clone(), ConfigValue::from(item)))
                    .collect(),
            ),
        }
    }
}

/// Properties read from a TOML file, nested tables flattened into dotted keys
///
/// `[gateway] port = 1` is visible as `gateway.port`.
pub struct TomlPropertySource {
    inner: MapPropertySource,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("failed to read config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Loading properties from {:?}", path);
        Self::parse(&content, path.display().to_string())
    }

    pub fn parse(content: &str, name: impl Into<String>) -> ContainerResult<Self> {
        let root: toml::Table = toml::from_str(content)
            .map_err(|e| ContainerError::Config(format!("failed to parse TOML: {}", e)))?;

        let mut inner = MapPropertySource::new(name).with_priority(0);
        let mut pending: Vec<(String, &toml::Table)> = vec![(String::new(), &root)];

        while let Some((prefix, table)) = pending.pop() {
            for (key, value) in table {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };

                match value {
                    toml::Value::Table(nested) => pending.push((key, nested)),
                    leaf => inner.insert(key, ConfigValue::from(leaf)),
                }
            }
        }

        Ok(Self { inner })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.inner.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.inner.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }
}

/// In-memory properties, mostly for tests and programmatic overrides
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.properties.insert(key.into(), value.into());
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.properties.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
