//! Configuration module for dbroute
//!
//! Settings can be loaded from three sources that share one shape:
//!
//! - environment variables (`DB_ROUTER_DB_COUNT`, `DB_ROUTER_LIST`, `DB_ROUTER_DB01_URL`, ...)
//! - a flat property map using the dotted layout
//!   (`db-router.jdbc.datasource.dbCount`, `db-router.jdbc.datasource.db01.url`, ...)
//! - a JSON document matching [`RouterSettings`]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of every key in the dotted property layout
pub const PROPERTY_PREFIX: &str = "db-router.jdbc.datasource.";

/// Prefix of every environment variable
pub const ENV_PREFIX: &str = "DB_ROUTER_";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("Missing setting: {0}")]
    Missing(String),

    /// A setting is present but cannot be parsed
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// Settings were parsed but are not usable together
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// JSON settings document could not be decoded
    #[error("Malformed settings document: {0}")]
    Malformed(String),
}

/// Connection parameters of one physical database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Connection URL
    pub url: String,

    /// Login user
    pub username: String,

    /// Login password
    #[serde(default)]
    pub password: String,
}

impl DataSourceDescriptor {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

// Passwords never reach the logs
impl fmt::Debug for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceDescriptor")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Router settings as supplied by the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSettings {
    /// Number of physical databases
    pub db_count: u32,

    /// Number of physical tables per database
    pub tb_count: u32,

    /// Default routing-key attribute name
    #[serde(default)]
    pub router_key: Option<String>,

    /// Named physical data sources (e.g. `db01`, `db02`)
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceDescriptor>,

    /// Data source used when no shard has been selected
    pub default_data_source: DataSourceDescriptor,
}

/// Key naming scheme of a flat settings source
#[derive(Debug, Clone, Copy)]
enum KeyLayout {
    Properties,
    Env,
}

impl KeyLayout {
    fn key(self, parts: &[&str]) -> String {
        match self {
            KeyLayout::Properties => format!("{}{}", PROPERTY_PREFIX, parts.join(".")),
            KeyLayout::Env => {
                let mut key = String::from(ENV_PREFIX);
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        key.push('_');
                    }
                    key.push_str(&screaming_snake(part));
                }
                key
            }
        }
    }
}

/// `dbCount` -> `DB_COUNT`, `db-01` -> `DB_01`
fn screaming_snake(part: &str) -> String {
    let mut out = String::with_capacity(part.len() + 4);
    let mut prev_lower = false;
    for c in part.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        match c {
            '-' | '.' => out.push('_'),
            c => out.push(c.to_ascii_uppercase()),
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    }
    out
}

impl RouterSettings {
    /// Load settings from `DB_ROUTER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(KeyLayout::Env, |key| std::env::var(key).ok())
    }

    /// Load settings from a flat property map using the dotted layout
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load_with(KeyLayout::Properties, |key| props.get(key).cloned())
    }

    /// Load settings from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn load_with<F>(layout: KeyLayout, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |parts: &[&str]| -> Result<String, ConfigError> {
            let key = layout.key(parts);
            lookup(&key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let count = |field: &str| -> Result<u32, ConfigError> {
            let value = required(&[field])?;
            value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: layout.key(&[field]),
                value,
            })
        };

        let descriptor = |name: &str| -> Result<DataSourceDescriptor, ConfigError> {
            Ok(DataSourceDescriptor {
                url: required(&[name, "url"])?,
                username: required(&[name, "username"])?,
                // An empty password is legitimate for local databases
                password: lookup(&layout.key(&[name, "password"])).unwrap_or_default(),
            })
        };

        let db_count = count("dbCount")?;
        let tb_count = count("tbCount")?;
        let router_key = lookup(&layout.key(&["routerKey"]))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let mut data_sources = BTreeMap::new();
        for name in required(&["list"])?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            data_sources.insert(name.to_string(), descriptor(name)?);
        }

        let default_name = required(&["default"])?;
        let default_data_source = descriptor(&default_name)?;

        let settings = Self {
            db_count,
            tb_count,
            router_key,
            data_sources,
            default_data_source,
        };
        settings.validate()?;

        debug!(
            db_count = settings.db_count,
            tb_count = settings.tb_count,
            data_sources = settings.data_sources.len(),
            default = %default_name,
            "Loaded router settings"
        );

        Ok(settings)
    }

    /// Check that the settings can drive a router
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_count == 0 {
            return Err(ConfigError::Invalid("dbCount must be at least 1".to_string()));
        }
        if self.tb_count == 0 {
            return Err(ConfigError::Invalid("tbCount must be at least 1".to_string()));
        }
        if self.data_sources.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one data source must be listed".to_string(),
            ));
        }
        if self.db_count.checked_mul(self.tb_count).is_none() {
            return Err(ConfigError::Invalid(format!(
                "dbCount * tbCount overflows ({} * {})",
                self.db_count, self.tb_count
            )));
        }

        let missing = self.missing_shards();
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Some database shards have no data source; routed calls to them will fail"
            );
        }

        Ok(())
    }

    /// Shard data source names (`db01`..`dbNN`) that are not configured
    pub fn missing_shards(&self) -> Vec<String> {
        (1..=self.db_count)
            .map(|idx| format!("db{:02}", idx))
            .filter(|name| !self.data_sources.contains_key(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_properties() -> HashMap<String, String> {
        let mut props = HashMap::new();
        let mut put = |k: &str, v: &str| {
            props.insert(format!("{}{}", PROPERTY_PREFIX, k), v.to_string());
        };
        put("dbCount", "2");
        put("tbCount", "4");
        put("routerKey", "uId");
        put("list", "db01, db02");
        put("default", "db00");
        for name in ["db00", "db01", "db02"] {
            put(&format!("{}.url", name), &format!("jdbc:mysql://127.0.0.1:3306/{}", name));
            put(&format!("{}.username", name), "root");
            put(&format!("{}.password", name), "secret");
        }
        props
    }

    #[test]
    fn test_from_properties() {
        let settings = RouterSettings::from_properties(&sample_properties()).unwrap();
        assert_eq!(settings.db_count, 2);
        assert_eq!(settings.tb_count, 4);
        assert_eq!(settings.router_key.as_deref(), Some("uId"));
        assert_eq!(settings.data_sources.len(), 2);
        assert_eq!(
            settings.default_data_source.url,
            "jdbc:mysql://127.0.0.1:3306/db00"
        );
        assert!(settings.missing_shards().is_empty());
    }

    #[test]
    fn test_missing_count_is_reported_by_key() {
        let mut props = sample_properties();
        props.remove(&format!("{}tbCount", PROPERTY_PREFIX));

        let err = RouterSettings::from_properties(&props).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing("db-router.jdbc.datasource.tbCount".to_string())
        );
    }

    #[test]
    fn test_invalid_count() {
        let mut props = sample_properties();
        props.insert(format!("{}dbCount", PROPERTY_PREFIX), "two".to_string());

        let err = RouterSettings::from_properties(&props).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_counts_rejected() {
        let mut props = sample_properties();
        props.insert(format!("{}dbCount", PROPERTY_PREFIX), "0".to_string());

        let err = RouterSettings::from_properties(&props).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_blank_router_key_is_none() {
        let mut props = sample_properties();
        props.insert(format!("{}routerKey", PROPERTY_PREFIX), "  ".to_string());

        let settings = RouterSettings::from_properties(&props).unwrap();
        assert!(settings.router_key.is_none());
    }

    #[test]
    fn test_env_key_layout() {
        assert_eq!(KeyLayout::Env.key(&["dbCount"]), "DB_ROUTER_DB_COUNT");
        assert_eq!(KeyLayout::Env.key(&["db01", "url"]), "DB_ROUTER_DB01_URL");
        assert_eq!(KeyLayout::Env.key(&["routerKey"]), "DB_ROUTER_ROUTER_KEY");
        assert_eq!(
            KeyLayout::Properties.key(&["db01", "username"]),
            "db-router.jdbc.datasource.db01.username"
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "dbCount": 2,
            "tbCount": 4,
            "routerKey": "userId",
            "dataSources": {
                "db01": { "url": "mysql://a/db01", "username": "root", "password": "pw" },
                "db02": { "url": "mysql://a/db02", "username": "root" }
            },
            "defaultDataSource": { "url": "mysql://a/db00", "username": "root" }
        }"#;

        let settings = RouterSettings::from_json_str(json).unwrap();
        assert_eq!(settings.router_key.as_deref(), Some("userId"));
        assert_eq!(settings.data_sources["db02"].password, "");
    }

    #[test]
    fn test_malformed_json() {
        let err = RouterSettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_missing_shards() {
        let mut settings = RouterSettings::from_properties(&sample_properties()).unwrap();
        settings.db_count = 3;
        assert_eq!(settings.missing_shards(), vec!["db03".to_string()]);
    }

    #[test]
    fn test_debug_redacts_password() {
        let descriptor = DataSourceDescriptor::new("mysql://x", "root", "hunter2");
        let printed = format!("{:?}", descriptor);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("***"));
    }
}
