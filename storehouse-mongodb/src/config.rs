//! MongoDB connection configuration.
//!
//! Configuration can be assembled three ways:
//!
//! - [`MongoConfig::builder`] in code
//! - [`MongoConfig::from_env`] from `STOREHOUSE_MONGODB_*` variables
//! - [`MongoConfig::from_toml_str`] from a TOML document
//!
//! ```toml
//! name = "catalog"
//! uri = "mongodb://localhost:27017/cinema"
//! max_pool_size = 20
//! connect_timeout_ms = 5000
//! read_preference = "secondaryPreferred"
//!
//! [[models]]
//! name = "Movie"
//!
//! [[models]]
//! name = "Review"
//! collection = "movie_reviews"
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use mongodb::options::{ClientOptions, SelectionCriteria};
use serde::Deserialize;

use crate::error::{MongoError, MongoResult};

/// A model the manager knows about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSettings {
    /// Model name, used for lookup.
    pub name: String,
    /// Collection name. Defaults to the lower-cased model name plus `s`.
    #[serde(default)]
    pub collection: Option<String>,
}

impl ModelSettings {
    /// Register a model under its default collection name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
        }
    }

    /// Use an explicit collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// The collection this model reads from.
    pub fn collection_name(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| format!("{}s", self.name.to_lowercase()))
    }
}

/// MongoDB connection configuration.
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Manager name, used in logs.
    pub name: Option<String>,
    /// MongoDB connection URI.
    pub uri: String,
    /// Database name. Falls back to the URI's default database.
    pub database: Option<String>,
    /// Application name (shown in server logs).
    pub app_name: Option<String>,
    /// Minimum connection pool size.
    pub min_pool_size: Option<u32>,
    /// Maximum connection pool size.
    pub max_pool_size: Option<u32>,
    /// Maximum idle time for connections.
    pub max_idle_time: Option<Duration>,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout.
    pub server_selection_timeout: Option<Duration>,
    /// Read preference.
    pub read_preference: Option<ReadPreference>,
    /// Retry reads.
    pub retry_reads: Option<bool>,
    /// Direct connection (bypass replica set discovery).
    pub direct_connection: Option<bool>,
    /// Registered models.
    pub models: Vec<ModelSettings>,
}

/// MongoDB read preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreference {
    /// Read from primary only.
    #[default]
    Primary,
    /// Read from primary preferred, fallback to secondary.
    PrimaryPreferred,
    /// Read from secondary only.
    Secondary,
    /// Read from secondary preferred, fallback to primary.
    SecondaryPreferred,
    /// Read from nearest member.
    Nearest,
}

impl ReadPreference {
    /// Convert to the driver's selection criteria.
    pub fn to_selection_criteria(self) -> SelectionCriteria {
        use mongodb::options::ReadPreference as Driver;

        SelectionCriteria::ReadPreference(match self {
            ReadPreference::Primary => Driver::Primary,
            ReadPreference::PrimaryPreferred => Driver::PrimaryPreferred {
                options: Default::default(),
            },
            ReadPreference::Secondary => Driver::Secondary {
                options: Default::default(),
            },
            ReadPreference::SecondaryPreferred => Driver::SecondaryPreferred {
                options: Default::default(),
            },
            ReadPreference::Nearest => Driver::Nearest {
                options: Default::default(),
            },
        })
    }
}

impl FromStr for ReadPreference {
    type Err = MongoError;

    /// Accepts the full mode names and their short forms (`p`, `pp`, `s`, `sp`, `n`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" | "p" => Ok(Self::Primary),
            "primaryPreferred" | "pp" => Ok(Self::PrimaryPreferred),
            "secondary" | "s" => Ok(Self::Secondary),
            "secondaryPreferred" | "sp" => Ok(Self::SecondaryPreferred),
            "nearest" | "n" => Ok(Self::Nearest),
            other => Err(MongoError::config(format!(
                "unknown read preference '{}'",
                other
            ))),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            name: None,
            uri: "mongodb://localhost:27017".to_string(),
            database: None,
            app_name: Some("storehouse".to_string()),
            min_pool_size: None,
            max_pool_size: Some(10),
            max_idle_time: Some(Duration::from_secs(300)),
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            read_preference: Some(ReadPreference::Primary),
            retry_reads: Some(true),
            direct_connection: None,
            models: Vec::new(),
        }
    }
}

/// On-disk shape of a configuration file. Durations are in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    name: Option<String>,
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    max_idle_time_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    server_selection_timeout_ms: Option<u64>,
    read_preference: Option<ReadPreference>,
    retry_reads: Option<bool>,
    direct_connection: Option<bool>,
    models: Vec<ModelSettings>,
}

impl MongoConfig {
    /// Create a new configuration from a MongoDB URI.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// - `STOREHOUSE_MONGODB_URI` (required)
    /// - `STOREHOUSE_MONGODB_DATABASE`
    /// - `STOREHOUSE_MONGODB_APP_NAME`
    /// - `STOREHOUSE_MONGODB_MAX_POOL_SIZE`
    pub fn from_env() -> MongoResult<Self> {
        let mut builder = Self::builder();

        if let Ok(uri) = env::var("STOREHOUSE_MONGODB_URI") {
            builder = builder.uri(uri);
        }
        if let Ok(database) = env::var("STOREHOUSE_MONGODB_DATABASE") {
            builder = builder.database(database);
        }
        if let Ok(app_name) = env::var("STOREHOUSE_MONGODB_APP_NAME") {
            builder = builder.app_name(app_name);
        }
        if let Ok(size) = env::var("STOREHOUSE_MONGODB_MAX_POOL_SIZE") {
            let size = size.parse().map_err(|_| {
                MongoError::config(format!("invalid STOREHOUSE_MONGODB_MAX_POOL_SIZE '{}'", size))
            })?;
            builder = builder.max_pool_size(size);
        }

        builder.build()
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(content: &str) -> MongoResult<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| MongoError::config(format!("invalid configuration: {}", e)))?;

        let mut builder = Self::builder();
        if let Some(uri) = file.uri {
            builder = builder.uri(uri);
        }
        builder.name = file.name;
        builder.database = file.database;
        builder.app_name = file.app_name;
        builder.min_pool_size = file.min_pool_size;
        builder.max_pool_size = file.max_pool_size;
        builder.max_idle_time = file.max_idle_time_ms.map(Duration::from_millis);
        builder.connect_timeout = file.connect_timeout_ms.map(Duration::from_millis);
        builder.server_selection_timeout =
            file.server_selection_timeout_ms.map(Duration::from_millis);
        builder.read_preference = file.read_preference;
        builder.retry_reads = file.retry_reads;
        builder.direct_connection = file.direct_connection;
        builder.models = file.models;

        builder.build()
    }

    /// Settings for a registered model.
    pub fn model(&self, name: &str) -> Option<&ModelSettings> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Convert to MongoDB ClientOptions.
    pub async fn to_client_options(&self) -> MongoResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| MongoError::config(format!("failed to parse URI: {}", e)))?;

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }

        if let Some(min_pool) = self.min_pool_size {
            options.min_pool_size = Some(min_pool);
        }

        if let Some(max_pool) = self.max_pool_size {
            options.max_pool_size = Some(max_pool);
        }

        if let Some(max_idle) = self.max_idle_time {
            options.max_idle_time = Some(max_idle);
        }

        if let Some(connect_timeout) = self.connect_timeout {
            options.connect_timeout = Some(connect_timeout);
        }

        if let Some(selection_timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(selection_timeout);
        }

        if let Some(read_pref) = self.read_preference {
            options.selection_criteria = Some(read_pref.to_selection_criteria());
        }

        if let Some(retry_reads) = self.retry_reads {
            options.retry_reads = Some(retry_reads);
        }

        if let Some(direct) = self.direct_connection {
            options.direct_connection = Some(direct);
        }

        Ok(options)
    }
}

/// Builder for MongoDB configuration.
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    name: Option<String>,
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    max_idle_time: Option<Duration>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    read_preference: Option<ReadPreference>,
    retry_reads: Option<bool>,
    direct_connection: Option<bool>,
    models: Vec<ModelSettings>,
}

impl MongoConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the manager name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the MongoDB URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the maximum idle time for connections.
    pub fn max_idle_time(mut self, duration: Duration) -> Self {
        self.max_idle_time = Some(duration);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the server selection timeout.
    pub fn server_selection_timeout(mut self, duration: Duration) -> Self {
        self.server_selection_timeout = Some(duration);
        self
    }

    /// Set the read preference.
    pub fn read_preference(mut self, pref: ReadPreference) -> Self {
        self.read_preference = Some(pref);
        self
    }

    /// Enable or disable retry reads.
    pub fn retry_reads(mut self, enabled: bool) -> Self {
        self.retry_reads = Some(enabled);
        self
    }

    /// Enable direct connection (bypass replica set discovery).
    pub fn direct_connection(mut self, enabled: bool) -> Self {
        self.direct_connection = Some(enabled);
        self
    }

    /// Register a model.
    pub fn model(mut self, settings: ModelSettings) -> Self {
        self.models.push(settings);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MongoResult<MongoConfig> {
        let uri = self
            .uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| MongoError::config("missing database uri"))?;

        Ok(MongoConfig {
            name: self.name,
            uri,
            database: self.database,
            app_name: self.app_name.or(Some("storehouse".to_string())),
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size.or(Some(10)),
            max_idle_time: self.max_idle_time.or(Some(Duration::from_secs(300))),
            connect_timeout: self.connect_timeout.or(Some(Duration::from_secs(10))),
            server_selection_timeout: self
                .server_selection_timeout
                .or(Some(Duration::from_secs(30))),
            read_preference: self.read_preference.or(Some(ReadPreference::Primary)),
            retry_reads: self.retry_reads.or(Some(true)),
            direct_connection: self.direct_connection,
            models: self.models,
        })
    }
}
