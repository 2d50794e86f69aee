//! Connection manager and model registry.
//!
//! A [`MongoManager`] owns one configuration, the models registered with it
//! and, once needed, a client. The client is created lazily and recreated on
//! demand after [`close`](MongoManager::close).
//!
//! ```rust,ignore
//! use storehouse_mongodb::prelude::*;
//!
//! let config = MongoConfig::builder()
//!     .uri("mongodb://localhost:27017/cinema")
//!     .model(ModelSettings::new("Movie"))
//!     .build()?;
//! let manager = MongoManager::new(config)?;
//! manager.connect().await?;
//!
//! let mut agg = manager.aggregation("Movie").await?;
//! agg.r#match(doc! { "rated": "PG" })?;
//! let total = agg.count_documents().await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bson::{Bson, oid::ObjectId};
use storehouse_aggregate::{AggregationBuilder, DataSource};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::MongoClient;
use crate::config::{MongoConfig, ModelSettings};
use crate::document;
use crate::error::{MongoError, MongoResult};
use crate::executor::MongoExecutor;
use crate::model::MongoModel;

/// Owns a MongoDB connection and the models registered against it.
pub struct MongoManager {
    name: String,
    config: MongoConfig,
    models: HashMap<String, ModelSettings>,
    client: Mutex<Option<MongoClient>>,
    created: AtomicBool,
}

impl MongoManager {
    /// Manager type identifier.
    pub const TYPE: &'static str = "storehouse/mongodb";

    /// Create a manager. Does not connect.
    pub fn new(config: MongoConfig) -> MongoResult<Self> {
        if config.uri.trim().is_empty() {
            return Err(MongoError::config("missing database uri"));
        }

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("storehouse-{}", Uuid::new_v4()));

        let models: HashMap<String, ModelSettings> = config
            .models
            .iter()
            .filter(|m| !m.name.is_empty())
            .map(|m| (m.name.clone(), m.clone()))
            .collect();

        info!(manager = %name, models = models.len(), "MongoDB manager created");

        Ok(Self {
            name,
            config,
            models,
            client: Mutex::new(None),
            created: AtomicBool::new(false),
        })
    }

    /// The manager name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Names of the registered models.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The live client, created if there is none.
    pub async fn client(&self) -> MongoResult<MongoClient> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        if self.created.swap(true, Ordering::SeqCst) {
            warn!(manager = %self.name, "Recreating MongoDB client");
        } else {
            info!(manager = %self.name, "Creating MongoDB client");
        }
        let client = MongoClient::named(&self.name, self.config.clone()).await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Create the client if needed and ping the server.
    pub async fn connect(&self) -> MongoResult<MongoClient> {
        let client = self.client().await?;
        client
            .ping()
            .await
            .map_err(|e| MongoError::connection(format!("[{}] {}", self.name, e)))?;
        info!(manager = %self.name, "MongoDB connected");
        Ok(client)
    }

    /// Release the client. Calling this more than once is a no-op.
    pub async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            info!(manager = %self.name, "MongoDB client released");
        }
    }

    /// Whether a client currently exists.
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }

    /// Check the server responds to a ping.
    pub async fn is_healthy(&self) -> bool {
        match self.client().await {
            Ok(client) => client.is_healthy().await,
            Err(_) => false,
        }
    }

    /// A registered model, bound to the live client.
    pub async fn model(&self, name: &str) -> MongoResult<MongoModel> {
        let settings = self
            .models
            .get(name)
            .ok_or_else(|| MongoError::not_found(name))?;

        let client = self.client().await?;
        debug!(manager = %self.name, model = name, "Resolved model");
        Ok(MongoModel::from_settings(&client, settings))
    }

    /// Start an aggregation over a registered model.
    pub async fn aggregation(&self, name: &str) -> MongoResult<AggregationBuilder<MongoExecutor>> {
        Ok(self.model(name).await?.aggregation())
    }

    /// See [`document::to_object_id`].
    pub fn to_object_id(&self, value: Option<&Bson>) -> Option<ObjectId> {
        document::to_object_id(value)
    }
}

impl std::fmt::Debug for MongoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoManager")
            .field("name", &self.name)
            .field("uri", &self.config.uri)
            .field("models", &self.model_names())
            .finish()
    }
}
