//! MongoDB client wrapper with built-in connection pooling.

use std::sync::Arc;

use bson::{Document, doc};
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::config::MongoConfig;
use crate::events::ConnectionEvents;
use crate::error::{MongoError, MongoResult};

/// A MongoDB client bound to one database.
///
/// The MongoDB driver handles connection pooling internally; cloning is cheap.
#[derive(Clone, Debug)]
pub struct MongoClient {
    client: Client,
    database: Database,
    config: Arc<MongoConfig>,
}

impl MongoClient {
    /// Create a new client from configuration.
    ///
    /// The database is `config.database`, or the URI's default database.
    /// Connection events are logged under `config.name`.
    pub async fn new(config: MongoConfig) -> MongoResult<Self> {
        let name = config.name.clone().unwrap_or_else(|| "storehouse".to_string());
        Self::named(&name, config).await
    }

    /// Create a new client whose connection events are logged under `name`.
    pub async fn named(name: &str, config: MongoConfig) -> MongoResult<Self> {
        let mut options = config.to_client_options().await?;
        options.sdam_event_handler = Some(Arc::new(ConnectionEvents::new(name)));

        let database_name = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| MongoError::config("missing database name"))?;

        let client = Client::with_options(options)
            .map_err(|e| MongoError::connection(format!("failed to create client: {}", e)))?;

        let database = client.database(&database_name);

        info!(
            manager = name,
            uri = %config.uri,
            database = %database_name,
            "MongoDB client created"
        );

        Ok(Self {
            client,
            database,
            config: Arc::new(config),
        })
    }

    /// Get a collection of BSON documents.
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Get the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the underlying MongoDB client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Ping the server.
    pub async fn ping(&self) -> MongoResult<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(MongoError::from)?;
        Ok(())
    }

    /// Check if the client is healthy by pinging the server.
    pub async fn is_healthy(&self) -> bool {
        self.ping().await.is_ok()
    }

    /// Run a database command.
    pub async fn run_command(&self, command: Document) -> MongoResult<Document> {
        let result = self
            .database
            .run_command(command, None)
            .await
            .map_err(MongoError::from)?;
        Ok(result)
    }
}
