//! Collection-backed data source.

use bson::Document;
use mongodb::{Collection, Database};
use storehouse_aggregate::DataSource;

use crate::client::MongoClient;
use crate::config::ModelSettings;
use crate::executor::MongoExecutor;

/// A named model over one MongoDB collection.
///
/// ```rust,ignore
/// let movies = manager.model("Movie").await?;
///
/// let mut agg = movies.aggregation();
/// agg.r#match(doc! { "rated": "PG" })?.limit(10)?;
/// let docs = agg.await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoModel {
    name: String,
    database: Database,
    collection: Collection<Document>,
}

impl MongoModel {
    /// Create a model over `collection` in `database`.
    pub fn new(name: impl Into<String>, database: &Database, collection: &str) -> Self {
        Self {
            name: name.into(),
            database: database.clone(),
            collection: database.collection(collection),
        }
    }

    /// Create a model from registered settings.
    pub fn from_settings(client: &MongoClient, settings: &ModelSettings) -> Self {
        Self::new(
            settings.name.clone(),
            client.database(),
            &settings.collection_name(),
        )
    }

    /// The collection handle.
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    /// The collection name.
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// The database the collection lives in.
    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl DataSource for MongoModel {
    type Executor = MongoExecutor;

    fn name(&self) -> &str {
        &self.name
    }

    fn aggregate(&self) -> MongoExecutor {
        MongoExecutor::new(self.clone())
    }
}
