//! # storehouse-mongodb
//!
//! MongoDB backend for `storehouse-aggregate`.
//!
//! This crate provides:
//! - [`MongoModel`]: a collection handle that starts aggregations
//! - [`MongoExecutor`]: translates builder calls into pipeline stages and
//!   aggregate command options
//! - [`MongoCursor`]: drains the driver cursor one document at a time
//! - [`MongoManager`]: configuration, lazy client creation and a model registry
//! - [`ConnectionEvents`]: logs driver connection lifecycle events
//!
//! ## Example
//!
//! ```rust,ignore
//! use storehouse_mongodb::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = MongoManager::new(MongoConfig::from_env()?)?;
//!     let movies = manager.model("Movie").await?;
//!
//!     let mut agg = movies.aggregation();
//!     agg.r#match(doc! { "year": { "$gte": 1990 } })?
//!         .sort("-year")?
//!         .limit(20)?;
//!
//!     let total = agg.count_documents().await?;
//!     let page = agg.await?;
//!     println!("{} of {}", page.len(), total);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod events;
pub mod executor;
pub mod manager;
pub mod model;
pub mod stage;

pub use bson::oid::ObjectId;
pub use bson::{Bson, Document, doc};
pub use client::MongoClient;
pub use config::{ModelSettings, MongoConfig, MongoConfigBuilder, ReadPreference};
pub use cursor::MongoCursor;
pub use error::{MongoError, MongoResult};
pub use events::{ConnectionEvent, ConnectionEvents};
pub use executor::{MongoExecutor, explain_command};
pub use manager::MongoManager;
pub use model::MongoModel;
pub use stage::PipelineState;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::MongoClient;
    pub use crate::config::{ModelSettings, MongoConfig, MongoConfigBuilder, ReadPreference};
    pub use crate::error::{MongoError, MongoResult};
    pub use crate::executor::MongoExecutor;
    pub use crate::manager::MongoManager;
    pub use crate::model::MongoModel;
    pub use bson::oid::ObjectId;
    pub use bson::{Bson, Document, doc};
    pub use storehouse_aggregate::prelude::*;
}
