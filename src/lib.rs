//! # Storehouse
//!
//! Reusable, replayable aggregation pipelines.
//!
//! Storehouse provides:
//! - A chainable builder that records every pipeline stage it applies
//! - `exec()`: drain a cursor into memory, always closing it
//! - `count_documents()`: replay the recorded stages on a fresh executor and count
//! - Direct `.await` on a builder
//! - A MongoDB backend with a connection manager (feature `mongodb`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storehouse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     storehouse::init_logging();
//!
//!     let config = MongoConfig::builder()
//!         .uri("mongodb://localhost:27017/cinema")
//!         .model(ModelSettings::new("Movie"))
//!         .build()?;
//!     let manager = MongoManager::new(config)?;
//!
//!     let mut agg = manager.aggregation("Movie").await?;
//!     agg.r#match(doc! { "rated": "PG" })?.limit(10)?;
//!
//!     let total = agg.count_documents().await?;
//!     let movies = agg.await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The backend-independent aggregation builder.
pub mod aggregate {
    pub use storehouse_aggregate::*;
}

/// The MongoDB backend.
#[cfg(feature = "mongodb")]
#[cfg_attr(docsrs, doc(cfg(feature = "mongodb")))]
pub mod mongodb {
    pub use storehouse_mongodb::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use storehouse_aggregate::prelude::*;

    #[cfg(feature = "mongodb")]
    pub use storehouse_mongodb::prelude::*;
}

// Re-export key types at the crate root
pub use storehouse_aggregate::{
    AggregateError, AggregateResult, AggregationBuilder, ErrorCode, init_logging,
};
