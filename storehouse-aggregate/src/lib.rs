//! # storehouse-aggregate
//!
//! A reusable, replayable aggregation pipeline builder.
//!
//! This crate provides:
//! - A fluent builder over any backend implementing [`PipelineExecutor`]
//! - A record of every pipeline stage applied, in order
//! - Materialization: draining a cursor into memory, always closing it
//! - Counting: replaying the recorded stages on a fresh executor plus `$count`
//! - Direct `.await` on a builder (via [`IntoFuture`](std::future::IntoFuture))
//!
//! ## Operations
//!
//! Every verb is classified up front:
//!
//! ```rust
//! use storehouse_aggregate::{Operation, OperationKind};
//!
//! assert_eq!(Operation::Limit.kind(), OperationKind::PipelineStage);
//! assert_eq!(Operation::Model.kind(), OperationKind::Binding);
//! assert_eq!(Operation::CountDocuments.kind(), OperationKind::Counting);
//! ```
//!
//! ## Building and executing
//!
//! ```rust,ignore
//! use bson::doc;
//! use storehouse_aggregate::prelude::*;
//!
//! let mut agg = movies.aggregation();
//! agg.r#match(doc! { "status": "active" })?.limit(10)?;
//!
//! let count = agg.count_documents().await?;
//! let docs = agg.exec().await?;
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use storehouse_aggregate::{AggregateError, ErrorCode};
//!
//! let err = AggregateError::stage("limit", "expected an integer");
//! assert_eq!(err.code, ErrorCode::StageFailed);
//! ```

pub mod builder;
pub mod chain;
pub mod count;
pub mod deferred;
pub mod error;
pub mod logging;
pub mod materialize;
pub mod operation;
pub mod traits;

pub use builder::AggregationBuilder;
pub use chain::{ChainEntry, ChainRecorder};
pub use count::{COUNT_FIELD, count_documents, extract_count};
pub use deferred::Deferred;
pub use error::{AggregateError, AggregateResult, ErrorCode};
pub use materialize::{drain, materialize};
pub use operation::{Operation, OperationKind};
pub use traits::{BoxFuture, CursorOptions, DataSource, PipelineExecutor, ResultCursor};

// Re-export logging utilities
pub use logging::{
    get_log_format, get_log_level, init as init_logging, init_debug, init_with_level,
    is_debug_enabled,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::AggregationBuilder;
    pub use crate::chain::{ChainEntry, ChainRecorder};
    pub use crate::deferred::Deferred;
    pub use crate::error::{AggregateError, AggregateResult};
    pub use crate::operation::{Operation, OperationKind};
    pub use crate::traits::{CursorOptions, DataSource, PipelineExecutor, ResultCursor};
}
