//! Capabilities the builder consumes from a database backend.
//!
//! A backend provides three collaborators:
//!
//! - [`DataSource`]: a named collection (or table) handle that hands out
//!   fresh executors.
//! - [`PipelineExecutor`]: accumulates stages and opens cursors.
//! - [`ResultCursor`]: an asynchronous pull-based sequence of documents.

use std::future::Future;
use std::pin::Pin;

use bson::{Bson, Document};

use crate::builder::AggregationBuilder;
use crate::chain::ChainEntry;
use crate::error::AggregateResult;

/// A boxed future, used for asynchronous trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The entity executors are obtained from.
pub trait DataSource: Clone + Send + Sync + 'static {
    /// The executor type this source produces.
    type Executor: PipelineExecutor;

    /// Name of the source, used in logs.
    fn name(&self) -> &str;

    /// Create a fresh executor bound to this source with an empty pipeline.
    fn aggregate(&self) -> Self::Executor;

    /// Start a new aggregation over this source.
    fn aggregation(&self) -> AggregationBuilder<Self::Executor> {
        AggregationBuilder::from_executor(self.aggregate())
    }
}

/// Accumulates pipeline stages and produces cursors over the result.
pub trait PipelineExecutor: Sized + Send + Sync + 'static {
    /// The data source this executor reads from.
    type Source: DataSource<Executor = Self>;

    /// The cursor type produced by [`cursor`](Self::cursor).
    type Cursor: ResultCursor + 'static;

    /// Apply a stage and return the handle for the extended pipeline.
    ///
    /// The returned handle replaces `self` in the caller; implementations may
    /// return a modified copy.
    fn apply(&self, entry: &ChainEntry) -> AggregateResult<Self>;

    /// Open a cursor over the current pipeline.
    fn cursor(&self, options: CursorOptions) -> BoxFuture<'_, AggregateResult<Self::Cursor>>;

    /// Ask the backend to explain the current pipeline.
    fn explain(&self) -> BoxFuture<'_, AggregateResult<Document>>;

    /// The raw pipeline stages accumulated so far.
    fn pipeline(&self) -> Vec<Document>;

    /// The bound data source, if any.
    fn source(&self) -> Option<&Self::Source>;

    /// Rebind the executor to another data source.
    fn bind(&mut self, source: Self::Source) -> AggregateResult<()>;
}

/// An asynchronous pull-based sequence of documents.
pub trait ResultCursor: Send {
    /// Fetch the next document, or `None` at the end of the sequence.
    fn next(&mut self) -> BoxFuture<'_, AggregateResult<Option<Document>>>;

    /// Release the cursor. Calling this more than once is a no-op.
    fn close(&mut self) -> BoxFuture<'_, AggregateResult<()>>;
}

/// Opaque cursor configuration handed to [`PipelineExecutor::cursor`].
///
/// ```rust
/// use storehouse_aggregate::CursorOptions;
///
/// let options = CursorOptions::new().set("batchSize", 100);
/// assert_eq!(options.get("batchSize").and_then(|b| b.as_i32()), Some(100));
/// assert!(CursorOptions::default().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorOptions(Document);

impl CursorOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get an option.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.0.get(key)
    }

    /// Check if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the options as a document.
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Consume into the underlying document.
    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Document> for CursorOptions {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}
