//! The chainable aggregation builder.
//!
//! The builder owns the latest executor handle and a [`ChainRecorder`].
//! Every call is routed by its [`OperationKind`]:
//!
//! - pipeline stages are applied to the executor, which is then replaced by
//!   the handle the stage returned, and recorded;
//! - pass-through calls go straight to the executor;
//! - binding calls read or rebind the executor's data source;
//! - `exec` drains a cursor over the current executor;
//! - `count_documents` replays the recorder onto a fresh executor.
//!
//! # Example
//!
//! ```rust,ignore
//! use bson::doc;
//! use storehouse_aggregate::prelude::*;
//!
//! let mut agg = movies.aggregation();
//! agg.r#match(doc! { "rated": "PG" })?
//!     .sort(doc! { "year": -1 })?
//!     .limit(10)?;
//!
//! let total = agg.count_documents().await?;
//! let page = agg.await?;
//! ```

use bson::{Bson, Document};
use tracing::debug;

use crate::chain::{ChainEntry, ChainRecorder};
use crate::count;
use crate::error::{AggregateError, AggregateResult};
use crate::materialize::materialize;
use crate::operation::{Operation, OperationKind};
use crate::traits::{BoxFuture, CursorOptions, DataSource, PipelineExecutor};

/// A reusable aggregation over a [`PipelineExecutor`].
///
/// Stage methods take `&mut self` and return `&mut Self`, so calls chain with
/// `?`. A failing stage leaves both the executor and the recorder untouched.
pub struct AggregationBuilder<E: PipelineExecutor> {
    executor: E,
    chain: ChainRecorder,
}

impl<E: PipelineExecutor> AggregationBuilder<E> {
    /// Start an aggregation over a fresh executor from `source`.
    pub fn new(source: &E::Source) -> Self {
        Self::from_executor(source.aggregate())
    }

    /// Wrap an existing executor.
    ///
    /// The executor may be unbound; execution then fails until a source is
    /// bound with [`set_model`](Self::set_model).
    pub fn from_executor(executor: E) -> Self {
        Self {
            executor,
            chain: ChainRecorder::new(),
        }
    }

    /// The stages recorded so far.
    pub fn chain(&self) -> &ChainRecorder {
        &self.chain
    }

    /// The current executor handle.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    // ============== Pipeline Stages ==============

    /// Apply and record a pipeline stage.
    ///
    /// This is the only path that records. Non-stage operations are rejected.
    pub fn stage(&mut self, operation: Operation, arguments: Vec<Bson>) -> AggregateResult<&mut Self> {
        if !operation.is_stage() {
            return Err(AggregateError::not_a_stage(&operation));
        }

        let entry = ChainEntry::new(operation, arguments);
        let next = self.executor.apply(&entry)?;
        self.executor = next;

        debug!(
            operation = %entry.operation(),
            stages = self.chain.len() + 1,
            "Applied pipeline stage"
        );
        self.chain.record(entry);
        Ok(self)
    }

    /// Apply a stage by its verb name.
    ///
    /// Unknown names fail with [`ErrorCode::UnknownOperation`]; names of
    /// non-stage operations fail with [`ErrorCode::NotAStage`], since those
    /// have dedicated methods with their own return types.
    ///
    /// [`ErrorCode::UnknownOperation`]: crate::ErrorCode::UnknownOperation
    /// [`ErrorCode::NotAStage`]: crate::ErrorCode::NotAStage
    pub fn invoke(&mut self, name: &str, arguments: Vec<Bson>) -> AggregateResult<&mut Self> {
        let operation: Operation = name.parse()?;
        match operation.kind() {
            OperationKind::PipelineStage => self.stage(operation, arguments),
            _ => Err(AggregateError::not_a_stage(&operation)),
        }
    }

    /// Append a stage with no dedicated verb, e.g. `$densify`.
    pub fn custom_stage(&mut self, name: &str, arguments: Vec<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::custom(name), arguments)
    }

    /// Filter documents (`$match`).
    pub fn r#match(&mut self, filter: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Match, vec![filter.into()])
    }

    /// Sort documents (`$sort`). Accepts a document or a `"field -other"` string.
    pub fn sort(&mut self, spec: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::Sort, vec![spec.into()])
    }

    /// Limit the number of documents (`$limit`).
    pub fn limit(&mut self, n: i64) -> AggregateResult<&mut Self> {
        self.stage(Operation::Limit, vec![Bson::Int64(n)])
    }

    /// Skip documents (`$skip`).
    pub fn skip(&mut self, n: i64) -> AggregateResult<&mut Self> {
        self.stage(Operation::Skip, vec![Bson::Int64(n)])
    }

    /// Group documents (`$group`).
    pub fn group(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Group, vec![spec.into()])
    }

    /// Reshape documents (`$project`). Accepts a document or a `"a -b"` string.
    pub fn project(&mut self, spec: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::Project, vec![spec.into()])
    }

    /// Join another collection (`$lookup`).
    pub fn lookup(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Lookup, vec![spec.into()])
    }

    /// Recursive join (`$graphLookup`).
    pub fn graph_lookup(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::GraphLookup, vec![spec.into()])
    }

    /// Deconstruct one or more array fields (`$unwind`).
    pub fn unwind<I, B>(&mut self, paths: I) -> AggregateResult<&mut Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bson>,
    {
        self.stage(Operation::Unwind, paths.into_iter().map(Into::into).collect())
    }

    /// Run sub-pipelines over the same input (`$facet`).
    pub fn facet(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Facet, vec![spec.into()])
    }

    /// Randomly select documents (`$sample`).
    pub fn sample(&mut self, size: i64) -> AggregateResult<&mut Self> {
        self.stage(Operation::Sample, vec![Bson::Int64(size)])
    }

    /// Replace the documents with a count under `field` (`$count`).
    pub fn count(&mut self, field: &str) -> AggregateResult<&mut Self> {
        self.stage(Operation::Count, vec![Bson::String(field.to_string())])
    }

    /// Add computed fields (`$addFields`).
    pub fn add_fields(&mut self, fields: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::AddFields, vec![fields.into()])
    }

    /// Append raw stage documents.
    pub fn append<I>(&mut self, stages: I) -> AggregateResult<&mut Self>
    where
        I: IntoIterator<Item = Document>,
    {
        self.stage(
            Operation::Append,
            stages.into_iter().map(Bson::Document).collect(),
        )
    }

    /// Geospatial proximity stage (`$geoNear`).
    pub fn near(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Near, vec![spec.into()])
    }

    /// Restrict content by expression (`$redact`).
    pub fn redact(&mut self, expression: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::Redact, vec![expression.into()])
    }

    /// Promote a field or expression to the root (`$replaceRoot`).
    pub fn replace_root(&mut self, new_root: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::ReplaceRoot, vec![new_root.into()])
    }

    /// Full-text search stage (`$search`).
    pub fn search(&mut self, spec: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Search, vec![spec.into()])
    }

    /// Group by a field and count, sorted (`$sortByCount`).
    pub fn sort_by_count(&mut self, expression: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::SortByCount, vec![expression.into()])
    }

    /// Allow the server to use temporary files.
    pub fn allow_disk_use(&mut self, allow: bool) -> AggregateResult<&mut Self> {
        self.stage(Operation::AllowDiskUse, vec![Bson::Boolean(allow)])
    }

    /// Set the collation.
    pub fn collation(&mut self, collation: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Collation, vec![collation.into()])
    }

    /// Set an index hint, by key pattern or index name.
    pub fn hint(&mut self, hint: impl Into<Bson>) -> AggregateResult<&mut Self> {
        self.stage(Operation::Hint, vec![hint.into()])
    }

    /// Set aggregate command options.
    pub fn option(&mut self, options: Document) -> AggregateResult<&mut Self> {
        self.stage(Operation::Option, vec![options.into()])
    }

    /// Set the read preference by mode name.
    pub fn read(&mut self, mode: &str) -> AggregateResult<&mut Self> {
        self.stage(Operation::Read, vec![Bson::String(mode.to_string())])
    }

    /// Set the read concern level.
    pub fn read_concern(&mut self, level: &str) -> AggregateResult<&mut Self> {
        self.stage(Operation::ReadConcern, vec![Bson::String(level.to_string())])
    }

    // ============== Pass-through ==============

    /// Open a cursor directly on the current executor.
    ///
    /// The caller owns the cursor and is responsible for closing it.
    pub fn cursor(&self, options: CursorOptions) -> BoxFuture<'_, AggregateResult<E::Cursor>> {
        self.executor.cursor(options)
    }

    /// Explain the current pipeline.
    pub fn explain(&self) -> BoxFuture<'_, AggregateResult<Document>> {
        self.executor.explain()
    }

    /// The raw pipeline of the current executor.
    pub fn pipeline(&self) -> Vec<Document> {
        self.executor.pipeline()
    }

    // ============== Binding ==============

    /// The data source the executor is bound to.
    pub fn model(&self) -> Option<&E::Source> {
        self.executor.source()
    }

    /// Rebind the executor to another data source. Not recorded.
    pub fn set_model(&mut self, source: E::Source) -> AggregateResult<&mut Self> {
        debug!(source = source.name(), "Rebinding aggregation");
        self.executor.bind(source)?;
        Ok(self)
    }

    // ============== Execution ==============

    /// Drain the current pipeline into memory.
    pub async fn exec(&self) -> AggregateResult<Vec<Document>> {
        self.exec_with(CursorOptions::default()).await
    }

    /// Drain the current pipeline into memory using cursor options.
    pub async fn exec_with(&self, options: CursorOptions) -> AggregateResult<Vec<Document>> {
        let source = self.executor.source().ok_or_else(AggregateError::unbound)?;
        debug!(
            source = source.name(),
            stages = self.chain.len(),
            "Materializing aggregation"
        );
        materialize(&self.executor, options).await
    }

    /// Count the documents the recorded pipeline produces.
    ///
    /// Runs on a fresh executor from the bound source; this builder's
    /// executor and recorder are not modified.
    pub async fn count_documents(&self) -> AggregateResult<u64> {
        let source = self.executor.source().ok_or_else(AggregateError::unbound)?;
        count::count_documents(source, &self.chain).await
    }
}

impl<E> std::fmt::Debug for AggregationBuilder<E>
where
    E: PipelineExecutor + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationBuilder")
            .field("executor", &self.executor)
            .field("chain", &self.chain)
            .finish()
    }
}
