//! Pipeline executor over a MongoDB collection.

use bson::{Bson, Document, doc};
use mongodb::options::{AggregateOptions, Hint};
use storehouse_aggregate::{
    AggregateError, AggregateResult, BoxFuture, ChainEntry, CursorOptions, PipelineExecutor,
};
use tracing::debug;

use crate::cursor::MongoCursor;
use crate::error::MongoError;
use crate::model::MongoModel;
use crate::stage::PipelineState;

/// Explain verbosity used by [`PipelineExecutor::explain`].
pub const EXPLAIN_VERBOSITY: &str = "queryPlanner";

/// Accumulates translated stages and runs them with `aggregate`.
///
/// Applying a stage returns an extended copy and leaves the receiver unchanged.
#[derive(Debug, Clone)]
pub struct MongoExecutor {
    model: Option<MongoModel>,
    state: PipelineState,
}

impl MongoExecutor {
    /// Create an executor with an empty pipeline bound to `model`.
    pub fn new(model: MongoModel) -> Self {
        Self {
            model: Some(model),
            state: PipelineState::new(),
        }
    }

    /// Create an executor with no model; bind one before executing.
    pub fn unbound() -> Self {
        Self {
            model: None,
            state: PipelineState::new(),
        }
    }

    /// Options the aggregate command will be sent with.
    pub fn options(&self) -> &AggregateOptions {
        &self.state.options
    }

    fn bound(&self) -> AggregateResult<&MongoModel> {
        self.model.as_ref().ok_or_else(AggregateError::unbound)
    }
}

/// Build the `explain` command for an aggregation over `collection`.
///
/// The inner `aggregate` carries the same options `cursor()` sends, so the
/// explained plan is the one that runs. The read preference is not part of
/// the command; pass `state.options.selection_criteria` to `run_command`.
pub fn explain_command(collection: &str, state: &PipelineState) -> AggregateResult<Document> {
    let options = &state.options;
    let mut aggregate = doc! {
        "aggregate": collection,
        "pipeline": state.pipeline.clone(),
        "cursor": {},
    };

    if let Some(allow) = options.allow_disk_use {
        aggregate.insert("allowDiskUse", allow);
    }
    if let Some(max_time) = options.max_time {
        let ms = i64::try_from(max_time.as_millis()).unwrap_or(i64::MAX);
        aggregate.insert("maxTimeMS", ms);
    }
    if let Some(collation) = &options.collation {
        aggregate.insert("collation", to_command_value("collation", collation)?);
    }
    if let Some(hint) = &options.hint {
        #[allow(unreachable_patterns)]
        let hint = match hint {
            Hint::Keys(keys) => Bson::Document(keys.clone()),
            Hint::Name(name) => Bson::String(name.clone()),
            _ => return Err(AggregateError::internal("unsupported index hint")),
        };
        aggregate.insert("hint", hint);
    }
    if let Some(vars) = &options.let_vars {
        aggregate.insert("let", vars.clone());
    }
    if let Some(read_concern) = &options.read_concern {
        aggregate.insert("readConcern", to_command_value("readConcern", read_concern)?);
    }

    Ok(doc! {
        "explain": aggregate,
        "verbosity": EXPLAIN_VERBOSITY,
    })
}

fn to_command_value<T: serde::Serialize>(key: &str, value: &T) -> AggregateResult<Bson> {
    bson::to_bson(value)
        .map_err(|e| AggregateError::internal(format!("failed to encode {}: {}", key, e)))
}

impl PipelineExecutor for MongoExecutor {
    type Source = MongoModel;
    type Cursor = MongoCursor;

    fn apply(&self, entry: &ChainEntry) -> AggregateResult<Self> {
        let mut next = self.clone();
        next.state.apply(entry)?;
        Ok(next)
    }

    fn cursor(&self, options: CursorOptions) -> BoxFuture<'_, AggregateResult<MongoCursor>> {
        Box::pin(async move {
            let model = self.bound()?;
            let command_options = self.state.with_cursor_options(&options)?;

            debug!(
                collection = model.collection_name(),
                stages = self.state.pipeline.len(),
                "Running aggregate"
            );

            let cursor = model
                .collection()
                .aggregate(self.state.pipeline.clone(), command_options)
                .await
                .map_err(MongoError::from)?;

            Ok(MongoCursor::new(cursor))
        })
    }

    fn explain(&self) -> BoxFuture<'_, AggregateResult<Document>> {
        Box::pin(async move {
            let model = self.bound()?;
            let command = explain_command(model.collection_name(), &self.state)?;

            let plan = model
                .database()
                .run_command(command, self.state.options.selection_criteria.clone())
                .await
                .map_err(MongoError::from)?;
            Ok(plan)
        })
    }

    fn pipeline(&self) -> Vec<Document> {
        self.state.pipeline.clone()
    }

    fn source(&self) -> Option<&MongoModel> {
        self.model.as_ref()
    }

    fn bind(&mut self, model: MongoModel) -> AggregateResult<()> {
        self.model = Some(model);
        Ok(())
    }
}
