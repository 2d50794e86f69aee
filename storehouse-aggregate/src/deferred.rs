//! Awaiting a builder directly.
//!
//! An un-terminated builder converts into a [`Deferred`] that materializes
//! the pipeline with default cursor options. `then`, `catch` and `finally`
//! attach a handler to that deferred value and return it, so anything
//! chained afterwards follows future semantics rather than builder
//! semantics.
//!
//! ```rust,ignore
//! let mut agg = movies.aggregation();
//! agg.r#match(doc! { "rated": "PG" })?;
//!
//! // Same as `agg.exec().await`
//! let docs = agg.await?;
//! ```

use std::future::IntoFuture;

use bson::Document;
use futures::{FutureExt, TryFutureExt, future};

use crate::builder::AggregationBuilder;
use crate::error::{AggregateError, AggregateResult};
use crate::traits::{BoxFuture, PipelineExecutor};

/// A pending aggregation result.
pub type Deferred<T> = BoxFuture<'static, AggregateResult<T>>;

impl<E: PipelineExecutor> AggregationBuilder<E> {
    /// Convert into a deferred materialization of the current pipeline.
    pub fn into_deferred(self) -> Deferred<Vec<Document>> {
        Box::pin(async move { self.exec().await })
    }

    /// Materialize, then map the documents on success.
    pub fn then<T, F>(self, on_resolved: F) -> Deferred<T>
    where
        F: FnOnce(Vec<Document>) -> T + Send + 'static,
        T: Send + 'static,
    {
        Box::pin(self.into_deferred().map_ok(on_resolved))
    }

    /// Materialize, handing any failure to `on_rejected` for recovery.
    pub fn catch<F>(self, on_rejected: F) -> Deferred<Vec<Document>>
    where
        F: FnOnce(AggregateError) -> AggregateResult<Vec<Document>> + Send + 'static,
    {
        Box::pin(
            self.into_deferred()
                .or_else(move |err| future::ready(on_rejected(err))),
        )
    }

    /// Materialize, running `on_settled` once the outcome is known.
    pub fn finally<F>(self, on_settled: F) -> Deferred<Vec<Document>>
    where
        F: FnOnce() + Send + 'static,
    {
        Box::pin(self.into_deferred().inspect(move |_| on_settled()))
    }
}

impl<E: PipelineExecutor> IntoFuture for AggregationBuilder<E> {
    type Output = AggregateResult<Vec<Document>>;
    type IntoFuture = Deferred<Vec<Document>>;

    fn into_future(self) -> Self::IntoFuture {
        self.into_deferred()
    }
}
