//! Cursor draining.
//!
//! Exactly one cursor is opened per materialization and exactly one close is
//! attempted on it, whether draining succeeds or fails.

use bson::Document;
use tracing::{debug, warn};

use crate::error::AggregateResult;
use crate::traits::{CursorOptions, PipelineExecutor, ResultCursor};

/// Open a cursor on `executor` and collect every document it yields.
pub async fn materialize<E: PipelineExecutor>(
    executor: &E,
    options: CursorOptions,
) -> AggregateResult<Vec<Document>> {
    let mut cursor = executor.cursor(options).await?;
    drain(&mut cursor).await
}

/// Collect every remaining document of `cursor`, then close it.
///
/// Documents are requested one at a time and kept in emission order. A
/// failure from `next()` is returned as-is after the cursor is closed; a
/// close failure only surfaces when draining itself succeeded.
pub async fn drain<C: ResultCursor + ?Sized>(cursor: &mut C) -> AggregateResult<Vec<Document>> {
    let mut documents = Vec::new();

    let drained = loop {
        match cursor.next().await {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    let closed = cursor.close().await;

    match (drained, closed) {
        (Ok(()), Ok(())) => {
            debug!(documents = documents.len(), "Cursor drained");
            Ok(documents)
        }
        (Ok(()), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Cursor close failed after iteration error");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AggregateError, ErrorCode};
    use crate::traits::BoxFuture;
    use bson::doc;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    struct ScriptedCursor {
        items: VecDeque<AggregateResult<Option<Document>>>,
        close_result: Option<AggregateError>,
        closes: usize,
        pulls: usize,
    }

    impl ScriptedCursor {
        fn new(items: Vec<AggregateResult<Option<Document>>>) -> Self {
            Self {
                items: items.into(),
                close_result: None,
                closes: 0,
                pulls: 0,
            }
        }
    }

    impl ResultCursor for ScriptedCursor {
        fn next(&mut self) -> BoxFuture<'_, AggregateResult<Option<Document>>> {
            self.pulls += 1;
            let item = self.items.pop_front().unwrap_or(Ok(None));
            Box::pin(async move { item })
        }

        fn close(&mut self) -> BoxFuture<'_, AggregateResult<()>> {
            self.closes += 1;
            let result = match self.close_result.take() {
                Some(e) => Err(e),
                None => Ok(()),
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn test_drain_keeps_order_and_closes_once() {
        let mut cursor = ScriptedCursor::new(vec![
            Ok(Some(doc! { "n": 1 })),
            Ok(Some(doc! { "n": 2 })),
            Ok(Some(doc! { "n": 3 })),
            Ok(None),
        ]);

        let docs = drain(&mut cursor).await.unwrap();

        assert_eq!(docs, vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }]);
        assert_eq!(cursor.closes, 1);
        assert_eq!(cursor.pulls, 4);
    }

    #[tokio::test]
    async fn test_drain_stops_at_first_error() {
        let mut cursor = ScriptedCursor::new(vec![
            Ok(Some(doc! { "n": 1 })),
            Err(AggregateError::cursor("network reset")),
            Ok(Some(doc! { "n": 3 })),
        ]);

        let err = drain(&mut cursor).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::CursorFailed);
        assert_eq!(err.message, "network reset");
        assert_eq!(cursor.closes, 1);
        assert_eq!(cursor.pulls, 2);
    }

    #[tokio::test]
    async fn test_iteration_error_wins_over_close_error() {
        let mut cursor = ScriptedCursor::new(vec![Err(AggregateError::cursor("first"))]);
        cursor.close_result = Some(AggregateError::backend("close"));

        let err = drain(&mut cursor).await.unwrap_err();
        assert_eq!(err.message, "first");
        assert_eq!(cursor.closes, 1);
    }

    #[tokio::test]
    async fn test_close_error_after_success_is_reported() {
        let mut cursor = ScriptedCursor::new(vec![Ok(Some(doc! { "n": 1 }))]);
        cursor.close_result = Some(AggregateError::backend("close"));

        let err = drain(&mut cursor).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Backend);
    }

    #[tokio::test]
    async fn test_empty_cursor() {
        let mut cursor = ScriptedCursor::new(vec![]);
        let docs = drain(&mut cursor).await.unwrap();
        assert!(docs.is_empty());
        assert_eq!(cursor.closes, 1);
    }
}
