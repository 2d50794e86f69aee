//! Result cursor over a driver aggregation cursor.

use bson::Document;
use futures::TryStreamExt;
use mongodb::Cursor;
use storehouse_aggregate::{AggregateError, AggregateResult, BoxFuture, ResultCursor};
use tracing::debug;

/// A [`ResultCursor`] over a MongoDB aggregation cursor.
///
/// Closing drops the driver cursor, which kills the server-side cursor if it
/// is still open.
pub struct MongoCursor {
    inner: Option<Cursor<Document>>,
}

impl std::fmt::Debug for MongoCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoCursor")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MongoCursor {
    /// Wrap a driver cursor.
    pub fn new(cursor: Cursor<Document>) -> Self {
        Self {
            inner: Some(cursor),
        }
    }

    /// Whether [`close`](ResultCursor::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl ResultCursor for MongoCursor {
    fn next(&mut self) -> BoxFuture<'_, AggregateResult<Option<Document>>> {
        Box::pin(async move {
            let cursor = self.inner.as_mut().ok_or_else(AggregateError::cursor_closed)?;

            cursor
                .try_next()
                .await
                .map_err(|e| AggregateError::cursor(e.to_string()).with_source(e))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, AggregateResult<()>> {
        Box::pin(async move {
            if self.inner.take().is_some() {
                debug!("MongoDB cursor closed");
            }
            Ok(())
        })
    }
}
