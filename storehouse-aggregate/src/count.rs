//! Counting by replay.
//!
//! Counting never touches the caller's executor. It asks the data source for
//! a fresh executor, replays the recorded stages onto it in order, appends a
//! `count` stage and drains the resulting cursor.

use bson::{Bson, Document};
use tracing::debug;

use crate::chain::{ChainEntry, ChainRecorder};
use crate::error::{AggregateError, AggregateResult};
use crate::materialize::drain;
use crate::operation::Operation;
use crate::traits::{CursorOptions, DataSource, PipelineExecutor};

/// Output field of the appended count stage.
pub const COUNT_FIELD: &str = "count";

/// Replay `chain` onto a fresh executor from `source` and count the results.
pub async fn count_documents<S: DataSource>(source: &S, chain: &ChainRecorder) -> AggregateResult<u64> {
    if chain.has_count_stage() {
        return Err(AggregateError::nested_count());
    }

    debug!(source = source.name(), stages = chain.len(), "Replaying chain for count");

    let mut executor = source.aggregate();
    for entry in chain {
        executor = executor
            .apply(entry)
            .map_err(|e| AggregateError::replay(entry.operation(), e))?;
    }

    let count_stage = ChainEntry::new(Operation::Count, vec![Bson::String(COUNT_FIELD.into())]);
    let executor = executor.apply(&count_stage)?;

    let mut cursor = executor.cursor(CursorOptions::default()).await?;
    let documents = drain(&mut cursor).await?;

    let count = extract_count(&documents, COUNT_FIELD);
    debug!(source = source.name(), count, "Counted documents");
    Ok(count)
}

/// Pick the count from the last document carrying a numeric `field`.
///
/// Documents without the field are skipped; negative values clamp to zero;
/// the result is zero when no document reports a count.
pub fn extract_count(documents: &[Document], field: &str) -> u64 {
    documents
        .iter()
        .filter_map(|doc| match doc.get(field)? {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            Bson::Double(n) if n.is_finite() => Some(*n as i64),
            _ => None,
        })
        .last()
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}
