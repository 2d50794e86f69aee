//! Ordered log of the pipeline stages applied to a builder.

use bson::Bson;

/// Pipeline operator of the count stage.
const COUNT_OPERATOR: &str = "$count";

use crate::operation::Operation;

/// A single recorded stage call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEntry {
    operation: Operation,
    arguments: Vec<Bson>,
}

impl ChainEntry {
    /// Create a new entry.
    pub fn new(operation: Operation, arguments: Vec<Bson>) -> Self {
        Self {
            operation,
            arguments,
        }
    }

    /// The operation that was called.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The arguments it was called with, in call order.
    pub fn arguments(&self) -> &[Bson] {
        &self.arguments
    }

    /// The first argument, if any.
    pub fn first(&self) -> Option<&Bson> {
        self.arguments.first()
    }

    /// Whether this call emits a `$count` stage.
    ///
    /// Covers the `count` verb, a custom stage named `count` or `$count`,
    /// and raw appended stages keyed by `$count`.
    pub fn emits_count(&self) -> bool {
        match &self.operation {
            Operation::Count => true,
            Operation::Custom(name) => name.trim_start_matches('$') == "count",
            Operation::Append => self.arguments.iter().any(|arg| match arg {
                Bson::Document(stage) => stage.len() == 1 && stage.contains_key(COUNT_OPERATOR),
                _ => false,
            }),
            _ => false,
        }
    }
}

/// Append-only record of pipeline-stage calls, owned by one builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainRecorder {
    entries: Vec<ChainEntry>,
}

impl ChainRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Only the builder records.
    pub(crate) fn record(&mut self, entry: ChainEntry) {
        debug_assert!(entry.operation().is_stage());
        self.entries.push(entry);
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChainEntry> {
        self.entries.iter()
    }

    /// All entries in recording order.
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// The recorded operation names, in order.
    pub fn operations(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.operation().name()).collect()
    }

    /// Check if any recorded call emits a `$count` stage.
    pub fn has_count_stage(&self) -> bool {
        self.entries.iter().any(ChainEntry::emits_count)
    }

    /// Check if an operation has been recorded at least once.
    pub fn contains(&self, operation: &Operation) -> bool {
        self.entries.iter().any(|e| e.operation() == operation)
    }
}

impl<'a> IntoIterator for &'a ChainRecorder {
    type Item = &'a ChainEntry;
    type IntoIter = std::slice::Iter<'a, ChainEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_records_in_order() {
        let mut chain = ChainRecorder::new();
        chain.record(ChainEntry::new(
            Operation::Match,
            vec![Bson::Document(doc! { "status": "active" })],
        ));
        chain.record(ChainEntry::new(Operation::Limit, vec![Bson::Int64(10)]));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.operations(), vec!["match", "limit"]);
        assert_eq!(chain.entries()[1].first(), Some(&Bson::Int64(10)));
        assert!(chain.contains(&Operation::Limit));
        assert!(!chain.contains(&Operation::Count));
    }

    #[test]
    fn test_count_stage_forms() {
        let custom = ChainEntry::new(Operation::custom("$count"), vec!["n".into()]);
        let bare = ChainEntry::new(Operation::custom("count"), vec!["n".into()]);
        let densify = ChainEntry::new(Operation::custom("densify"), vec![]);
        let raw = ChainEntry::new(
            Operation::Append,
            vec![doc! { "$match": {} }.into(), doc! { "$count": "n" }.into()],
        );
        let raw_match = ChainEntry::new(Operation::Append, vec![doc! { "$match": { "count": 1 } }.into()]);

        assert!(custom.emits_count());
        assert!(bare.emits_count());
        assert!(raw.emits_count());
        assert!(!densify.emits_count());
        assert!(!raw_match.emits_count());

        let mut chain = ChainRecorder::new();
        chain.record(raw_match);
        assert!(!chain.has_count_stage());
        chain.record(raw);
        assert!(chain.has_count_stage());
    }

    #[test]
    fn test_empty() {
        let chain = ChainRecorder::new();
        assert!(chain.is_empty());
        assert_eq!(chain.iter().count(), 0);
    }
}
