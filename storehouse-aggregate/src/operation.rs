//! Operation names and their classification.
//!
//! Every verb exposed by [`AggregationBuilder`](crate::AggregationBuilder)
//! maps to exactly one [`OperationKind`]. The mapping is fixed; only
//! [`OperationKind::PipelineStage`] operations are ever recorded in a
//! [`ChainRecorder`](crate::ChainRecorder).
//!
//! ```rust
//! use storehouse_aggregate::{Operation, OperationKind};
//!
//! let op: Operation = "sortByCount".parse().unwrap();
//! assert_eq!(op, Operation::SortByCount);
//! assert_eq!(op.kind(), OperationKind::PipelineStage);
//!
//! assert_eq!(Operation::Explain.kind(), OperationKind::PassThrough);
//! assert!("frobnicate".parse::<Operation>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::error::AggregateError;

/// How the builder treats a call to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Forwarded to the current executor, result returned unmodified.
    PassThrough,
    /// Reads or rebinds the executor's data source.
    Binding,
    /// Appends a stage; recorded and replayable.
    PipelineStage,
    /// Drains a cursor into memory.
    Materializing,
    /// Replays the chain onto a fresh executor and counts.
    Counting,
    /// Deferred-value combinator over the implicit materialization.
    Combinator,
}

/// A builder operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    // Pass-through
    /// `cursor`
    Cursor,
    /// `explain`
    Explain,
    /// `pipeline`
    Pipeline,

    // Binding
    /// `model`
    Model,

    // Execution triggers
    /// `exec`
    Exec,
    /// `countDocuments`
    CountDocuments,

    // Deferred combinators
    /// `then`
    Then,
    /// `catch`
    Catch,
    /// `finally`
    Finally,

    // Pipeline stages
    /// `addFields`
    AddFields,
    /// `allowDiskUse`
    AllowDiskUse,
    /// `append`
    Append,
    /// `collation`
    Collation,
    /// `count`
    Count,
    /// `facet`
    Facet,
    /// `graphLookup`
    GraphLookup,
    /// `group`
    Group,
    /// `hint`
    Hint,
    /// `limit`
    Limit,
    /// `lookup`
    Lookup,
    /// `match`
    Match,
    /// `near`
    Near,
    /// `option`
    Option,
    /// `project`
    Project,
    /// `read`
    Read,
    /// `readConcern`
    ReadConcern,
    /// `redact`
    Redact,
    /// `replaceRoot`
    ReplaceRoot,
    /// `sample`
    Sample,
    /// `search`
    Search,
    /// `skip`
    Skip,
    /// `sort`
    Sort,
    /// `sortByCount`
    SortByCount,
    /// `unwind`
    Unwind,
    /// A stage the builder has no dedicated verb for, named by the caller.
    Custom(SmolStr),
}

/// Every named operation, in the order used for name lookup.
const NAMED: &[Operation] = &[
    Operation::Cursor,
    Operation::Explain,
    Operation::Pipeline,
    Operation::Model,
    Operation::Exec,
    Operation::CountDocuments,
    Operation::Then,
    Operation::Catch,
    Operation::Finally,
    Operation::AddFields,
    Operation::AllowDiskUse,
    Operation::Append,
    Operation::Collation,
    Operation::Count,
    Operation::Facet,
    Operation::GraphLookup,
    Operation::Group,
    Operation::Hint,
    Operation::Limit,
    Operation::Lookup,
    Operation::Match,
    Operation::Near,
    Operation::Option,
    Operation::Project,
    Operation::Read,
    Operation::ReadConcern,
    Operation::Redact,
    Operation::ReplaceRoot,
    Operation::Sample,
    Operation::Search,
    Operation::Skip,
    Operation::Sort,
    Operation::SortByCount,
    Operation::Unwind,
];

impl Operation {
    /// Create a custom stage operation.
    ///
    /// The name is the stage the executor should emit, e.g. `"$densify"`.
    pub fn custom(name: impl Into<SmolStr>) -> Self {
        Self::Custom(name.into())
    }

    /// The verb name as exposed on the builder surface.
    pub fn name(&self) -> &str {
        match self {
            Self::Cursor => "cursor",
            Self::Explain => "explain",
            Self::Pipeline => "pipeline",
            Self::Model => "model",
            Self::Exec => "exec",
            Self::CountDocuments => "countDocuments",
            Self::Then => "then",
            Self::Catch => "catch",
            Self::Finally => "finally",
            Self::AddFields => "addFields",
            Self::AllowDiskUse => "allowDiskUse",
            Self::Append => "append",
            Self::Collation => "collation",
            Self::Count => "count",
            Self::Facet => "facet",
            Self::GraphLookup => "graphLookup",
            Self::Group => "group",
            Self::Hint => "hint",
            Self::Limit => "limit",
            Self::Lookup => "lookup",
            Self::Match => "match",
            Self::Near => "near",
            Self::Option => "option",
            Self::Project => "project",
            Self::Read => "read",
            Self::ReadConcern => "readConcern",
            Self::Redact => "redact",
            Self::ReplaceRoot => "replaceRoot",
            Self::Sample => "sample",
            Self::Search => "search",
            Self::Skip => "skip",
            Self::Sort => "sort",
            Self::SortByCount => "sortByCount",
            Self::Unwind => "unwind",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Classify the operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Cursor | Self::Explain | Self::Pipeline => OperationKind::PassThrough,
            Self::Model => OperationKind::Binding,
            Self::Exec => OperationKind::Materializing,
            Self::CountDocuments => OperationKind::Counting,
            Self::Then | Self::Catch | Self::Finally => OperationKind::Combinator,
            _ => OperationKind::PipelineStage,
        }
    }

    /// Check if the operation is recorded and replayed.
    #[inline]
    pub fn is_stage(&self) -> bool {
        self.kind() == OperationKind::PipelineStage
    }
}

impl FromStr for Operation {
    type Err = AggregateError;

    /// Look up a verb by name. Custom stages are never produced here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMED
            .iter()
            .find(|op| op.name() == s)
            .cloned()
            .ok_or_else(|| AggregateError::unknown_operation(s))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&Operation> for SmolStr {
    fn from(op: &Operation) -> Self {
        SmolStr::new(op.name())
    }
}
