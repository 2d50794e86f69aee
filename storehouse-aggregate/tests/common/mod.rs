//! Recording in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use bson::{Bson, Document, doc};
use parking_lot::Mutex;
use storehouse_aggregate::{
    AggregateError, AggregateResult, BoxFuture, ChainEntry, CursorOptions, DataSource, Operation,
    PipelineExecutor, ResultCursor,
};

/// Everything the mock backend observed.
#[derive(Debug, Default)]
pub struct Journal {
    next_handle: usize,
    /// Source name of every executor created by `aggregate()`, by lineage.
    pub lineages: Vec<String>,
    /// Every successful stage application.
    pub applied: Vec<Applied>,
    /// Every cursor opened.
    pub cursors: Vec<OpenedCursor>,
}

impl Journal {
    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    /// Operation names applied to one lineage, in order.
    pub fn stages_of(&self, lineage: usize) -> Vec<String> {
        self.applied
            .iter()
            .filter(|a| a.lineage == lineage)
            .map(|a| a.operation.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub lineage: usize,
    pub operation: String,
    pub arguments: Vec<Bson>,
}

#[derive(Debug, Clone)]
pub struct OpenedCursor {
    pub lineage: usize,
    pub source: String,
    pub stages: Vec<String>,
    pub options: CursorOptions,
    pub pulls: usize,
    pub closes: usize,
}

/// What the backend answers with.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Documents yielded by ordinary cursors.
    pub documents: Vec<Document>,
    /// Documents yielded by cursors whose pipeline ends in `count`.
    pub count_documents: Vec<Document>,
    /// Fail `next()` after this many documents.
    pub fail_after: Option<usize>,
    /// Operations `apply` rejects.
    pub failing_operations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MockSource {
    name: String,
    journal: Arc<Mutex<Journal>>,
    script: Arc<Mutex<Script>>,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self::with_journal(name, Arc::new(Mutex::new(Journal::default())))
    }

    /// A source that records into an existing journal.
    pub fn with_journal(name: &str, journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            name: name.to_string(),
            journal,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        self.journal.clone()
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock());
    }

    pub fn yielding(self, documents: Vec<Document>) -> Self {
        self.script(|s| s.documents = documents);
        self
    }

    pub fn counting(self, documents: Vec<Document>) -> Self {
        self.script(|s| s.count_documents = documents);
        self
    }
}

impl DataSource for MockSource {
    type Executor = MockExecutor;

    fn name(&self) -> &str {
        &self.name
    }

    fn aggregate(&self) -> MockExecutor {
        let mut journal = self.journal.lock();
        let lineage = journal.lineages.len();
        journal.lineages.push(self.name.clone());
        let handle = journal.handle();

        MockExecutor {
            handle,
            lineage,
            source: Some(self.clone()),
            journal: self.journal.clone(),
            stages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockExecutor {
    /// Unique per handle; changes on every `apply`.
    pub handle: usize,
    pub lineage: usize,
    source: Option<MockSource>,
    journal: Arc<Mutex<Journal>>,
    stages: Vec<ChainEntry>,
}

impl MockExecutor {
    pub fn unbound() -> Self {
        Self {
            handle: 0,
            lineage: usize::MAX,
            source: None,
            journal: Arc::new(Mutex::new(Journal::default())),
            stages: Vec::new(),
        }
    }

    fn open(&self, options: CursorOptions) -> AggregateResult<MockCursor> {
        let source = self.source.clone().ok_or_else(AggregateError::unbound)?;
        let script = source.script.lock().clone();

        let ends_in_count = self
            .stages
            .last()
            .is_some_and(|e| e.operation() == &Operation::Count);
        let documents = if ends_in_count {
            script.count_documents
        } else {
            script.documents
        };

        let mut items: VecDeque<AggregateResult<Option<Document>>> =
            documents.into_iter().map(|d| Ok(Some(d))).collect();
        if let Some(n) = script.fail_after {
            items.truncate(n);
            items.push_back(Err(AggregateError::cursor("mock cursor failure")));
        }

        let mut journal = self.journal.lock();
        let index = journal.cursors.len();
        journal.cursors.push(OpenedCursor {
            lineage: self.lineage,
            source: source.name.clone(),
            stages: self.stages.iter().map(|e| e.operation().to_string()).collect(),
            options,
            pulls: 0,
            closes: 0,
        });

        Ok(MockCursor {
            index,
            items,
            journal: self.journal.clone(),
        })
    }
}

impl PipelineExecutor for MockExecutor {
    type Source = MockSource;
    type Cursor = MockCursor;

    fn apply(&self, entry: &ChainEntry) -> AggregateResult<Self> {
        let name = entry.operation().to_string();
        if let Some(source) = &self.source {
            if source.script.lock().failing_operations.contains(&name) {
                return Err(AggregateError::stage(entry.operation(), "rejected by mock"));
            }
        }

        let mut journal = self.journal.lock();
        journal.applied.push(Applied {
            lineage: self.lineage,
            operation: name,
            arguments: entry.arguments().to_vec(),
        });

        let mut next = self.clone();
        next.handle = journal.handle();
        next.stages.push(entry.clone());
        Ok(next)
    }

    fn cursor(&self, options: CursorOptions) -> BoxFuture<'_, AggregateResult<MockCursor>> {
        let result = self.open(options);
        Box::pin(async move { result })
    }

    fn explain(&self) -> BoxFuture<'_, AggregateResult<Document>> {
        let plan = doc! { "stages": self.stages.len() as i64, "handle": self.handle as i64 };
        Box::pin(async move { Ok(plan) })
    }

    fn pipeline(&self) -> Vec<Document> {
        self.stages
            .iter()
            .map(|e| {
                let mut stage = Document::new();
                stage.insert(
                    format!("${}", e.operation()),
                    Bson::Array(e.arguments().to_vec()),
                );
                stage
            })
            .collect()
    }

    fn source(&self) -> Option<&MockSource> {
        self.source.as_ref()
    }

    fn bind(&mut self, source: MockSource) -> AggregateResult<()> {
        self.source = Some(source);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockCursor {
    index: usize,
    items: VecDeque<AggregateResult<Option<Document>>>,
    journal: Arc<Mutex<Journal>>,
}

impl ResultCursor for MockCursor {
    fn next(&mut self) -> BoxFuture<'_, AggregateResult<Option<Document>>> {
        self.journal.lock().cursors[self.index].pulls += 1;
        let item = self.items.pop_front().unwrap_or(Ok(None));
        Box::pin(async move { item })
    }

    fn close(&mut self) -> BoxFuture<'_, AggregateResult<()>> {
        self.journal.lock().cursors[self.index].closes += 1;
        self.items.clear();
        Box::pin(async { Ok(()) })
    }
}
