//! Translation of recorded builder calls into MongoDB pipeline stages and
//! aggregate command options.
//!
//! Translation is pure: a [`PipelineState`] is extended in place and no
//! server is involved, so malformed arguments fail when the stage is
//! applied rather than when the pipeline runs.

use std::time::Duration;

use bson::{Bson, Document, doc};
use mongodb::options::{AggregateOptions, Collation, Hint, ReadConcern};
use storehouse_aggregate::{
    AggregateError, AggregateResult, ChainEntry, CursorOptions, Operation,
};
use tracing::debug;

use crate::config::ReadPreference;
use crate::error::MongoError;

/// A pipeline under construction plus the options the aggregate command
/// will be sent with.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Stage documents, in order.
    pub pipeline: Vec<Document>,
    /// Command options set by option-style verbs.
    pub options: AggregateOptions,
}

impl PipelineState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one builder call and apply it.
    pub fn apply(&mut self, entry: &ChainEntry) -> AggregateResult<()> {
        let op = entry.operation();
        let args = entry.arguments();

        match op {
            Operation::Match => self.push("$match", document(op, args)?),
            Operation::Sort => self.push("$sort", sort_spec(op, single(op, args)?)?),
            Operation::Limit => self.push("$limit", integer(op, single(op, args)?)?),
            Operation::Skip => self.push("$skip", integer(op, single(op, args)?)?),
            Operation::Group => self.push("$group", document(op, args)?),
            Operation::Project => self.push("$project", projection(op, single(op, args)?)?),
            Operation::AddFields => self.push("$addFields", document(op, args)?),
            Operation::Append => {
                let mut stages = Vec::with_capacity(args.len());
                for arg in args {
                    stages.push(raw_stage(op, arg)?);
                }
                self.pipeline.extend(stages);
            }
            Operation::Count => match single(op, args)? {
                Bson::String(field) if !field.is_empty() => self.push("$count", field.as_str()),
                _ => return Err(invalid(op, "expected a non-empty field name")),
            },
            Operation::Facet => self.push("$facet", document(op, args)?),
            Operation::GraphLookup => {
                let mut spec = document(op, args)?;
                if let Some(Bson::String(start)) = spec.get("startWith") {
                    let start = field_path(start);
                    spec.insert("startWith", start);
                }
                self.push("$graphLookup", spec)
            }
            Operation::Lookup => self.push("$lookup", document(op, args)?),
            Operation::Near => self.push("$geoNear", document(op, args)?),
            Operation::Redact => self.push("$redact", redaction(op, args)?),
            Operation::ReplaceRoot => {
                let new_root = match single(op, args)? {
                    Bson::String(path) => Bson::String(field_path(path)),
                    Bson::Document(expr) => Bson::Document(expr.clone()),
                    _ => return Err(invalid(op, "expected a field path or an expression")),
                };
                self.push("$replaceRoot", doc! { "newRoot": new_root })
            }
            Operation::Sample => {
                let size = integer(op, single(op, args)?)?;
                self.push("$sample", doc! { "size": size })
            }
            Operation::Search => self.push("$search", document(op, args)?),
            Operation::SortByCount => {
                let expr = match single(op, args)? {
                    Bson::String(path) => Bson::String(field_path(path)),
                    Bson::Document(expr) => Bson::Document(expr.clone()),
                    _ => return Err(invalid(op, "expected a field path or an expression")),
                };
                self.push("$sortByCount", expr)
            }
            Operation::Unwind => {
                if args.is_empty() {
                    return Err(invalid(op, "expected at least one field path"));
                }
                let mut stages = Vec::with_capacity(args.len());
                for arg in args {
                    let spec = match arg {
                        Bson::String(path) => Bson::String(field_path(path)),
                        Bson::Document(spec) => Bson::Document(spec.clone()),
                        _ => return Err(invalid(op, "expected a field path or an options document")),
                    };
                    stages.push(doc! { "$unwind": spec });
                }
                self.pipeline.extend(stages);
            }
            Operation::AllowDiskUse => match single(op, args)? {
                Bson::Boolean(allow) => self.options.allow_disk_use = Some(*allow),
                _ => return Err(invalid(op, "expected a boolean")),
            },
            Operation::Collation => {
                self.options.collation = Some(collation(op, document(op, args)?)?);
            }
            Operation::Hint => self.options.hint = Some(hint(op, single(op, args)?)?),
            Operation::Option => {
                let options = document(op, args)?;
                self.set_options(op, &options)?;
            }
            Operation::Read => match single(op, args)? {
                Bson::String(mode) => {
                    let pref: ReadPreference = mode
                        .parse()
                        .map_err(|e: MongoError| invalid(op, e.to_string()))?;
                    self.options.selection_criteria = Some(pref.to_selection_criteria());
                }
                _ => return Err(invalid(op, "expected a read preference mode")),
            },
            Operation::ReadConcern => match single(op, args)? {
                Bson::String(level) => self.options.read_concern = Some(read_concern(level)),
                _ => return Err(invalid(op, "expected a read concern level")),
            },
            Operation::Custom(name) => {
                let spec = args.first().cloned().unwrap_or_else(|| Bson::Document(Document::new()));
                let key = if name.starts_with('$') {
                    name.to_string()
                } else {
                    format!("${}", name)
                };
                self.push(&key, spec)
            }
            other => return Err(AggregateError::not_a_stage(other)),
        }

        Ok(())
    }

    /// The command options with cursor options laid over them.
    ///
    /// Honours `batchSize`, `maxTimeMS` and `allowDiskUse`; other keys are
    /// ignored.
    pub fn with_cursor_options(&self, cursor: &CursorOptions) -> AggregateResult<AggregateOptions> {
        let op = Operation::Cursor;
        let mut options = self.options.clone();

        for (key, value) in cursor.as_document() {
            match key.as_str() {
                "batchSize" => {
                    let size = non_negative(&op, key, value)?;
                    options.batch_size = Some(u32::try_from(size).unwrap_or(u32::MAX));
                }
                "maxTimeMS" => {
                    let ms = non_negative(&op, key, value)?;
                    options.max_time = Some(Duration::from_millis(ms));
                }
                "allowDiskUse" => match value {
                    Bson::Boolean(allow) => options.allow_disk_use = Some(*allow),
                    _ => return Err(invalid(&op, "allowDiskUse must be a boolean")),
                },
                other => debug!(option = other, "Ignoring unsupported cursor option"),
            }
        }

        Ok(options)
    }

    fn push(&mut self, stage: &str, spec: impl Into<Bson>) {
        let mut document = Document::new();
        document.insert(stage, spec.into());
        self.pipeline.push(document);
    }

    fn set_options(&mut self, op: &Operation, options: &Document) -> AggregateResult<()> {
        for (key, value) in options {
            match key.as_str() {
                "allowDiskUse" => match value {
                    Bson::Boolean(allow) => self.options.allow_disk_use = Some(*allow),
                    _ => return Err(invalid(op, "allowDiskUse must be a boolean")),
                },
                "maxTimeMS" => {
                    let ms = non_negative(op, key, value)?;
                    self.options.max_time = Some(Duration::from_millis(ms));
                }
                "batchSize" => {
                    let size = non_negative(op, key, value)?;
                    self.options.batch_size = Some(u32::try_from(size).unwrap_or(u32::MAX));
                }
                "collation" => match value {
                    Bson::Document(spec) => {
                        self.options.collation = Some(collation(op, spec.clone())?)
                    }
                    _ => return Err(invalid(op, "collation must be a document")),
                },
                "hint" => self.options.hint = Some(hint(op, value)?),
                "let" => match value {
                    Bson::Document(vars) => self.options.let_vars = Some(vars.clone()),
                    _ => return Err(invalid(op, "let must be a document")),
                },
                other => return Err(invalid(op, format!("unsupported option '{}'", other))),
            }
        }
        Ok(())
    }
}

fn invalid(op: &Operation, message: impl Into<String>) -> AggregateError {
    AggregateError::invalid_argument(op, message)
}

fn single<'a>(op: &Operation, args: &'a [Bson]) -> AggregateResult<&'a Bson> {
    match args {
        [arg] => Ok(arg),
        _ => Err(invalid(
            op,
            format!("expected exactly one argument, got {}", args.len()),
        )),
    }
}

fn document(op: &Operation, args: &[Bson]) -> AggregateResult<Document> {
    match single(op, args)? {
        Bson::Document(doc) => Ok(doc.clone()),
        _ => Err(invalid(op, "expected a document")),
    }
}

fn integer(op: &Operation, value: &Bson) -> AggregateResult<i64> {
    match value {
        Bson::Int32(n) => Ok(i64::from(*n)),
        Bson::Int64(n) => Ok(*n),
        Bson::Double(n) if n.fract() == 0.0 => Ok(*n as i64),
        _ => Err(invalid(op, "expected an integer")),
    }
}

fn non_negative(op: &Operation, key: &str, value: &Bson) -> AggregateResult<u64> {
    integer(op, value)
        .ok()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| invalid(op, format!("{} must be a non-negative integer", key)))
}

/// Prefix a field name with `$` unless it already is a path or variable.
fn field_path(path: &str) -> String {
    if path.starts_with('$') {
        path.to_string()
    } else {
        format!("${}", path)
    }
}

/// `"a -b"` or `{a: "asc", b: "desc"}` into `{a: 1, b: -1}`.
fn sort_spec(op: &Operation, value: &Bson) -> AggregateResult<Document> {
    match value {
        Bson::String(spec) => shorthand(op, spec, -1),
        Bson::Document(spec) => {
            let mut sort = Document::new();
            for (field, direction) in spec {
                let direction = match direction {
                    Bson::String(s) => match s.to_lowercase().as_str() {
                        "asc" | "ascending" | "1" => Bson::Int32(1),
                        "desc" | "descending" | "-1" => Bson::Int32(-1),
                        other => {
                            return Err(invalid(
                                op,
                                format!("invalid sort direction '{}' for '{}'", other, field),
                            ));
                        }
                    },
                    Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Document(_) => {
                        direction.clone()
                    }
                    _ => return Err(invalid(op, format!("invalid sort direction for '{}'", field))),
                };
                sort.insert(field.clone(), direction);
            }
            Ok(sort)
        }
        _ => Err(invalid(op, "expected a document or a string")),
    }
}

/// `"a -b"` into `{a: 1, b: 0}`; documents are used as-is.
fn projection(op: &Operation, value: &Bson) -> AggregateResult<Document> {
    match value {
        Bson::String(spec) => shorthand(op, spec, 0),
        Bson::Document(spec) => Ok(spec.clone()),
        _ => Err(invalid(op, "expected a document or a string")),
    }
}

fn shorthand(op: &Operation, spec: &str, negated: i32) -> AggregateResult<Document> {
    let mut out = Document::new();
    for field in spec.split_whitespace() {
        let (name, value) = match field.strip_prefix('-') {
            Some(name) => (name, negated),
            None => (field.strip_prefix('+').unwrap_or(field), 1),
        };
        if name.is_empty() {
            return Err(invalid(op, format!("missing field name in '{}'", field)));
        }
        out.insert(name, value);
    }
    Ok(out)
}

/// A raw stage must be a document with exactly one operator key.
fn raw_stage(op: &Operation, value: &Bson) -> AggregateResult<Document> {
    match value {
        Bson::Document(stage)
            if stage.len() == 1 && stage.keys().all(|k| k.starts_with('$')) =>
        {
            Ok(stage.clone())
        }
        _ => Err(invalid(
            op,
            "each stage must be a document with a single operator key",
        )),
    }
}

/// One expression, or `(if, then, else)` folded into `$cond`.
fn redaction(op: &Operation, args: &[Bson]) -> AggregateResult<Bson> {
    match args {
        [expression] => Ok(expression.clone()),
        [condition, then, otherwise] => Ok(Bson::Document(doc! {
            "$cond": {
                "if": condition.clone(),
                "then": system_variable(then),
                "else": system_variable(otherwise),
            }
        })),
        _ => Err(invalid(
            op,
            format!("expected 1 or 3 arguments, got {}", args.len()),
        )),
    }
}

/// `"PRUNE"` into `"$$PRUNE"`.
fn system_variable(value: &Bson) -> Bson {
    match value {
        Bson::String(name) if !name.starts_with("$$") => {
            Bson::String(format!("$${}", name.trim_start_matches('$')))
        }
        other => other.clone(),
    }
}

fn collation(op: &Operation, spec: Document) -> AggregateResult<Collation> {
    bson::from_document(spec).map_err(|e| invalid(op, format!("invalid collation: {}", e)))
}

fn hint(op: &Operation, value: &Bson) -> AggregateResult<Hint> {
    match value {
        Bson::Document(keys) => Ok(Hint::Keys(keys.clone())),
        Bson::String(name) => Ok(Hint::Name(name.clone())),
        _ => Err(invalid(op, "expected an index key pattern or name")),
    }
}

fn read_concern(level: &str) -> ReadConcern {
    match level {
        "local" | "l" => ReadConcern::local(),
        "majority" | "m" => ReadConcern::majority(),
        "linearizable" | "lz" => ReadConcern::linearizable(),
        "available" | "a" => ReadConcern::available(),
        "snapshot" | "s" => ReadConcern::snapshot(),
        other => ReadConcern::custom(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use storehouse_aggregate::ErrorCode;

    fn apply(state: &mut PipelineState, op: Operation, args: Vec<Bson>) -> AggregateResult<()> {
        state.apply(&ChainEntry::new(op, args))
    }

    fn pipeline_of(calls: Vec<(Operation, Vec<Bson>)>) -> Vec<Document> {
        let mut state = PipelineState::new();
        for (op, args) in calls {
            apply(&mut state, op, args).unwrap();
        }
        state.pipeline
    }

    #[test]
    fn test_basic_stages() {
        let pipeline = pipeline_of(vec![
            (Operation::Match, vec![doc! { "rated": "PG" }.into()]),
            (Operation::Group, vec![doc! { "_id": "$year", "n": { "$sum": 1 } }.into()]),
            (Operation::Skip, vec![Bson::Int32(5)]),
            (Operation::Limit, vec![Bson::Int64(10)]),
            (Operation::Count, vec!["total".into()]),
        ]);

        assert_eq!(
            pipeline,
            vec![
                doc! { "$match": { "rated": "PG" } },
                doc! { "$group": { "_id": "$year", "n": { "$sum": 1 } } },
                doc! { "$skip": 5_i64 },
                doc! { "$limit": 10_i64 },
                doc! { "$count": "total" },
            ]
        );
    }

    #[test]
    fn test_sort_shorthand_and_directions() {
        let pipeline = pipeline_of(vec![
            (Operation::Sort, vec!["-year title".into()]),
            (Operation::Sort, vec![doc! { "year": "desc", "title": "asc", "score": { "$meta": "textScore" } }.into()]),
        ]);

        assert_eq!(pipeline[0], doc! { "$sort": { "year": -1, "title": 1 } });
        assert_eq!(
            pipeline[1],
            doc! { "$sort": { "year": -1, "title": 1, "score": { "$meta": "textScore" } } }
        );

        let mut state = PipelineState::new();
        let err = apply(&mut state, Operation::Sort, vec![doc! { "year": "sideways" }.into()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_project_shorthand() {
        let pipeline = pipeline_of(vec![(Operation::Project, vec!["title -_id".into()])]);
        assert_eq!(pipeline, vec![doc! { "$project": { "title": 1, "_id": 0 } }]);
    }

    #[test]
    fn test_shorthand_rejects_bare_signs() {
        for (op, spec) in [
            (Operation::Sort, "year -"),
            (Operation::Sort, "+"),
            (Operation::Project, "- title"),
        ] {
            let mut state = PipelineState::new();
            let err = apply(&mut state, op.clone(), vec![spec.into()]).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidArgument, "{spec}");
            assert!(state.pipeline.is_empty());
        }

        let pipeline = pipeline_of(vec![(Operation::Sort, vec!["+title -year".into()])]);
        assert_eq!(pipeline, vec![doc! { "$sort": { "title": 1, "year": -1 } }]);
    }

    #[test]
    fn test_unwind_is_variadic() {
        let pipeline = pipeline_of(vec![(
            Operation::Unwind,
            vec![
                "cast".into(),
                "$genres".into(),
                doc! { "path": "$awards", "preserveNullAndEmptyArrays": true }.into(),
            ],
        )]);

        assert_eq!(
            pipeline,
            vec![
                doc! { "$unwind": "$cast" },
                doc! { "$unwind": "$genres" },
                doc! { "$unwind": { "path": "$awards", "preserveNullAndEmptyArrays": true } },
            ]
        );
    }

    #[test]
    fn test_field_path_prefixing() {
        let pipeline = pipeline_of(vec![
            (Operation::ReplaceRoot, vec!["details".into()]),
            (Operation::ReplaceRoot, vec![doc! { "$mergeObjects": ["$a", "$b"] }.into()]),
            (Operation::SortByCount, vec!["genre".into()]),
            (
                Operation::GraphLookup,
                vec![doc! { "from": "people", "startWith": "reportsTo", "as": "chain" }.into()],
            ),
        ]);

        assert_eq!(pipeline[0], doc! { "$replaceRoot": { "newRoot": "$details" } });
        assert_eq!(
            pipeline[1],
            doc! { "$replaceRoot": { "newRoot": { "$mergeObjects": ["$a", "$b"] } } }
        );
        assert_eq!(pipeline[2], doc! { "$sortByCount": "$genre" });
        assert_eq!(
            pipeline[3].get_document("$graphLookup").unwrap().get_str("startWith").unwrap(),
            "$reportsTo"
        );
    }

    #[test]
    fn test_redact_forms() {
        let pipeline = pipeline_of(vec![
            (Operation::Redact, vec!["$$KEEP".into()]),
            (
                Operation::Redact,
                vec![doc! { "$eq": ["$level", 5] }.into(), "PRUNE".into(), "$$DESCEND".into()],
            ),
        ]);

        assert_eq!(pipeline[0], doc! { "$redact": "$$KEEP" });
        assert_eq!(
            pipeline[1],
            doc! { "$redact": { "$cond": {
                "if": { "$eq": ["$level", 5] },
                "then": "$$PRUNE",
                "else": "$$DESCEND",
            } } }
        );

        let mut state = PipelineState::new();
        let err = apply(&mut state, Operation::Redact, vec!["a".into(), "b".into()]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_append_requires_operator_documents() {
        let pipeline = pipeline_of(vec![(
            Operation::Append,
            vec![doc! { "$match": {} }.into(), doc! { "$limit": 1 }.into()],
        )]);
        assert_eq!(pipeline, vec![doc! { "$match": {} }, doc! { "$limit": 1 }]);

        let mut state = PipelineState::new();
        let err = apply(
            &mut state,
            Operation::Append,
            vec![doc! { "$match": {} }.into(), doc! { "match": {} }.into()],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert!(state.pipeline.is_empty());
    }

    #[test]
    fn test_misc_stages() {
        let pipeline = pipeline_of(vec![
            (Operation::Sample, vec![Bson::Int32(3)]),
            (Operation::Near, vec![doc! { "near": [0.0, 0.0], "distanceField": "d" }.into()]),
            (Operation::Facet, vec![doc! { "byYear": [{ "$count": "n" }] }.into()]),
            (Operation::Search, vec![doc! { "text": { "query": "alien", "path": "title" } }.into()]),
            (Operation::AddFields, vec![doc! { "decade": 1990 }.into()]),
            (Operation::custom("$densify"), vec![doc! { "field": "year" }.into()]),
            (Operation::custom("indexStats"), vec![]),
        ]);

        assert_eq!(pipeline[0], doc! { "$sample": { "size": 3_i64 } });
        assert!(pipeline[1].contains_key("$geoNear"));
        assert!(pipeline[2].contains_key("$facet"));
        assert!(pipeline[3].contains_key("$search"));
        assert!(pipeline[4].contains_key("$addFields"));
        assert_eq!(pipeline[5], doc! { "$densify": { "field": "year" } });
        assert_eq!(pipeline[6], doc! { "$indexStats": {} });
    }

    #[test]
    fn test_option_verbs_do_not_add_stages() {
        let mut state = PipelineState::new();
        apply(&mut state, Operation::AllowDiskUse, vec![true.into()]).unwrap();
        apply(&mut state, Operation::Hint, vec!["year_1".into()]).unwrap();
        apply(&mut state, Operation::Collation, vec![doc! { "locale": "fr" }.into()])
            .unwrap();
        apply(&mut state, Operation::Read, vec!["secondaryPreferred".into()]).unwrap();
        apply(&mut state, Operation::ReadConcern, vec!["majority".into()]).unwrap();
        apply(
            &mut state,
            Operation::Option,
            vec![doc! { "maxTimeMS": 1500, "batchSize": 50, "let": { "min": 3 } }.into()],
        )
        .unwrap();

        assert!(state.pipeline.is_empty());
        assert_eq!(state.options.allow_disk_use, Some(true));
        assert!(matches!(state.options.hint, Some(Hint::Name(ref n)) if n == "year_1"));
        assert_eq!(
            state.options.collation.as_ref().map(|c| c.locale.as_str()),
            Some("fr")
        );
        assert!(state.options.selection_criteria.is_some());
        assert!(state.options.read_concern.is_some());
        assert_eq!(state.options.max_time, Some(Duration::from_millis(1500)));
        assert_eq!(state.options.batch_size, Some(50));
        assert_eq!(state.options.let_vars, Some(doc! { "min": 3 }));
    }

    #[test]
    fn test_invalid_arguments() {
        let cases = vec![
            (Operation::Match, vec![]),
            (Operation::Match, vec!["rated".into()]),
            (Operation::Limit, vec!["ten".into()]),
            (Operation::Limit, vec![Bson::Double(2.5)]),
            (Operation::Count, vec!["".into()]),
            (Operation::Unwind, vec![]),
            (Operation::AllowDiskUse, vec!["yes".into()]),
            (Operation::Collation, vec!["fr".into()]),
            (Operation::Read, vec!["everywhere".into()]),
            (Operation::Option, vec![doc! { "comment": "x" }.into()]),
            (Operation::Option, vec![doc! { "maxTimeMS": -1 }.into()]),
        ];

        for (op, args) in cases {
            let mut state = PipelineState::new();
            let err = apply(&mut state, op.clone(), args).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidArgument, "{op}");
            assert_eq!(err.operation.as_deref(), Some(op.name()));
        }
    }

    #[test]
    fn test_cursor_options_overlay() {
        let mut state = PipelineState::new();
        apply(&mut state, Operation::AllowDiskUse, vec![false.into()]).unwrap();
        apply(&mut state, Operation::Option, vec![doc! { "batchSize": 10 }.into()]).unwrap();

        let options = state
            .with_cursor_options(
                &CursorOptions::new()
                    .set("batchSize", 200)
                    .set("maxTimeMS", 250_i64)
                    .set("tailable", true),
            )
            .unwrap();

        assert_eq!(options.batch_size, Some(200));
        assert_eq!(options.max_time, Some(Duration::from_millis(250)));
        assert_eq!(options.allow_disk_use, Some(false));
        assert_eq!(state.options.batch_size, Some(10));

        let err = state
            .with_cursor_options(&CursorOptions::new().set("batchSize", -5))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_non_stage_operations_are_rejected() {
        let mut state = PipelineState::new();
        let err = apply(&mut state, Operation::Exec, vec![]).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAStage);
    }
}
