//! Integration tests for the MongoDB backend through the facade crate.
//!
//! These tests verify, without a running server:
//! - Configuration loading and model registration
//! - Pipeline translation for builders obtained from the manager
//! - Independence of builders over the same model

use pretty_assertions::assert_eq;
use storehouse::ErrorCode;
use storehouse::prelude::*;

const CONFIG: &str = r#"
    name = "catalog"
    uri = "mongodb://localhost:27017"
    database = "cinema"
    server_selection_timeout_ms = 200

    [[models]]
    name = "Movie"

    [[models]]
    name = "Review"
    collection = "movie_reviews"
"#;

fn manager() -> MongoManager {
    let config = MongoConfig::from_toml_str(CONFIG).expect("Failed to parse config");
    MongoManager::new(config).expect("Failed to create manager")
}

#[tokio::test]
async fn test_manager_resolves_registered_models() {
    let manager = manager();
    assert_eq!(manager.name(), "catalog");
    assert_eq!(manager.model_names(), vec!["Movie", "Review"]);

    let movies = manager.model("Movie").await.unwrap();
    assert_eq!(movies.name(), "Movie");
    assert_eq!(movies.collection_name(), "movies");

    let err = manager.model("Actor").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_paginated_listing_pipeline() {
    let manager = manager();
    let mut agg = manager.aggregation("Movie").await.unwrap();

    agg.r#match(doc! { "year": { "$gte": 1990 } })
        .unwrap()
        .project("title year -_id")
        .unwrap()
        .sort("-year title")
        .unwrap()
        .skip(20)
        .unwrap()
        .limit(10)
        .unwrap();

    assert_eq!(
        agg.pipeline(),
        vec![
            doc! { "$match": { "year": { "$gte": 1990 } } },
            doc! { "$project": { "title": 1, "year": 1, "_id": 0 } },
            doc! { "$sort": { "year": -1, "title": 1 } },
            doc! { "$skip": 20_i64 },
            doc! { "$limit": 10_i64 },
        ]
    );
    assert_eq!(
        agg.chain().operations(),
        vec!["match", "project", "sort", "skip", "limit"]
    );
}

#[tokio::test]
async fn test_invoke_by_name_matches_typed_verbs() {
    let manager = manager();

    let mut typed = manager.aggregation("Review").await.unwrap();
    typed
        .unwind(["tags"])
        .unwrap()
        .sort_by_count("tags")
        .unwrap();

    let mut named = manager.aggregation("Review").await.unwrap();
    named
        .invoke("unwind", vec!["tags".into()])
        .unwrap()
        .invoke("sortByCount", vec!["tags".into()])
        .unwrap();

    assert_eq!(typed.pipeline(), named.pipeline());
    assert_eq!(
        typed.pipeline(),
        vec![doc! { "$unwind": "$tags" }, doc! { "$sortByCount": "$tags" }]
    );
}

#[tokio::test]
async fn test_builders_over_one_model_are_independent() {
    let manager = manager();
    let movies = manager.model("Movie").await.unwrap();

    let mut first = movies.aggregation();
    let mut second = movies.aggregation();
    first.limit(1).unwrap();
    second.sample(3).unwrap();

    assert_eq!(first.pipeline(), vec![doc! { "$limit": 1_i64 }]);
    assert_eq!(second.pipeline(), vec![doc! { "$sample": { "size": 3_i64 } }]);
}

#[tokio::test]
async fn test_count_after_count_stage_fails_before_contacting_server() {
    let manager = manager();
    let mut agg = manager.aggregation("Movie").await.unwrap();
    agg.count("total").unwrap();

    let err = agg.count_documents().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NestedCount);
}
