//! Integration tests for batched resolution.
//!
//! These tests verify, against both the in-memory and the SQLite loader:
//! - The 7-user fixture resolves in five fetches over three levels
//! - Fetch counts depend on the query shape, not on the row count
//! - Ordering, self-referential traversal and id-only selections
//! - Pre-flight errors, branch-local loader failures and cancellation

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{fixture_data, fixture_query, social_schema, social_sqlite, social_store, usernames};
use strata::query::{
    CancelToken, ErrorCode, MemoryLoader, Query, RelationLoader, Resolver, ResolverOptions,
    ResponseValue, Selection, Value,
};

fn memory_resolver() -> Resolver<MemoryLoader> {
    Resolver::new(social_schema(), MemoryLoader::new(social_store()))
}

async fn resolve_both(query: &Query) -> (strata::Response, strata::Response) {
    let memory = memory_resolver().resolve(query).await.expect("memory resolution");
    let sqlite = Resolver::new(social_schema(), social_sqlite().await)
        .resolve(query)
        .await
        .expect("sqlite resolution");
    (memory, sqlite)
}

#[tokio::test]
async fn test_fixture_scenario_memory() {
    let resolver = memory_resolver();
    let response = resolver.resolve(&fixture_query()).await.unwrap();

    assert_eq!(response.to_json()["data"], fixture_data());
    assert!(response.errors.is_empty());
    assert_eq!(response.cost.fetches, 5);
    assert_eq!(response.cost.root_fetches, 1);
    assert_eq!(response.cost.batch_fetches, 4);
    assert_eq!(response.cost.levels, 3);
    assert_eq!(resolver.loader().calls(), 5);
}

#[tokio::test]
async fn test_fixture_scenario_sqlite() {
    let loader = social_sqlite().await;
    let resolver = Resolver::new(social_schema(), loader.clone());
    let response = resolver.resolve(&fixture_query()).await.unwrap();

    assert_eq!(response.to_json()["data"], fixture_data());
    assert_eq!(response.cost.fetches, 5);
    assert_eq!(loader.statements(), 5);
}

#[tokio::test]
async fn test_fetch_count_is_independent_of_row_count() {
    let query = Query::from(
        Selection::new("users")
            .child(Selection::new("username"))
            .child(
                Selection::new("following")
                    .child(Selection::new("followers").child(Selection::new("username"))),
            ),
    );

    let resolver = memory_resolver();
    let all = resolver.resolve(&query).await.unwrap();

    let narrowed = Query::from(Selection {
        arguments: [("usernames".into(), Value::from(vec!["user5"]))].into_iter().collect(),
        ..query.selections[0].clone()
    });
    let one = resolver.resolve(&narrowed).await.unwrap();

    assert_eq!(all.pointer("users").and_then(ResponseValue::as_list).map(<[_]>::len), Some(7));
    assert_eq!(one.pointer("users").and_then(ResponseValue::as_list).map(<[_]>::len), Some(1));
    assert_eq!(all.cost.fetches, 3);
    assert_eq!(one.cost.fetches, 3);
    assert!(all.cost.rows_loaded > one.cost.rows_loaded);
}

#[tokio::test]
async fn test_parent_keys_are_deduplicated() {
    // fourteen level-2 objects, but only seven distinct users among them
    let query = Query::from(
        Selection::new("users").child(
            Selection::new("following")
                .child(Selection::new("username"))
                .child(Selection::new("following").child(Selection::new("username"))),
        ),
    );
    let response = memory_resolver().resolve(&query).await.unwrap();

    assert_eq!(response.cost.fetches, 3);
    assert_eq!(response.cost.keys_requested, 14);
    assert_eq!(usernames(response.pointer("users.5.following")), vec!["user2", "user3", "user7"]);
    assert_eq!(
        usernames(response.pointer("users.0.following.0.following")),
        usernames(response.pointer("users.5.following.0.following"))
    );
}

#[tokio::test]
async fn test_loaders_agree() {
    let query = Query::from(
        Selection::new("posts")
            .child(Selection::new("content"))
            .child(Selection::new("author").child(Selection::new("username")))
            .child(Selection::new("likedBy").child(Selection::new("username"))),
    );
    let (memory, sqlite) = resolve_both(&query).await;

    assert_eq!(memory.to_json(), sqlite.to_json());
    assert_eq!(memory.cost, sqlite.cost);
    assert_eq!(
        memory.pointer("posts.2").map(ResponseValue::to_json),
        Some(json!({
            "content": "foo bar",
            "author": {"username": "user6"},
            "likedBy": [{"username": "user1"}],
        }))
    );
}

#[tokio::test]
async fn test_self_referential_traversal_alternates() {
    // following -> followers -> following, all on User
    let query = Query::from(
        Selection::new("users").arg("usernames", vec!["user4"]).child(
            Selection::new("following").child(
                Selection::new("followers")
                    .child(Selection::new("username"))
                    .child(Selection::new("following").child(Selection::new("username"))),
            ),
        ),
    );
    let (memory, sqlite) = resolve_both(&query).await;

    assert_eq!(memory.to_json(), sqlite.to_json());
    assert_eq!(memory.cost.fetches, 4);
    // user4 follows user3 and user5; user3 is followed by user1, user4 and user6
    assert_eq!(
        usernames(memory.pointer("users.0.following.0.followers")),
        vec!["user1", "user4", "user6"]
    );
    assert_eq!(
        usernames(memory.pointer("users.0.following.0.followers.2.following")),
        vec!["user2", "user3", "user7"]
    );
}

#[tokio::test]
async fn test_filters_split_partitions() {
    let query = Query::from(
        Selection::new("users")
            .arg("usernames", vec!["user1", "user6"])
            .child(Selection::new("following").alias("all").child(Selection::new("username")))
            .child(
                Selection::new("following")
                    .alias("two")
                    .arg("username", "user2")
                    .child(Selection::new("username")),
            ),
    );
    let (memory, sqlite) = resolve_both(&query).await;

    assert_eq!(memory.to_json(), sqlite.to_json());
    assert_eq!(memory.cost.fetches, 3);
    assert_eq!(usernames(memory.pointer("users.0.all")), vec!["user2", "user3", "user4"]);
    assert_eq!(usernames(memory.pointer("users.0.two")), vec!["user2"]);
    assert_eq!(usernames(memory.pointer("users.1.two")), vec!["user2"]);
}

#[tokio::test]
async fn test_argument_order_does_not_split_partitions() {
    let branch = |alias: &str, first: (&str, Value), second: (&str, Value)| {
        Selection::new("following")
            .alias(alias)
            .arg(first.0, first.1)
            .arg(second.0, second.1)
            .child(Selection::new("username"))
    };
    let query = Query::from(
        Selection::new("users")
            .child(branch(
                "a",
                ("username", Value::from("user2")),
                ("usernames", Value::from(vec!["user2", "user3"])),
            ))
            .child(branch(
                "b",
                ("usernames", Value::from(vec!["user2", "user3"])),
                ("username", Value::from("user2")),
            )),
    );
    let response = memory_resolver().resolve(&query).await.unwrap();

    assert_eq!(response.cost.fetches, 2);
    assert_eq!(usernames(response.pointer("users.0.a")), vec!["user2"]);
    assert_eq!(response.pointer("users.0.a"), response.pointer("users.0.b"));
}

#[tokio::test]
async fn test_multiple_roots_merge_level_one() {
    let query = Query::new()
        .select(
            Selection::new("users")
                .alias("alice")
                .arg("usernames", vec!["user1"])
                .child(Selection::new("following").child(Selection::new("username"))),
        )
        .select(
            Selection::new("users")
                .alias("bob")
                .arg("usernames", vec!["user2"])
                .child(Selection::new("following").child(Selection::new("username"))),
        );
    let (memory, sqlite) = resolve_both(&query).await;

    assert_eq!(memory.to_json(), sqlite.to_json());
    assert_eq!(memory.cost.root_fetches, 2);
    assert_eq!(memory.cost.batch_fetches, 1);
    assert_eq!(memory.data.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["alice", "bob"]);
    assert_eq!(usernames(memory.pointer("bob.0.following")), vec!["user1", "user6"]);
}

#[tokio::test]
async fn test_id_only_selections() {
    let query = Query::from(
        Selection::new("posts")
            .child(Selection::new("author"))
            .child(Selection::new("likedBy")),
    );
    let (memory, sqlite) = resolve_both(&query).await;

    assert_eq!(memory.to_json(), sqlite.to_json());
    assert_eq!(
        memory.to_json()["data"]["posts"],
        json!([
            {"author": 2, "likedBy": [1]},
            {"author": 3, "likedBy": [1]},
            {"author": 6, "likedBy": [1]},
        ])
    );
}

#[tokio::test]
async fn test_empty_relationships_are_empty_lists() {
    let query = Query::from(
        Selection::new("users")
            .arg("usernames", vec!["user5"])
            .child(Selection::new("posts").child(Selection::new("content")))
            .child(Selection::new("likes").child(Selection::new("content"))),
    );
    let response = memory_resolver().resolve(&query).await.unwrap();
    assert_eq!(
        response.to_json()["data"],
        json!({"users": [{"posts": [], "likes": []}]})
    );
}

#[tokio::test]
async fn test_unknown_field_issues_no_statement() {
    let loader = social_sqlite().await;
    let resolver = Resolver::new(social_schema(), loader.clone());
    let query = Query::from(
        Selection::new("users").child(
            Selection::new("following").child(Selection::new("followers").child(Selection::new("email"))),
        ),
    );

    let err = resolver.resolve(&query).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownField);
    assert_eq!(err.context.path.as_deref(), Some("users.following.followers.email"));
    assert_eq!(loader.statements(), 0);
}

#[tokio::test]
async fn test_depth_limit() {
    let mut selection = Selection::new("username");
    for _ in 0..12 {
        selection = Selection::new("following").child(selection);
    }
    let query = Query::from(Selection::new("users").child(selection));

    let resolver = memory_resolver();
    let err = resolver.resolve(&query).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CycleDepthExceeded);
    assert_eq!(resolver.loader().calls(), 0);

    let relaxed = Resolver::new(social_schema(), MemoryLoader::new(social_store()))
        .with_options(ResolverOptions::default().with_max_depth(13));
    assert!(relaxed.resolve(&query).await.is_ok());
}

#[tokio::test]
async fn test_loader_failure_keeps_sibling_branches() {
    let resolver = memory_resolver();
    resolver.loader().fail("User.followers");

    let response = resolver.resolve(&fixture_query()).await.unwrap();
    let body = response.to_json();

    assert_eq!(body["data"]["users"][0]["likes"], fixture_data()["users"][0]["likes"]);
    assert_eq!(body["data"]["users"][0]["following"][0]["followers"], json!(null));
    assert_eq!(response.errors.len(), 3);
    assert!(response.errors.iter().all(|e| e.code == ErrorCode::LoaderUnavailable));
    assert_eq!(
        body["errors"][2]["path"],
        json!(["users", 0, "following", 2, "followers"])
    );
    assert_eq!(response.cost.fetches, 5);
}

#[tokio::test]
async fn test_sqlite_failure_is_loader_unavailable() {
    let loader = social_sqlite().await;
    loader.execute_batch("DROP TABLE likes").await.unwrap();
    let resolver = Resolver::new(social_schema(), loader);

    let response = resolver.resolve(&fixture_query()).await.unwrap();
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code, ErrorCode::LoaderUnavailable);
    assert_eq!(response.errors[0].path_string(), "users.0.likes");
    assert_eq!(
        usernames(response.pointer("users.0.following")),
        vec!["user2", "user3", "user4"]
    );
}

#[tokio::test]
async fn test_cancelled_resolution_returns_nothing() {
    let loader = MemoryLoader::new(social_store()).with_latency(Duration::from_millis(100));
    let resolver = Arc::new(Resolver::new(social_schema(), loader));
    let cancel = CancelToken::new();

    let handle = {
        let resolver = Arc::clone(&resolver);
        let cancel = cancel.clone();
        tokio::spawn(async move { resolver.resolve_with_cancel(&fixture_query(), &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::Cancelled);
    // root level and level 1 had started; level 2 never did
    assert_eq!(resolver.loader().calls(), 3);
}

#[tokio::test]
async fn test_json_query_input() {
    let query = Query::from_json(
        r#"[{"field": "users", "arguments": {"usernames": ["user7"]}, "children": [
            {"field": "username"},
            {"alias": "fans", "field": "followers", "children": [{"field": "username"}]}
        ]}]"#,
    )
    .unwrap();
    let response = memory_resolver().resolve(&query).await.unwrap();

    assert_eq!(
        response.to_json(),
        json!({"data": {"users": [{"username": "user7", "fans": [{"username": "user6"}]}]}})
    );
}

#[tokio::test]
async fn test_resolver_over_shared_loader() {
    let loader = Arc::new(MemoryLoader::new(social_store()));
    let first = Resolver::new(social_schema(), Arc::clone(&loader));
    let second = Resolver::new(social_schema(), Arc::clone(&loader));

    let (query_a, query_b) = (fixture_query(), fixture_query());
    let (a, b) = tokio::join!(first.resolve(&query_a), second.resolve(&query_b));
    assert_eq!(a.unwrap().cost.fetches, 5);
    assert_eq!(b.unwrap().cost.fetches, 5);
    assert_eq!(loader.calls(), 10);
}

#[tokio::test]
async fn test_boxed_loader() {
    let loader: Box<dyn RelationLoader> = Box::new(MemoryLoader::new(social_store()));
    let resolver = Resolver::new(social_schema(), loader);
    let response = resolver.resolve(&fixture_query()).await.unwrap();
    assert_eq!(response.to_json()["data"], fixture_data());
}

#[tokio::test]
async fn test_merged_aliases_keep_their_own_shape() {
    let query = Query::from(
        Selection::new("users")
            .arg("usernames", vec!["user1"])
            .child(Selection::new("followers").alias("a").child(Selection::new("id")))
            .child(Selection::new("followers").alias("b").child(Selection::new("username")))
            .child(Selection::new("followers").alias("c"))
            .child(
                Selection::new("followers").alias("d").child(
                    Selection::new("following").child(Selection::new("username")),
                ),
            ),
    );
    let expected = json!({"users": [{
        "a": [{"id": 2}, {"id": 5}, {"id": 7}],
        "b": [{"username": "user2"}, {"username": "user5"}, {"username": "user7"}],
        "c": [2, 5, 7],
        "d": [
            {"following": [{"username": "user1"}, {"username": "user6"}]},
            {"following": [{"username": "user1"}]},
            {"following": [{"username": "user1"}, {"username": "user2"}]},
        ],
    }]});

    let (memory, sqlite) = resolve_both(&query).await;
    for response in [&memory, &sqlite] {
        assert_eq!(response.to_json()["data"], expected);
        assert!(response.errors.is_empty());
        // root, one merged followers batch, then d's following
        assert_eq!(response.cost.fetches, 3);
        assert_eq!(response.cost.levels, 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resolutions_run_on_spawned_tasks() {
    let resolver = Arc::new(memory_resolver());

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve(&fixture_query()).await })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.to_json()["data"], fixture_data());
        assert_eq!(response.cost.fetches, 5);
    }
    assert_eq!(resolver.loader().calls(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sqlite_resolution_on_spawned_task() {
    let resolver = Resolver::new(social_schema(), social_sqlite().await);
    let response = tokio::spawn(async move { resolver.resolve(&fixture_query()).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.to_json()["data"], fixture_data());
}
