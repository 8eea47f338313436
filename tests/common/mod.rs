//! Shared fixture: seven users, fourteen follows, three posts and three likes,
//! available as an in-memory store and as a seeded SQLite database.

#![allow(dead_code)]

use std::sync::Arc;

use strata::query::{MemoryStore, Query, ResponseValue, Selection, Value};
use strata::schema::{
    ArgumentDef, EntityType, JoinSpec, RelationshipDef, RootField, ScalarField, ScalarType, Schema,
};
use strata::sqlite::SqliteLoader;

/// (follower, followee), in join row order.
pub const FOLLOWS: [(i64, i64); 14] = [
    (1, 2),
    (1, 3),
    (1, 4),
    (2, 1),
    (2, 6),
    (3, 2),
    (4, 3),
    (4, 5),
    (5, 1),
    (6, 2),
    (6, 3),
    (6, 7),
    (7, 1),
    (7, 2),
];

/// (id, author, content).
pub const POSTS: [(i64, i64, &str); 3] = [(1, 2, "lorem ipsum"), (2, 3, "dolorum"), (3, 6, "foo bar")];

/// (user, post), in join row order.
pub const LIKES: [(i64, i64); 3] = [(1, 1), (1, 2), (1, 3)];

const SCHEMA_SQL: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL UNIQUE);
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        author_id INTEGER NOT NULL REFERENCES users(id),
        content TEXT NOT NULL
    );
    CREATE TABLE follows (
        id INTEGER PRIMARY KEY,
        follower_id INTEGER NOT NULL REFERENCES users(id),
        followee_id INTEGER NOT NULL REFERENCES users(id)
    );
    CREATE TABLE likes (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        post_id INTEGER NOT NULL REFERENCES posts(id)
    );
";

pub fn social_schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .register_type(
            EntityType::new("User", "users").field(ScalarField::new("username", ScalarType::String)),
        )
        .register_type(
            EntityType::new("Post", "posts").field(ScalarField::new("content", ScalarType::String)),
        )
        .register_type(EntityType::new("Follow", "follows"))
        .register_type(EntityType::new("Like", "likes"))
        .register_relationship(
            "Post",
            "author",
            RelationshipDef::to_one("User", "author_id").inverse("posts"),
        )
        .register_relationship(
            "User",
            "following",
            RelationshipDef::many_to_many("User", JoinSpec::new("Follow", "follower_id", "followee_id"))
                .inverse("followers")
                .argument(ArgumentDef::equals("username", "username"))
                .argument(ArgumentDef::any_of("usernames", "username"))
                .inverse_argument(ArgumentDef::equals("username", "username"))
                .inverse_argument(ArgumentDef::any_of("usernames", "username")),
        )
        .register_relationship(
            "User",
            "likes",
            RelationshipDef::many_to_many("Post", JoinSpec::new("Like", "user_id", "post_id"))
                .inverse("likedBy")
                .argument(ArgumentDef::equals("content", "content")),
        )
        .register_root(
            RootField::new("users", "User").argument(ArgumentDef::any_of("usernames", "username")),
        )
        .register_root(RootField::new("posts", "Post"))
        .build()
        .expect("fixture schema is valid");
    Arc::new(schema)
}

pub fn social_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for id in 1..=7i64 {
        store.insert("users", [("id", Value::Int(id)), ("username", Value::from(format!("user{}", id)))]);
    }
    for (index, (follower, followee)) in FOLLOWS.into_iter().enumerate() {
        store.insert(
            "follows",
            [
                ("id", Value::Int(index as i64 + 1)),
                ("follower_id", Value::Int(follower)),
                ("followee_id", Value::Int(followee)),
            ],
        );
    }
    for (id, author, content) in POSTS {
        store.insert(
            "posts",
            [("id", Value::Int(id)), ("author_id", Value::Int(author)), ("content", Value::from(content))],
        );
    }
    for (index, (user, post)) in LIKES.into_iter().enumerate() {
        store.insert(
            "likes",
            [
                ("id", Value::Int(index as i64 + 1)),
                ("user_id", Value::Int(user)),
                ("post_id", Value::Int(post)),
            ],
        );
    }
    store
}

/// An in-memory SQLite database holding the same rows as [`social_store`].
pub async fn social_sqlite() -> SqliteLoader {
    let loader = SqliteLoader::open_in_memory().await.expect("open sqlite");
    seed_sqlite(&loader).await;
    loader
}

/// Create the fixture tables in `loader`'s database and copy the store rows.
pub async fn seed_sqlite(loader: &SqliteLoader) {
    loader.execute_batch(SCHEMA_SQL).await.expect("create tables");

    let store = social_store();
    for table in ["users", "posts", "follows", "likes"] {
        for row in store.rows(table) {
            loader
                .insert(table, row.iter().map(|(column, value)| (column.as_str(), value.clone())))
                .await
                .expect("insert fixture row");
        }
    }
}

/// users(usernames: ["user1"]) { username following { username followers { username } }
/// likes { author { username } content } }
pub fn fixture_query() -> Query {
    Query::from(
        Selection::new("users")
            .arg("usernames", vec!["user1"])
            .child(Selection::new("username"))
            .child(
                Selection::new("following")
                    .child(Selection::new("username"))
                    .child(Selection::new("followers").child(Selection::new("username"))),
            )
            .child(
                Selection::new("likes")
                    .child(Selection::new("author").child(Selection::new("username")))
                    .child(Selection::new("content")),
            ),
    )
}

/// The expected `data` for [`fixture_query`].
pub fn fixture_data() -> serde_json::Value {
    serde_json::json!({"users": [{
        "username": "user1",
        "following": [
            {"username": "user2", "followers": [
                {"username": "user1"}, {"username": "user3"},
                {"username": "user6"}, {"username": "user7"},
            ]},
            {"username": "user3", "followers": [
                {"username": "user1"}, {"username": "user4"}, {"username": "user6"},
            ]},
            {"username": "user4", "followers": [{"username": "user1"}]},
        ],
        "likes": [
            {"author": {"username": "user2"}, "content": "lorem ipsum"},
            {"author": {"username": "user3"}, "content": "dolorum"},
            {"author": {"username": "user6"}, "content": "foo bar"},
        ],
    }]})
}

/// Usernames of the objects in a list.
pub fn usernames(value: Option<&ResponseValue>) -> Vec<String> {
    value
        .and_then(ResponseValue::as_list)
        .unwrap_or(&[])
        .iter()
        .filter_map(|item| item.get("username").and_then(ResponseValue::as_str))
        .map(str::to_string)
        .collect()
}
