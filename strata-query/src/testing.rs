//! Shared fixture for unit tests: seven users, three posts, fourteen follows
//! and three likes.

use std::sync::Arc;

use strata_schema::{
    ArgumentDef, EntityType, JoinSpec, RelationshipDef, RootField, ScalarField, ScalarType, Schema,
};

use crate::loader::MemoryStore;
use crate::value::Value;

pub(crate) const FOLLOWS: [(i64, i64); 14] = [
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

pub(crate) fn social_schema() -> Arc<Schema> {
    let user_filters = || {
        [
            ArgumentDef::equals("username", "username"),
            ArgumentDef::any_of("usernames", "username"),
        ]
    };
    let [by_name, by_names] = user_filters();
    let [inverse_by_name, inverse_by_names] = user_filters();

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
                .argument(by_name)
                .argument(by_names)
                .inverse_argument(inverse_by_name)
                .inverse_argument(inverse_by_names),
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
        .build();

    match schema {
        Ok(schema) => Arc::new(schema),
        Err(e) => panic!("fixture schema is invalid: {}", e),
    }
}

pub(crate) fn social_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for id in 1..=7i64 {
        store.insert(
            "users",
            [("id", Value::Int(id)), ("username", Value::from(format!("user{}", id)))],
        );
    }
    for (id, (follower, followee)) in FOLLOWS.iter().enumerate() {
        store.insert(
            "follows",
            [
                ("id", Value::Int(id as i64 + 1)),
                ("follower_id", Value::Int(*follower)),
                ("followee_id", Value::Int(*followee)),
            ],
        );
    }
    for (id, author, content) in [(1, 2, "lorem ipsum"), (2, 3, "dolorum"), (3, 6, "foo bar")] {
        store.insert(
            "posts",
            [
                ("id", Value::Int(id)),
                ("author_id", Value::Int(author)),
                ("content", Value::from(content)),
            ],
        );
    }
    for (id, post) in [1i64, 2, 3].into_iter().enumerate() {
        store.insert(
            "likes",
            [
                ("id", Value::Int(id as i64 + 1)),
                ("user_id", Value::Int(1)),
                ("post_id", Value::Int(post)),
            ],
        );
    }
    store
}
