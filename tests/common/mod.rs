//! Shared blog fixture for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use loadout::memory::MemoryBackend;
use loadout::memory::table::read as read_column;
use loadout::prelude::*;
use loadout::schema::GroupKey;
use serde_json::json;

/// Schemas of the blog domain: `Blog` has many `Post`, `Post` has many
/// `Comment`, `Comment` belongs to `Post` and to its `User` author.
pub fn registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry
        .register_with("Blog", |s| s.column("name").has_many("posts", "Post", "blog_id"))
        .unwrap();
    registry
        .register_with("Post", |s| {
            s.columns(["title", "author_first_name", "author_last_name", "blog_id"])
                .computed(
                    "name_initials",
                    ["author_first_name", "author_last_name"],
                    |record: &Record| {
                        let initial = |column: &str| {
                            record
                                .get(column)
                                .and_then(Value::as_str)
                                .and_then(|s| s.chars().next())
                                .map(String::from)
                                .unwrap_or_default()
                        };
                        Value::from(format!(
                            "{}{}",
                            initial("author_first_name"),
                            initial("author_last_name")
                        ))
                    },
                )
                .query("author_name", "author_first_name || ' ' || author_last_name")
                .query_with_join("blog_name", "blogs.name", "blogs")
                .loaded("newest_comment", BatchOptions::group_by("post_id").one())
                .loaded("comment_count", BatchOptions::keyed().default_value(0))
                .loaded(
                    "comment_texts",
                    BatchOptions::from_array().loader("load_texts"),
                )
                .nested("comment_rows", "Comment", "post_id")
                .belongs_to("blog", "Blog", "blog_id")
                .has_many("comments", "Comment", "post_id")
        })
        .unwrap();
    registry
        .register_with("Comment", |s| {
            s.columns(["post_id", "user_id", "comment"])
                .belongs_to("post", "Post", "post_id")
                .belongs_to("author", "User", "user_id")
        })
        .unwrap();
    registry
        .register_with("User", |s| s.column("name"))
        .unwrap();
    registry
}

/// Backend seeded with two blogs, three posts, three comments and two users.
///
/// Post 1 has comments `c1`, `c2`; post 2 has none; post 3 has `c3`.
pub fn backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .insert_json(
            "blogs",
            json!([{"id": 1, "name": "Rust"}, {"id": 2, "name": "Databases"}]),
        )
        .unwrap();
    backend
        .insert_json(
            "posts",
            json!([
                {"id": 1, "title": "Ownership", "author_first_name": "John", "author_last_name": "Doe", "blog_id": 1},
                {"id": 2, "title": "Borrowing", "author_first_name": "Jane", "author_last_name": "Roe", "blog_id": 1},
                {"id": 3, "title": "Indexes", "author_first_name": "Max", "author_last_name": "Poe", "blog_id": 2}
            ]),
        )
        .unwrap();
    backend
        .insert_json(
            "comments",
            json!([
                {"id": 1, "post_id": 1, "user_id": 1, "comment": "c1"},
                {"id": 2, "post_id": 1, "user_id": 2, "comment": "c2"},
                {"id": 3, "post_id": 3, "user_id": 1, "comment": "c3"}
            ]),
        )
        .unwrap();
    backend
        .insert_json("users", json!([{"id": 1, "name": "ann"}, {"id": 2, "name": "bob"}]))
        .unwrap();

    backend.register_expression("author_first_name || ' ' || author_last_name", |row: &Row| {
        Value::from(format!(
            "{} {}",
            read_column(row, "author_first_name").as_str().unwrap_or_default(),
            read_column(row, "author_last_name").as_str().unwrap_or_default()
        ))
    });
    let blog_names: HashMap<GroupKey, Value> = backend
        .rows("blogs")
        .into_iter()
        .filter_map(|blog| {
            let key = read_column(&blog, "id").group_key()?;
            Some((key, read_column(&blog, "name").clone()))
        })
        .collect();
    backend.register_expression("blogs.name", move |row: &Row| {
        read_column(row, "blog_id")
            .group_key()
            .and_then(|key| blog_names.get(&key).cloned())
            .unwrap_or_default()
    });
    backend
}

/// Comments of the collection's posts, in table order.
fn comments_of(ctx: &CollectionContext<'_, MemoryBackend>) -> Vec<Row> {
    let ids = ctx.ids();
    ctx.backend()
        .rows("comments")
        .into_iter()
        .filter(|c| ids.contains(read_column(c, "post_id")))
        .collect()
}

/// Datasource over the fixture with every batch loader registered.
pub fn datasource() -> Datasource<MemoryBackend> {
    datasource_with(backend(), LoadoutConfig::default())
}

/// Datasource over a given backend and configuration.
pub fn datasource_with(backend: MemoryBackend, config: LoadoutConfig) -> Datasource<MemoryBackend> {
    let mut datasource = Datasource::new(Arc::new(backend), Arc::new(registry())).with_config(config);
    datasource
        .register_fn("Post", "load_newest_comment", |ctx| {
            Ok(LoaderOutput::values(
                comments_of(ctx).into_iter().map(Value::Object),
            ))
        })
        .register_fn("Post", "load_comment_count", |ctx| {
            let comments = comments_of(ctx);
            Ok(LoaderOutput::pairs(
                ctx.ids()
                    .iter()
                    .map(|id| {
                        let count = comments
                            .iter()
                            .filter(|c| read_column(c, "post_id") == id)
                            .count() as i64;
                        (id.clone(), Value::Int(count))
                    })
                    .filter(|(_, count)| *count != Value::Int(0)),
            ))
        })
        .register_fn("Post", "load_texts", |ctx| {
            let mut texts: HashMap<GroupKey, Vec<Value>> = HashMap::new();
            for comment in comments_of(ctx) {
                if let Some(key) = read_column(&comment, "post_id").group_key() {
                    texts
                        .entry(key)
                        .or_default()
                        .push(read_column(&comment, "comment").clone());
                }
            }
            Ok(LoaderOutput::values(texts.into_iter().map(|(key, list)| {
                Value::List(vec![Value::from(key), Value::List(list)])
            })))
        });
    datasource
}

/// Scope over every row of an entity.
pub fn scope(datasource: &Datasource<MemoryBackend>, entity: &str) -> Scope {
    datasource.scope(entity).unwrap()
}
