//! Rendering tests for the statement builders.

use super::*;
use crate::changeset::ChangeSet;
use crate::error::OrmError;
use crate::model::Model;
use crate::schema::{Field, Record, Schema, register};
use crate::value::Value;
use std::sync::OnceLock;

#[derive(Default, Debug)]
struct User {
    id: i64,
    name: String,
    email: String,
    theme: String,
    lang: String,
}

impl Record for User {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<User>> = OnceLock::new();
        register(&SCHEMA, || {
            Schema::builder()
                .table("users")
                .field(Field::column("id", |u: &User| &u.id, |u: &mut User| &mut u.id))
                .field(Field::column("name", |u: &User| &u.name, |u: &mut User| &mut u.name))
                .field(Field::column("email", |u: &User| &u.email, |u: &mut User| &mut u.email))
                .field(Field::jsonb("theme", "settings", |u: &User| &u.theme, |u: &mut User| &mut u.theme))
                .field(Field::jsonb("lang", "settings", |u: &User| &u.lang, |u: &mut User| &mut u.lang))
                .build()
        })
    }
}

fn users() -> Model<User> {
    Model::new()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

// ==================== SELECT ====================

#[test]
fn find_selects_plain_columns_then_groups() {
    assert_eq!(users().find().to_sql(), "SELECT id, name, email, settings FROM users");
}

#[test]
fn select_with_typed_conditions() {
    let (sql, args) = users()
        .select(&["id"])
        .eq("name", "alice")
        .gt("id", 10)
        .order_by("id DESC")
        .limit(5)
        .offset(10)
        .render();
    assert_eq!(
        sql,
        "SELECT id FROM users WHERE (name = $1) AND (id > $2) ORDER BY id DESC LIMIT 5 OFFSET 10"
    );
    assert_eq!(args, vec![text("alice"), Value::Int(10)]);
}

#[test]
fn limit_none_unsets() {
    let sql = users().select(&["id"]).limit(3).limit(None).to_sql();
    assert_eq!(sql, "SELECT id FROM users");
}

#[test]
fn add_select_goes_before_jsonb_groups() {
    let sql = users().find().add_select(&["length(name) AS name_len"]).to_sql();
    assert_eq!(
        sql,
        "SELECT id, name, email, length(name) AS name_len, settings FROM users"
    );
}

#[test]
fn joins_and_extra_from_items() {
    let sql = users()
        .select(&["users.id"])
        .from("teams")
        .inner_join("orders o", "o.user_id = users.id")
        .left_join("profiles p", "p.user_id = users.id")
        .to_sql();
    assert_eq!(
        sql,
        "SELECT users.id FROM users, teams INNER JOIN orders o ON o.user_id = users.id LEFT JOIN profiles p ON p.user_id = users.id"
    );
}

#[test]
fn sentinel_binds_single_argument() {
    let (sql, args) = users()
        .select(&["id"])
        .eq("email", "a@b.c")
        .where_sql("name = $? OR email = $?", vec![text("bob")])
        .render();
    assert_eq!(sql, "SELECT id FROM users WHERE (email = $1) AND (name = $2 OR email = $2)");
    assert_eq!(args.len(), 2);
}

#[test]
fn group_by_and_having_share_the_ledger() {
    let (sql, args) = users()
        .select(&["name", "COUNT(*)"])
        .eq("email", "x")
        .group_by("name")
        .having_sql("COUNT(*) > $1", vec![Value::Int(2)])
        .render();
    assert_eq!(
        sql,
        "SELECT name, COUNT(*) FROM users WHERE email = $1 GROUP BY name HAVING COUNT(*) > $2"
    );
    assert_eq!(args, vec![text("x"), Value::Int(2)]);
}

#[test]
fn count_and_exists_reuse_conditions() {
    let select = users().find().eq("name", "alice").order_by("id").limit(10);
    let count = select.count_query();
    assert_eq!(count.sql(), "SELECT COUNT(*) FROM users WHERE name = $1");
    assert_eq!(count.arguments(), &[text("alice")]);

    let exists = select.exists_query();
    assert_eq!(exists.sql(), "SELECT 1 AS one FROM users WHERE name = $1 LIMIT 1");
}

#[test]
fn grouped_count_wraps_a_subquery() {
    let count = users().select(&["name"]).group_by("name").count_query();
    assert_eq!(
        count.sql(),
        "SELECT COUNT(*) FROM (SELECT 1 FROM users GROUP BY name) AS t"
    );
}

#[test]
fn ctes_are_numbered_before_later_conditions() {
    let (sql, args) = users()
        .find()
        .with_raw("banned", "SELECT user_id FROM bans WHERE until > $1", vec![Value::Int(100)])
        .where_sql("id NOT IN (SELECT user_id FROM banned) AND name = $1", vec![text("x")])
        .render();
    assert_eq!(
        sql,
        "WITH banned AS (SELECT user_id FROM bans WHERE until > $1) SELECT id, name, email, settings FROM users WHERE id NOT IN (SELECT user_id FROM banned) AND name = $2"
    );
    assert_eq!(args, vec![Value::Int(100), text("x")]);
}

#[test]
fn with_select_renumbers_the_inner_query() {
    let active = users().select(&["id"]).eq("name", "active");
    let (sql, args) = users()
        .find()
        .eq("email", "e")
        .with_select("active_users", &active)
        .where_raw("id IN (SELECT id FROM active_users)")
        .render();
    assert_eq!(
        sql,
        "WITH active_users AS (SELECT id FROM users WHERE name = $2) SELECT id, name, email, settings FROM users WHERE (email = $1) AND (id IN (SELECT id FROM active_users))"
    );
    assert_eq!(args, vec![text("e"), text("active")]);
}

#[test]
fn rendering_is_idempotent() {
    let select = users().find().eq("id", 1).in_list("name", vec!["a", "b"]);
    assert_eq!(select.render(), select.render());
    let (sql, _) = select.render();
    assert_eq!(
        sql,
        "SELECT id, name, email, settings FROM users WHERE (id = $1) AND (name IN ($2, $3))"
    );
}

// ==================== INSERT ====================

#[test]
fn insert_single_column() {
    let (sql, args) = users()
        .insert([ChangeSet::new().set("name", "test")])
        .render();
    assert_eq!(sql, "INSERT INTO users (name) VALUES ($1)");
    assert_eq!(args, vec![text("test")]);
}

#[test]
fn insert_without_changes_uses_default_values() {
    let sql = users().insert([]).returning(&["id"]).to_sql();
    assert_eq!(sql, "INSERT INTO users DEFAULT VALUES RETURNING id");
}

#[test]
fn insert_packs_jsonb_group_regardless_of_order() {
    let first = users()
        .insert([ChangeSet::new().set("theme", "dark").set("lang", "en")])
        .render();
    let second = users()
        .insert([ChangeSet::new().set("lang", "en"), ChangeSet::new().set("theme", "dark")])
        .render();
    assert_eq!(first.0, "INSERT INTO users (settings) VALUES ($1)");
    assert_eq!(second.0, first.0);
    assert_eq!(first.1, second.1);
    assert_eq!(
        first.1,
        vec![Value::Json(serde_json::json!({"theme": "dark", "lang": "en"}))]
    );
}

#[test]
fn insert_merges_change_sets_last_write_wins() {
    let (sql, args) = users()
        .insert([
            ChangeSet::new().set("name", "a").set("email", "a@x"),
            ChangeSet::new().set("name", "b"),
        ])
        .render();
    assert_eq!(sql, "INSERT INTO users (name, email) VALUES ($1, $2)");
    assert_eq!(args, vec![text("b"), text("a@x")]);
}

#[test]
fn conflict_clause_needs_targets_and_action() {
    let base = users().insert([ChangeSet::new().set("email", "a@x")]);
    assert_eq!(
        base.clone().on_conflict(&["email"]).to_sql(),
        "INSERT INTO users (email) VALUES ($1)"
    );
    assert_eq!(
        base.clone().do_nothing().to_sql(),
        "INSERT INTO users (email) VALUES ($1)"
    );
    assert_eq!(
        base.on_conflict(&["email"]).do_nothing().to_sql(),
        "INSERT INTO users (email) VALUES ($1) ON CONFLICT (email) DO NOTHING"
    );
}

#[test]
fn half_declared_conflict_is_a_plain_insert() {
    let base = users().insert([ChangeSet::new().set("name", "a")]);

    let action_only = base.clone().do_update_all();
    assert!(action_only.validate().is_ok());
    assert_eq!(action_only.to_sql(), "INSERT INTO users (name) VALUES ($1)");

    let target_only = base.on_conflict(&["email"]);
    assert!(target_only.validate().is_ok());
    assert_eq!(target_only.to_sql(), "INSERT INTO users (name) VALUES ($1)");
}

#[test]
fn conflict_do_update_arguments_follow_values() {
    let (sql, args) = users()
        .insert([ChangeSet::new().set("email", "a@x").set("name", "a")])
        .on_conflict(&["email"])
        .do_update_with("name = $1", vec![text("dup")])
        .returning(&["id"])
        .render();
    assert_eq!(
        sql,
        "INSERT INTO users (email, name) VALUES ($1, $2) ON CONFLICT (email) DO UPDATE SET name = $3 RETURNING id"
    );
    assert_eq!(args.len(), 3);
}

#[test]
fn conflict_update_all_except() {
    let insert = users()
        .insert([ChangeSet::new().set("id", 1).set("name", "a").set("theme", "x")])
        .on_conflict(&["id"]);
    assert_eq!(
        insert.clone().do_update_all().to_sql(),
        "INSERT INTO users (id, name, settings) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id, name = EXCLUDED.name, settings = EXCLUDED.settings"
    );
    assert_eq!(
        insert.clone().do_update_all_except(&["id", "theme"]).to_sql(),
        "INSERT INTO users (id, name, settings) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
    );
    assert!(insert.clone().do_update_all_except(&["id", "theme"]).validate().is_ok());

    let nothing_left = insert.do_update_all_except(&["id", "name", "settings"]);
    assert!(matches!(nothing_left.validate(), Err(OrmError::Validation(_))));
}

#[test]
fn conflict_update_without_targets_fails_validation() {
    let insert = users()
        .insert([ChangeSet::new().set("name", "a")])
        .on_conflict(&[])
        .do_update_all();
    assert!(insert.validate().is_err());
    let insert = users()
        .insert([ChangeSet::new().set("name", "a")])
        .on_conflict(&[])
        .do_nothing();
    assert!(insert.validate().is_ok());
    assert_eq!(insert.to_sql(), "INSERT INTO users (name) VALUES ($1) ON CONFLICT DO NOTHING");
}

#[test]
fn insert_with_unknown_field_fails_validation() {
    let insert = users().insert([ChangeSet::new().set("nope", 1)]);
    assert!(insert.validate().is_err());
}

// ==================== UPDATE ====================

#[test]
fn update_set_arguments_follow_where_arguments() {
    let (sql, args) = users()
        .update([ChangeSet::new().set("name", "test")])
        .where_sql("id = $1", vec![Value::Int(1)])
        .render();
    assert_eq!(sql, "UPDATE users SET name = $2 WHERE id = $1");
    assert_eq!(args, vec![Value::Int(1), text("test")]);
}

#[test]
fn update_folds_jsonb_and_raw_values() {
    let (sql, args) = users()
        .update([ChangeSet::new()
            .set("theme", "dark")
            .set_raw("email", "lower(email)")
            .set_expr("name", "upper($?)", "bob")])
        .eq("id", 7)
        .returning(&["id", "settings"])
        .render();
    assert_eq!(
        sql,
        "UPDATE users SET settings = jsonb_set(COALESCE(settings, '{}'::jsonb), '{theme}', $2), email = lower(email), name = upper($3) WHERE id = $1 RETURNING id, settings"
    );
    assert_eq!(
        args,
        vec![Value::Int(7), Value::Json(serde_json::json!("dark")), text("bob")]
    );
}

#[test]
fn update_requires_set_values() {
    let update = users().update([]).eq("id", 1);
    assert!(update.validate().is_err());
}

#[test]
fn select_converts_into_update_and_delete() {
    let select = users()
        .find()
        .with_raw("old", "SELECT id FROM users WHERE id < $1", vec![Value::Int(5)])
        .where_raw("id IN (SELECT id FROM old)");

    let (sql, args) = select
        .clone()
        .into_update(ChangeSet::new().set("name", "archived"))
        .render();
    assert_eq!(
        sql,
        "WITH old AS (SELECT id FROM users WHERE id < $1) UPDATE users SET name = $2 WHERE id IN (SELECT id FROM old)"
    );
    assert_eq!(args, vec![Value::Int(5), text("archived")]);

    let sql = select.into_delete().to_sql();
    assert_eq!(
        sql,
        "WITH old AS (SELECT id FROM users WHERE id < $1) DELETE FROM users WHERE id IN (SELECT id FROM old)"
    );
}

#[test]
fn select_with_having_cannot_be_converted() {
    let select = users()
        .select(&["name"])
        .group_by("name")
        .having_sql("COUNT(*) > $1", vec![Value::Int(1)]);
    let update = select.clone().into_update(ChangeSet::new().set("name", "x"));
    assert!(update.validate().is_err());
    assert!(select.into_delete().validate().is_err());
}

// ==================== DELETE ====================

#[test]
fn delete_with_using_and_returning() {
    let (sql, args) = users()
        .delete()
        .using(&["bans b"])
        .where_raw("b.user_id = users.id")
        .gt("b.until", 3)
        .returning(&["users.id"])
        .render();
    assert_eq!(
        sql,
        "DELETE FROM users USING bans b WHERE (b.user_id = users.id) AND (b.until > $1) RETURNING users.id"
    );
    assert_eq!(args, vec![Value::Int(3)]);
}

#[test]
fn delete_without_conditions_targets_the_whole_table() {
    assert_eq!(users().delete().to_sql(), "DELETE FROM users");
}

// ==================== RAW ====================

#[test]
fn raw_statement_from_model() {
    let raw = users().raw("SELECT id FROM users WHERE name = $1", vec![text("a")]);
    assert_eq!(raw.render(), ("SELECT id FROM users WHERE name = $1".to_string(), vec![text("a")]));
}
