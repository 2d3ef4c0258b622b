use super::*;
use crate::schema::{Field, Record, Schema, register};
use std::sync::OnceLock;

#[derive(Default, Debug, Clone, PartialEq)]
struct Item {
    id: i64,
    title: String,
    color: String,
    size: i32,
}

impl Record for Item {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<Item>> = OnceLock::new();
        register(&SCHEMA, || {
            Schema::builder()
                .table("items")
                .field(Field::column("id", |i: &Item| &i.id, |i: &mut Item| &mut i.id))
                .field(Field::column("title", |i: &Item| &i.title, |i: &mut Item| &mut i.title))
                .field(Field::jsonb("color", "meta", |i: &Item| &i.color, |i: &mut Item| &mut i.color))
                .field(
                    Field::jsonb("size", "meta", |i: &Item| &i.size, |i: &mut Item| &mut i.size).strict(),
                )
                .build()
        })
    }
}

crate::impl_record_binding!(Item);

#[derive(Default, Debug, Clone, PartialEq)]
struct Loose {
    id: i64,
    size: i32,
}

impl Record for Loose {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: OnceLock<Schema<Loose>> = OnceLock::new();
        register(&SCHEMA, || {
            Schema::builder()
                .field(Field::column("id", |l: &Loose| &l.id, |l: &mut Loose| &mut l.id))
                .field(Field::jsonb("size", "meta", |l: &Loose| &l.size, |l: &mut Loose| &mut l.size))
                .build()
        })
    }
}

crate::impl_record_binding!(Loose);

fn row(columns: &[&str], values: Vec<Value>) -> Row {
    Row::new(columns.iter().copied(), values)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn shapes_follow_destination_types() {
    assert_eq!(<i64 as Destination>::SHAPE, DestinationShape::Scalar);
    assert_eq!(<Item as Destination>::SHAPE, DestinationShape::Record);
    assert_eq!(<Vec<Item> as Destination>::SHAPE, DestinationShape::Sequence);
    assert_eq!(<HashMap<i64, String> as Destination>::SHAPE, DestinationShape::FlatMap);
    assert_eq!(
        <HashMap<i64, HashMap<i64, String>> as Destination>::SHAPE,
        DestinationShape::NestedMap
    );
    assert_eq!(
        <BTreeMap<i64, Vec<String>> as Destination>::SHAPE,
        DestinationShape::GroupedSequence
    );
}

#[test]
fn scalar_binds_first_row() {
    let rows = vec![row(&["count"], vec![Value::Int(3)]), row(&["count"], vec![Value::Int(4)])];
    let count: i64 = bind_rows(&rows).unwrap();
    assert_eq!(count, 3);
}

#[test]
fn single_row_shapes_fail_on_empty_results() {
    let err = bind_rows::<i64>(&[]).unwrap_err();
    assert!(err.is_not_found());
    let err = bind_rows::<Item>(&[]).unwrap_err();
    assert!(err.is_not_found());
    let empty: Vec<Item> = bind_rows(&[]).unwrap();
    assert!(empty.is_empty());
}

#[test]
fn scalar_rejects_extra_columns() {
    let rows = vec![row(&["a", "b"], vec![Value::Int(1), Value::Int(2)])];
    assert!(matches!(bind_rows::<i64>(&rows), Err(OrmError::InvalidTarget(_))));
}

#[test]
fn record_binds_plain_and_jsonb_columns() {
    let rows = vec![row(
        &["id", "title", "meta"],
        vec![
            Value::Int(1),
            text("hat"),
            Value::Json(serde_json::json!({"color": "red", "size": 3})),
        ],
    )];
    let item: Item = bind_rows(&rows).unwrap();
    assert_eq!(
        item,
        Item {
            id: 1,
            title: "hat".into(),
            color: "red".into(),
            size: 3
        }
    );
}

#[test]
fn record_rejects_unknown_columns() {
    let rows = vec![row(&["id", "nope"], vec![Value::Int(1), Value::Int(2)])];
    assert!(matches!(bind_rows::<Item>(&rows), Err(OrmError::InvalidTarget(_))));
}

#[test]
fn jsonb_null_and_missing_keys_leave_fields_untouched() {
    let mut item = Item {
        color: "blue".into(),
        size: 7,
        ..Default::default()
    };
    let rows = vec![row(&["id", "meta"], vec![Value::Int(2), Value::Null])];
    bind_into(&mut item, &rows).unwrap();
    assert_eq!(item.color, "blue");

    let rows = vec![row(
        &["id", "meta"],
        vec![Value::Int(2), Value::Json(serde_json::json!({"color": "green"}))],
    )];
    bind_into(&mut item, &rows).unwrap();
    assert_eq!(item.color, "green");
    assert_eq!(item.size, 7);
}

#[test]
fn jsonb_payload_must_be_an_object() {
    let rows = vec![row(&["meta"], vec![Value::Json(serde_json::json!([1, 2]))])];
    assert!(matches!(
        bind_rows::<Item>(&rows),
        Err(OrmError::TypeAssertion { .. })
    ));
}

#[test]
fn lenient_jsonb_mismatch_is_skipped() {
    let rows = vec![row(
        &["id", "meta"],
        vec![Value::Int(5), Value::Json(serde_json::json!({"size": "large"}))],
    )];
    let loose: Loose = bind_rows(&rows).unwrap();
    assert_eq!(loose, Loose { id: 5, size: 0 });
}

#[test]
fn strict_jsonb_mismatch_names_the_field() {
    let rows = vec![row(
        &["meta"],
        vec![Value::Json(serde_json::json!({"size": "large"}))],
    )];
    match bind_rows::<Item>(&rows) {
        Err(OrmError::JsonbField { field, column, .. }) => {
            assert_eq!(field, "size");
            assert_eq!(column, "meta");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn sequence_of_tuples() {
    let rows = vec![
        row(&["id", "title"], vec![Value::Int(1), text("a")]),
        row(&["id", "title"], vec![Value::Int(2), text("b")]),
    ];
    let pairs: Vec<(i64, String)> = bind_rows(&rows).unwrap();
    assert_eq!(pairs, vec![(1, "a".to_string()), (2, "b".to_string())]);
}

#[test]
fn grouped_sequence_preserves_row_order() {
    let rows = vec![
        row(&["category_id", "title"], vec![Value::Int(1), text("a")]),
        row(&["category_id", "title"], vec![Value::Int(2), text("b")]),
        row(&["category_id", "title"], vec![Value::Int(1), text("c")]),
    ];
    let grouped: HashMap<i64, Vec<String>> = bind_rows(&rows).unwrap();
    assert_eq!(grouped[&1], vec!["a".to_string(), "c".to_string()]);
    assert_eq!(grouped[&2], vec!["b".to_string()]);
}

#[test]
fn nested_map_with_tuple_and_scalar_keys() {
    let rows = vec![
        row(&["a", "b", "v"], vec![Value::Int(1), Value::Int(10), text("x")]),
        row(&["a", "b", "v"], vec![Value::Int(1), Value::Int(20), text("y")]),
        row(&["a", "b", "v"], vec![Value::Int(1), Value::Int(10), text("z")]),
    ];
    let nested: BTreeMap<i64, BTreeMap<i64, String>> = bind_rows(&rows).unwrap();
    assert_eq!(nested[&1][&10], "z");
    assert_eq!(nested[&1][&20], "y");

    let flat: HashMap<(i64, i64), String> = bind_rows(&rows).unwrap();
    assert_eq!(flat.len(), 2);
}

#[test]
fn map_values_can_be_records() {
    let rows = vec![row(
        &["key", "id", "title", "meta"],
        vec![text("k"), Value::Int(1), text("t"), Value::Null],
    )];
    let by_key: HashMap<String, Item> = bind_rows(&rows).unwrap();
    assert_eq!(by_key["k"].title, "t");
}

#[test]
fn repeated_key_replaces_the_earlier_record() {
    let columns = ["key", "id", "title", "meta"];
    let rows = vec![
        row(
            &columns,
            vec![Value::Int(1), Value::Int(1), text("a"), Value::Json(serde_json::json!({"color": "red"}))],
        ),
        row(&columns, vec![Value::Int(1), Value::Int(1), text("b"), Value::Null]),
    ];
    let by_id: HashMap<i64, Item> = bind_rows(&rows).unwrap();
    assert_eq!(
        by_id[&1],
        Item {
            id: 1,
            title: "b".into(),
            ..Item::default()
        }
    );

    let by_id: BTreeMap<i64, Item> = bind_rows(&rows).unwrap();
    assert_eq!(by_id[&1].color, "");
}

#[test]
fn record_keys_consume_their_column_count() {
    let rows = vec![row(
        &["id", "meta", "title"],
        vec![Value::Int(1), Value::Null, text("first")],
    )];
    let by_record: Vec<(Loose, String)> = bind_rows(&rows).unwrap();
    assert_eq!(by_record[0].0.id, 1);
    assert_eq!(by_record[0].1, "first");
}

#[test]
fn missing_value_columns_fail() {
    let rows = vec![row(&["k"], vec![Value::Int(1)])];
    assert!(matches!(
        bind_rows::<HashMap<i64, String>>(&rows),
        Err(OrmError::InvalidTarget(_))
    ));
}

#[test]
fn bind_into_keeps_rows_bound_before_a_failure() {
    let rows = vec![
        row(&["k", "v"], vec![Value::Int(1), text("a")]),
        row(&["k", "v"], vec![Value::Int(2), Value::Int(5)]),
    ];
    let mut dest: HashMap<i64, String> = HashMap::new();
    assert!(bind_into(&mut dest, &rows).is_err());
    assert_eq!(dest.get(&1).map(String::as_str), Some("a"));
}
