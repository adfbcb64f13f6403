//! Integration tests for the block sort-merge join

use std::sync::Arc;

use kiln::buffer::BufferPool;
use kiln::catalog::Catalog;
use kiln::execution::{collect_stream, Join, JoinPredicate, Op, TupleStream, VecStream};
use kiln::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};
use kiln::KilnError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

fn pair_schema(key: &str, label: &str) -> Arc<Schema> {
    Schema::builder()
        .column(key, DataType::Int)
        .column(label, DataType::Str(1))
        .build_arc()
}

fn stream(schema: &Arc<Schema>, rows: &[(i32, &str)]) -> Box<dyn TupleStream> {
    let tuples = rows
        .iter()
        .map(|&(k, s)| {
            TupleBuilder::new(schema.clone())
                .value(k)
                .value(s)
                .build()
                .unwrap()
        })
        .collect();
    Box::new(VecStream::new(schema.clone(), tuples).unwrap())
}

fn run(join: &mut Join) -> Vec<Vec<Value>> {
    join.open().unwrap();
    let mut rows: Vec<Vec<Value>> = collect_stream(join)
        .unwrap()
        .into_iter()
        .map(|t| t.values().to_vec())
        .collect();
    rows.sort_by_key(|r| format!("{:?}", r));
    rows
}

fn nested_loop(predicate: &JoinPredicate, outer: &[Tuple], inner: &[Tuple]) -> Vec<Vec<Value>> {
    let mut rows = Vec::new();
    for o in outer {
        for i in inner {
            if predicate.filter(o, i) {
                let mut row = o.values().to_vec();
                row.extend_from_slice(i.values());
                rows.push(row);
            }
        }
    }
    rows.sort_by_key(|r| format!("{:?}", r));
    rows
}

#[test]
fn test_join_equality_any_block_size() {
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let tuple_size = left.tuple_size();
    assert_eq!(tuple_size, 9);

    let mut expected = vec![
        vec![Value::Int(1), "a".into(), Value::Int(1), "x".into()],
        vec![Value::Int(1), "a".into(), Value::Int(1), "z".into()],
        vec![Value::Int(2), "b".into(), Value::Int(2), "y".into()],
    ];
    expected.sort_by_key(|r| format!("{:?}", r));

    for per_block in 1..=3 {
        let mut join = Join::new(
            JoinPredicate::new(0, Op::Equals, 0),
            stream(&left, &[(1, "a"), (2, "b")]),
            stream(&right, &[(1, "x"), (2, "y"), (1, "z")]),
            tuple_size * per_block,
        )
        .unwrap();
        assert_eq!(join.block_capacities(), (per_block, per_block));
        assert_eq!(run(&mut join), expected, "{} tuples per block", per_block);
    }
}

#[test]
fn test_join_output_schema() {
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let join = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        stream(&left, &[]),
        stream(&right, &[]),
        1024,
    )
    .unwrap();

    let names: Vec<_> = join.schema().columns().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["k", "a", "k", "b"]);
    assert_eq!(join.left_field_name(), "k");
    assert_eq!(join.right_field_name(), "k");
}

#[test]
fn test_join_budget_too_small() {
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let result = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        stream(&left, &[(1, "a")]),
        stream(&right, &[(1, "x")]),
        left.tuple_size() - 1,
    );
    assert!(matches!(result, Err(KilnError::InvalidConfiguration(_))));
}

#[test]
fn test_join_rejects_mismatched_field_kinds() {
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let result = Join::new(
        JoinPredicate::new(0, Op::Equals, 1),
        stream(&left, &[]),
        stream(&right, &[]),
        1024,
    );
    assert!(matches!(result, Err(KilnError::InvalidConfiguration(_))));
}

#[test]
fn test_join_matches_nested_loop() {
    let mut rng = StdRng::seed_from_u64(186);
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let ops = [
        Op::Equals,
        Op::GreaterThan,
        Op::GreaterThanOrEq,
        Op::LessThan,
        Op::LessThanOrEq,
    ];

    for round in 0..20 {
        let outer_rows: Vec<(i32, String)> = (0..rng.gen_range(0..25))
            .map(|i| (rng.gen_range(-5..6), ((b'a' + (i % 26) as u8) as char).to_string()))
            .collect();
        let inner_rows: Vec<(i32, String)> = (0..rng.gen_range(0..25))
            .map(|i| (rng.gen_range(-5..6), ((b'A' + (i % 26) as u8) as char).to_string()))
            .collect();
        let outer_ref: Vec<(i32, &str)> = outer_rows.iter().map(|(k, s)| (*k, s.as_str())).collect();
        let inner_ref: Vec<(i32, &str)> = inner_rows.iter().map(|(k, s)| (*k, s.as_str())).collect();

        let mut outer_all = stream(&left, &outer_ref);
        outer_all.open().unwrap();
        let outer_tuples = collect_stream(&mut outer_all).unwrap();
        let mut inner_all = stream(&right, &inner_ref);
        inner_all.open().unwrap();
        let inner_tuples = collect_stream(&mut inner_all).unwrap();

        for op in ops {
            let predicate = JoinPredicate::new(0, op, 0);
            let expected = nested_loop(&predicate, &outer_tuples, &inner_tuples);
            let per_block = rng.gen_range(1..8);
            let mut join = Join::new(
                predicate,
                stream(&left, &outer_ref),
                stream(&right, &inner_ref),
                left.tuple_size() * per_block,
            )
            .unwrap();
            assert_eq!(
                run(&mut join),
                expected,
                "round {} op {} block {}",
                round,
                op,
                per_block
            );
        }
    }
}

#[test]
fn test_join_string_keys() {
    let left = pair_schema("k", "a");
    let right = pair_schema("k", "b");
    let mut join = Join::new(
        JoinPredicate::new(1, Op::LessThan, 1),
        stream(&left, &[(1, "b"), (2, "d")]),
        stream(&right, &[(3, "a"), (4, "c"), (5, "e")]),
        left.tuple_size() * 2,
    )
    .unwrap();

    let mut keys: Vec<(i32, i32)> = run(&mut join)
        .iter()
        .map(|r| (r[0].as_int().unwrap(), r[2].as_int().unwrap()))
        .collect();
    keys.sort();
    assert_eq!(keys, vec![(1, 4), (1, 5), (2, 5)]);
}

#[test]
fn test_join_over_table_files() {
    let dir = tempdir().unwrap();
    let catalog = Arc::new(Catalog::new(128));
    let schema = Schema::builder()
        .column("k", DataType::Int)
        .column("v", DataType::Int)
        .build_arc();
    let users = catalog
        .open_table("l", dir.path().join("l.dat"), schema.clone())
        .unwrap();
    let orders = catalog
        .open_table("r", dir.path().join("r.dat"), schema.clone())
        .unwrap();
    let pool = Arc::new(BufferPool::new(3, catalog).unwrap());

    for i in 0..60 {
        let mut t = TupleBuilder::new(schema.clone())
            .value(i % 10)
            .value(i)
            .build()
            .unwrap();
        pool.insert_tuple(users.table_id(), &mut t).unwrap();
        let mut t = TupleBuilder::new(schema.clone())
            .value(i % 7)
            .value(-i)
            .build()
            .unwrap();
        pool.insert_tuple(orders.table_id(), &mut t).unwrap();
    }
    assert!(users.num_pages() > 3);

    let mut join = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        Box::new(users.iter(&pool)),
        Box::new(orders.iter(&pool)),
        schema.tuple_size() * 8,
    )
    .unwrap();
    join.open().unwrap();
    let rows = collect_stream(&mut join).unwrap();

    // keys 0..7 appear 6 times on the left and 9 or 8 times on the right
    let expected: usize = (0..7).map(|k| 6 * if k < 4 { 9 } else { 8 }).sum();
    assert_eq!(rows.len(), expected);
    assert!(rows.iter().all(|t| t.value(0) == t.value(2)));

    join.rewind().unwrap();
    assert_eq!(collect_stream(&mut join).unwrap().len(), expected);
}
