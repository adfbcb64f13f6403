use std::fs;
use std::sync::Arc;

use kiln::buffer::BufferPool;
use kiln::catalog::Catalog;
use kiln::common::DEFAULT_STRING_LEN;
use kiln::execution::{
    collect_stream, Aggregate, AggregateOp, Join, JoinPredicate, Op, TupleStream,
};
use kiln::stats::StatsRegistry;
use kiln::tuple::{DataType, Schema, TupleBuilder, Value};
use kiln::KilnConfig;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter;
use tracing_subscriber::prelude::*;

fn main() -> kiln::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter_layer =
        filter::EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    println!("Kiln - a teaching relational storage engine");
    println!("===========================================\n");

    let config = KilnConfig::default();
    config.validate()?;

    let dir = std::env::temp_dir().join(format!("kiln-demo-{}", std::process::id()));
    fs::create_dir_all(&dir)?;

    let catalog = Arc::new(Catalog::new(config.page_size));
    let users_schema = Schema::builder()
        .column("id", DataType::Int)
        .column("name", DataType::Str(DEFAULT_STRING_LEN))
        .build_arc();
    let orders_schema = Schema::builder()
        .column("user_id", DataType::Int)
        .column("amount", DataType::Int)
        .build_arc();

    let users = catalog.open_table("users", dir.join("users.dat"), users_schema.clone())?;
    let orders = catalog.open_table("orders", dir.join("orders.dat"), orders_schema.clone())?;
    let pool = Arc::new(BufferPool::new(config.buffer_pool_pages, Arc::clone(&catalog))?);

    for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Carol")] {
        let mut tuple = TupleBuilder::new(users_schema.clone())
            .value(id)
            .value(name)
            .build()?;
        pool.insert_tuple(users.table_id(), &mut tuple)?;
    }
    for (user_id, amount) in [(1, 30), (1, 12), (3, 99), (4, 7)] {
        let mut tuple = TupleBuilder::new(orders_schema.clone())
            .value(user_id)
            .value(amount)
            .build()?;
        pool.insert_tuple(orders.table_id(), &mut tuple)?;
    }
    pool.flush_all_pages()?;
    info!(
        users = users.num_pages(),
        orders = orders.num_pages(),
        "loaded demo tables"
    );

    let stats = StatsRegistry::compute_all(&catalog, &pool, &config)?;
    if let Some(order_stats) = stats.get("orders") {
        let selectivity =
            order_stats.estimate_selectivity(1, Op::GreaterThan, &Value::Int(20))?;
        println!(
            "orders: {} tuples, scan cost {}, amount > 20 selects ~{:.2} ({} tuples)",
            order_stats.total_tuples(),
            order_stats.estimate_scan_cost(),
            selectivity,
            order_stats.estimate_table_cardinality(selectivity)
        );
    }

    let mut join = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        Box::new(users.iter(&pool)),
        Box::new(orders.iter(&pool)),
        config.join_memory_budget,
    )?;
    println!(
        "\nusers JOIN orders ON {} = {}:",
        join.left_field_name(),
        join.right_field_name()
    );
    join.open()?;
    while let Some(tuple) = join.next_tuple()? {
        println!("  {}", tuple);
    }
    join.close();

    let mut totals = Aggregate::new(Box::new(orders.iter(&pool)), 1, Some(0), AggregateOp::Sum)?;
    totals.open()?;
    println!("\n{} per {}:", totals.op(), totals.group_field_name().unwrap_or("all"));
    for tuple in collect_stream(&mut totals)? {
        println!("  {}", tuple);
    }
    totals.close();

    fs::remove_dir_all(&dir)?;
    println!("\nDemo completed successfully!");
    Ok(())
}
