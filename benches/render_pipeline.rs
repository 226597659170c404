use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::json;
use tabular_insights::{
    component::DashboardConfig,
    filter::FilterCondition,
    frame::{Column, Table},
    normalize, render,
};

fn generate_orders(rows: usize) -> Table {
    let mut products = Vec::with_capacity(rows);
    let mut amounts = Vec::with_capacity(rows);
    let mut statuses = Vec::with_capacity(rows);
    let mut eastings = Vec::with_capacity(rows);
    let mut northings = Vec::with_capacity(rows);
    for i in 0..rows {
        products.push(Some(format!("product-{}", i % 37)));
        amounts.push(Some(format!("{}.{:03},{:02} €", 1 + i % 9, i % 1000, i % 100)));
        statuses.push(Some(
            match i % 3 {
                0 => "shipped",
                1 => "pending",
                _ => "processing",
            }
            .to_string(),
        ));
        eastings.push(Some(430_000.0 + (i % 500) as f64 * 10.0));
        northings.push(Some(4_580_000.0 + (i % 700) as f64 * 10.0));
    }
    Table::new(vec![
        Column::text("product", &products),
        Column::text("amount", &amounts),
        Column::text("status", &statuses),
        Column::numeric("x", eastings),
        Column::numeric("y", northings),
    ])
    .expect("generated columns share a length")
}

fn dashboard() -> DashboardConfig {
    DashboardConfig::from_json(&json!({
        "title": "Orders",
        "components": [
            { "id": "revenue", "type": "kpi", "config": { "operation": "sum", "column": "amount" } },
            { "id": "products", "type": "kpi", "config": { "operation": "nunique", "column": "product" } },
            { "id": "top", "type": "chart", "chart_type": "bar", "config": { "x": "product", "y": "amount", "limit": 10 } },
            { "id": "share", "type": "chart", "chart_type": "pie", "config": { "x": "product", "operation": "count" } },
            { "id": "stores", "type": "map", "config": { "lat": "y", "lon": "x", "label": "product" } }
        ]
    }))
}

fn bench_normalize(c: &mut Criterion) {
    let raw = generate_orders(20_000);
    c.bench_function("normalize_20k_rows", |b| {
        b.iter_batched(
            || raw.clone(),
            normalize::normalize,
            BatchSize::LargeInput,
        )
    });
}

fn bench_render(c: &mut Criterion) {
    let table = normalize::normalize(generate_orders(20_000));
    let dashboard = dashboard();
    let filters = vec![FilterCondition::new("status", "shipped")];
    c.bench_function("render_dashboard_20k_rows", |b| {
        b.iter(|| render::render_dashboard(&table, &dashboard, &[]).expect("render"))
    });
    c.bench_function("render_filtered_dashboard_20k_rows", |b| {
        b.iter(|| render::render_dashboard(&table, &dashboard, &filters).expect("render"))
    });
}

criterion_group!(benches, bench_normalize, bench_render);
criterion_main!(benches);
