mod common;

use common::{normalized, table, text_column};
use proptest::prelude::*;
use tabular_insights::{
    data::Value,
    frame::{Column, ColumnData, ColumnKind},
    normalize::{self, TableProfile},
};

#[test]
fn half_surviving_values_is_enough_for_numeric() {
    let table = normalized(vec![
        text_column("id", &[Some("a"), Some("b"), Some("c"), Some("d")]),
        text_column(
            "amount",
            &[Some("10"), Some("n/d"), Some("7,5 €"), Some("pending")],
        ),
    ]);
    let column = table.column("amount").expect("amount");
    assert_eq!(column.kind(), ColumnKind::Numeric);
    // "7,5" has no dot anywhere in the sample, so it reads in US notation.
    assert_eq!(
        column.data,
        ColumnData::Numeric(vec![Some(10.0), None, Some(75.0), None])
    );
}

#[test]
fn mostly_damaged_column_stays_text() {
    let table = normalized(vec![text_column(
        "address",
        &[Some("Calle Mayor 5"), Some("Gran Via"), Some("Rambla"), Some("Diagonal")],
    )]);
    let column = table.column("address").expect("address");
    assert_eq!(column.kind(), ColumnKind::Text);
    assert_eq!(column.data.display(0).as_deref(), Some("Calle Mayor 5"));
}

#[test]
fn iso_dates_become_datetime() {
    let table = normalized(vec![
        text_column("id", &[Some("a"), Some("b"), Some("c")]),
        text_column(
            "ordered_at",
            &[Some("2024-01-05"), Some("2024-02-10"), Some("unknown")],
        ),
    ]);
    let column = table.column("ordered_at").expect("ordered_at");
    assert_eq!(column.kind(), ColumnKind::DateTime);
    assert_eq!(column.data.display(0).as_deref(), Some("2024-01-05 00:00:00"));
    assert!(column.data.is_null(2));
}

#[test]
fn empty_rows_and_columns_are_dropped() {
    let table = normalized(vec![
        text_column("city", &[Some("Vigo"), None, Some("Lugo")]),
        text_column("blank", &[None, None, None]),
        Column::numeric("qty", vec![Some(1.0), None, Some(f64::INFINITY)]),
    ]);
    assert_eq!(table.headers(), vec!["city", "qty"]);
    assert_eq!(table.row_count(), 2);
    let qty = table.column("qty").expect("qty");
    assert_eq!(qty.data, ColumnData::Numeric(vec![Some(1.0), None]));
}

#[test]
fn rows_emptied_by_coercion_are_swept_afterwards() {
    let table = normalized(vec![text_column(
        "amount",
        &[Some("1"), Some("2"), Some("oops")],
    )]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(
        table.column("amount").expect("amount").data,
        ColumnData::Numeric(vec![Some(1.0), Some(2.0)])
    );
}

#[test]
fn infinite_mixed_cells_become_null() {
    let table = normalized(vec![
        Column::mixed(
            "score",
            vec![Some(Value::Number(f64::NEG_INFINITY)), Some(Value::from("4"))],
        ),
        text_column("name", &[Some("a"), Some("b")]),
    ]);
    assert_eq!(
        table.column("score").expect("score").data,
        ColumnData::Numeric(vec![None, Some(4.0)])
    );
}

#[test]
fn profile_reports_kinds_and_non_null_counts() {
    let table = normalized(vec![
        text_column("city", &[Some("Vigo"), None]),
        Column::numeric("qty", vec![Some(1.0), Some(2.0)]),
    ]);
    let profile = TableProfile::of(&table);
    assert_eq!(profile.rows, 2);
    assert_eq!(profile.columns[0].kind, ColumnKind::Text);
    assert_eq!(profile.columns[0].non_null, 1);
    assert_eq!(profile.columns[1].kind, ColumnKind::Numeric);
}

fn cell_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(prop_oneof![
        "[0-9]{1,4}",
        "[0-9]{1,3}[.,][0-9]{1,2}",
        "[a-z]{1,6}",
        Just("2024-03-01".to_string()),
        Just(String::new()),
    ])
}

proptest! {
    #[test]
    fn normalizing_twice_changes_nothing(
        rows in proptest::collection::vec((cell_strategy(), cell_strategy()), 0..12)
    ) {
        let (left, right): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let raw = table(vec![Column::text("a", &left), Column::text("b", &right)]);
        let once = normalize::normalize(raw);
        let twice = normalize::normalize(once.clone());
        prop_assert_eq!(once, twice);
    }
}
