use crate::frame::Table;

const SAMPLE_VALUES: usize = 3;
const SAMPLE_WIDTH: usize = 40;

pub fn summarize(file_name: &str, table: &Table) -> String {
    let mut lines = vec![
        format!("File: {file_name}"),
        format!("Rows: {}", table.row_count()),
    ];
    for column in table.columns() {
        let samples = (0..column.len())
            .filter_map(|row| column.data.display(row))
            .take(SAMPLE_VALUES)
            .map(|value| format!("{:?}", truncate(&value, SAMPLE_WIDTH)))
            .collect::<Vec<_>>();
        lines.push(format!(
            "- '{}' ({}): samples [{}]",
            column.name,
            column.kind(),
            samples.join(", ")
        ));
    }
    lines.join("\n")
}

fn truncate(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    #[test]
    fn summary_lists_kinds_and_first_samples() {
        let long = "x".repeat(60);
        let table = Table::new(vec![
            Column::text("city", &[None, Some("Madrid"), Some(long.as_str()), Some("Vigo"), Some("Lugo")]),
            Column::numeric("total", vec![Some(1.0), Some(2.5), None, None, None]),
        ])
        .unwrap();
        let summary = summarize("sales.csv", &table);
        let lines = summary.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "File: sales.csv");
        assert_eq!(lines[1], "Rows: 5");
        assert_eq!(
            lines[2],
            format!("- 'city' (text): samples [\"Madrid\", \"{}\", \"Vigo\"]", "x".repeat(40))
        );
        assert_eq!(lines[3], "- 'total' (numeric): samples [\"1\", \"2.5\"]");
    }
}
