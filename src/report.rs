use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders rows as a space-separated grid under a dashed rule.
pub fn render_grid(headers: &[String], rows: &[Vec<String>], align: &[Align]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    for line in std::iter::once(headers.to_vec())
        .chain(std::iter::once(rule))
        .chain(rows.iter().cloned())
    {
        let cells = line
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(idx, (cell, &width))| {
                let cell = flatten(cell);
                match align.get(idx).copied().unwrap_or(Align::Left) {
                    Align::Left => format!("{cell:<width$}"),
                    Align::Right => format!("{cell:>width$}"),
                }
            })
            .collect::<Vec<_>>();
        let _ = writeln!(output, "{}", cells.join("  ").trim_end());
    }
    output
}

pub fn print_grid(headers: &[String], rows: &[Vec<String>], align: &[Align]) {
    print!("{}", render_grid(headers, rows, align));
}

fn flatten(cell: &str) -> String {
    cell.replace(['\n', '\r', '\t'], " ")
}
