use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        display_fn(data);
    }
    Ok(())
}

/// Write `data` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(data: &T, path: &std::path::Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report: {}", path.display()))
}

/// Column alignment for tabular output.
#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

/// Borderless, whitespace-aligned table for terminal output.
pub struct TabWriter {
    table: Table,
    indent: &'static str,
}

impl TabWriter {
    /// Create a table with `(header, alignment)` columns.
    pub fn new(columns: &[(&str, Align)]) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(columns.iter().map(|(name, _)| *name));

        // 2-space gap between columns, none at the edges
        let last = columns.len().saturating_sub(1);
        for (i, (_, align)) in columns.iter().enumerate() {
            if let Some(col) = table.column_mut(i) {
                col.set_cell_alignment(match align {
                    Align::Left => CellAlignment::Left,
                    Align::Right => CellAlignment::Right,
                });
                col.set_padding((u16::from(i != 0), u16::from(i != last)));
            }
        }

        Self { table, indent: "" }
    }

    /// Prefix every printed line with `prefix`.
    pub fn indent(mut self, prefix: &'static str) -> Self {
        self.indent = prefix;
        self
    }

    /// Add a row. Values are given in column order.
    pub fn row(&mut self, values: Vec<String>) {
        self.table.add_row(values);
    }

    /// Print the table to stdout.
    pub fn print(&self) {
        for line in self.table.to_string().lines() {
            println!("{}{}", self.indent, line.trim_end());
        }
    }
}

/// Human label for a detection score.
pub fn confidence_label(score: usize) -> &'static str {
    match score {
        0..=20 => "very low",
        21..=50 => "low",
        51..=75 => "medium",
        _ => "high",
    }
}
