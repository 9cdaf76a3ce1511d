//! JSON and text dumps of a view.
//!
//! Only attached rows are rendered. Text output is a column-aligned table led
//! by the view index of each row.

use crate::{error::Result, Error, Group, ObjKey, Table, View};

/// Row limit callers conventionally pass to [`View::to_text`].
pub const DEFAULT_TEXT_ROW_LIMIT: usize = 500;

impl View {
    /// Attached rows as a JSON array of objects keyed by column name.
    pub fn to_json(&self, group: &Group) -> Result<serde_json::Value> {
        let table = group.table(self.table).ok_or(Error::ViewDetached(self.table))?;
        let rows = self
            .keys()
            .iter()
            .filter(|key| table.is_valid(**key))
            .map(|key| table.row_to_json(*key))
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::Value::Array(rows))
    }

    pub fn to_json_string(&self, group: &Group) -> Result<String> {
        Ok(self.to_json(group)?.to_string())
    }

    /// Render at most `limit` attached rows (all of them for `None`).
    ///
    /// A truncated dump ends with `... and N more rows (total M)`.
    pub fn to_text(&self, group: &Group, limit: Option<usize>) -> Result<String> {
        let table = group.table(self.table).ok_or(Error::ViewDetached(self.table))?;
        let attached: Vec<(usize, ObjKey)> = self
            .keys()
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, key)| table.is_valid(*key))
            .collect();
        let shown = limit.unwrap_or(attached.len()).min(attached.len());

        let mut out = render(table, &attached[..shown])?;
        if shown < attached.len() {
            out.push_str(&format!(
                "... and {} more rows (total {})\n",
                attached.len() - shown,
                attached.len()
            ));
        }
        Ok(out)
    }

    /// Render the header and entry `index`.
    pub fn row_to_text(&self, group: &Group, index: usize) -> Result<String> {
        let table = group.table(self.table).ok_or(Error::ViewDetached(self.table))?;
        let key = self.key(index)?;
        if !table.is_valid(key) {
            return Err(Error::RowDetached { index, key });
        }
        render(table, &[(index, key)])
    }
}

fn render(table: &Table, rows: &[(usize, ObjKey)]) -> Result<String> {
    let names: Vec<&str> = table.schema().columns.iter().map(|c| c.name.as_str()).collect();
    let cells = rows
        .iter()
        .map(|(_, key)| table.row_cells(*key))
        .collect::<Result<Vec<_>>>()?;

    let index_width = rows
        .iter()
        .map(|(i, _)| i.to_string().len())
        .max()
        .unwrap_or(0);
    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(c, name)| {
            cells
                .iter()
                .map(|row| row[c].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&" ".repeat(index_width));
    for (name, width) in names.iter().zip(&widths) {
        out.push_str(&format!("  {name:<width$}"));
    }
    out.push('\n');

    for ((index, _), row) in rows.iter().zip(&cells) {
        out.push_str(&format!("{index:>index_width$}"));
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&format!("  {cell:<width$}"));
        }
        out.push('\n');
    }
    Ok(out)
}
