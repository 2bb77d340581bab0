use crate::classify::{classify, formatting_hints};
use crate::header::has_header;
use crate::model::{Cell, DataType, ExtractionMethod, Grid, Scalar, Table, TableInfo};

/// Pads every row to the widest row. Missing cells become empty text and
/// nulls are normalized to empty text.
pub(crate) fn normalize_rows(grid: &Grid, width: usize) -> Grid {
    grid.iter()
        .map(|row| {
            let mut out = row
                .iter()
                .map(|value| match value {
                    Scalar::Null => Scalar::default(),
                    other => other.clone(),
                })
                .collect::<Vec<_>>();
            out.resize(width, Scalar::default());
            out
        })
        .collect()
}

/// Column types over the non-header rows of a rectangular grid.
pub(crate) fn column_types<'a, R>(rows: R, width: usize) -> Vec<DataType>
where
    R: IntoIterator<Item = &'a [Scalar]> + Clone,
{
    (0..width)
        .map(|column| classify(rows.clone().into_iter().filter_map(|row| row.get(column))))
        .collect()
}

/// Turns one raw grid from any extraction strategy into a typed [`Table`].
#[must_use]
pub fn build(
    grid: &Grid,
    page_number: u32,
    method: ExtractionMethod,
    confidence: f64,
    title: Option<String>,
) -> Table {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let rows = normalize_rows(grid, width);

    let header = rows.first().is_some_and(|first| has_header(first));
    let body_start = usize::from(header);
    let types = column_types(rows[body_start.min(rows.len())..].iter().map(Vec::as_slice), width);

    let cells = rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            row.iter()
                .enumerate()
                .map(|(column_index, value)| {
                    let data_type = types[column_index];
                    let mut cell = Cell::new(value.clone(), row_index, column_index);
                    cell.is_header = header && row_index == 0;
                    cell.data_type = data_type;
                    if !cell.is_header {
                        cell.formatting = formatting_hints(value, data_type);
                    }
                    cell
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let info = TableInfo {
        page_number,
        method_used: method,
        confidence_score: if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        },
        row_count: cells.len(),
        column_count: if cells.is_empty() { 0 } else { width },
        has_header: header,
        table_title: title,
        table_footnote: None,
        extraction_warnings: Vec::new(),
    };

    Table {
        cells,
        info,
        raw_data: grid.clone(),
    }
}
