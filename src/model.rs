use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw cell value as handed over by an extraction backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Scalar {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Row-major raw table content before typing. Rows may be ragged.
pub type Grid = Vec<Vec<Scalar>>;

/// Builds a grid from string rows; mostly useful for backends and tests.
#[must_use]
pub fn grid_from_rows<R, S>(rows: R) -> Grid
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = S>,
    S: Into<Scalar>,
{
    rows.into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Currency,
    Percentage,
    Date,
    Boolean,
}

impl DataType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Percentage => "percentage",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Whitespace and visual-gap based grid detection.
    GridStream,
    /// Ruled-line grid detection.
    GridLattice,
    /// The page backend's own table extraction.
    PageBuiltin,
    /// An out-of-process extraction tool.
    ExternalTool,
}

impl ExtractionMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GridStream => "grid_stream",
            Self::GridLattice => "grid_lattice",
            Self::PageBuiltin => "page_builtin",
            Self::ExternalTool => "external_tool",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFormatting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpan {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Scalar,
    pub row_index: usize,
    pub column_index: usize,
    pub is_header: bool,
    pub data_type: DataType,
    pub formatting: CellFormatting,
    pub is_merged: bool,
    pub merge_span: Option<MergeSpan>,
}

impl Cell {
    #[must_use]
    pub fn new(value: Scalar, row_index: usize, column_index: usize) -> Self {
        let value = match value {
            Scalar::Null => Scalar::default(),
            other => other,
        };
        Self {
            value,
            row_index,
            column_index,
            is_header: false,
            data_type: DataType::String,
            formatting: CellFormatting::default(),
            is_merged: false,
            merge_span: None,
        }
    }

    /// Renders numeric values with their formatting hints. Anything that is
    /// not a number is rendered as-is.
    #[must_use]
    pub fn formatted_value(&self) -> String {
        let Scalar::Number(number) = self.value else {
            return self.value.to_string();
        };

        match self.data_type {
            DataType::Number => match self.formatting.decimal_places {
                Some(decimals) => format!("{number:.decimals$}"),
                None => number.to_string(),
            },
            DataType::Currency => {
                let symbol = self.formatting.currency_symbol.unwrap_or('$');
                let decimals = self.formatting.decimal_places.unwrap_or(2);
                format!("{symbol}{number:.decimals$}")
            }
            DataType::Percentage => {
                let decimals = self.formatting.decimal_places.unwrap_or(2);
                format!("{number:.decimals$}%")
            }
            _ => self.value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub page_number: u32,
    pub method_used: ExtractionMethod,
    pub confidence_score: f64,
    pub row_count: usize,
    pub column_count: usize,
    pub has_header: bool,
    pub table_title: Option<String>,
    pub table_footnote: Option<String>,
    pub extraction_warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub cells: Vec<Vec<Cell>>,
    pub info: TableInfo,
    pub raw_data: Grid,
}

impl Table {
    /// `(rows, columns)` of the built cell grid.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self.cells.first() {
            Some(first) => (self.cells.len(), first.len()),
            None => (0, 0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn to_array(&self) -> Vec<Vec<Scalar>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.value.clone()).collect())
            .collect()
    }

    /// Header row values, empty when no header was detected.
    #[must_use]
    pub fn headers(&self) -> Vec<&Scalar> {
        if !self.info.has_header {
            return Vec::new();
        }
        self.cells
            .first()
            .map(|row| row.iter().map(|cell| &cell.value).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn to_record(&self) -> TableRecord {
        TableRecord {
            page_number: self.info.page_number,
            method_used: self.info.method_used,
            confidence_score: self.info.confidence_score,
            row_count: self.info.row_count,
            column_count: self.info.column_count,
            has_header: self.info.has_header,
            table_title: self.info.table_title.clone(),
            table_footnote: self.info.table_footnote.clone(),
            extraction_warnings: self.info.extraction_warnings.clone(),
            rows: self
                .cells
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| CellRecord {
                            value: cell.value.clone(),
                            is_header: cell.is_header,
                            data_type: cell.data_type,
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

/// Flat serializable form of a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub page_number: u32,
    pub method_used: ExtractionMethod,
    pub confidence_score: f64,
    pub row_count: usize,
    pub column_count: usize,
    pub has_header: bool,
    pub table_title: Option<String>,
    pub table_footnote: Option<String>,
    pub extraction_warnings: Vec<String>,
    pub rows: Vec<Vec<CellRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub value: Scalar,
    pub is_header: bool,
    pub data_type: DataType,
}

/// Page number to confidence-ranked tables. Pages without tables are absent.
pub type ExtractionResult = BTreeMap<u32, Vec<Table>>;

#[cfg(test)]
mod tests {
    use super::{Cell, CellFormatting, DataType, Scalar};

    #[test]
    fn null_cell_values_become_empty_text() {
        let cell = Cell::new(Scalar::Null, 0, 0);
        assert_eq!(cell.value, Scalar::Text(String::new()));
        assert!(cell.value.is_empty());
    }

    #[test]
    fn scalars_deserialize_untagged() {
        let values: Vec<Scalar> =
            serde_json::from_str(r#"[null, true, 1.5, "x"]"#).expect("scalars should parse");
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Bool(true),
                Scalar::Number(1.5),
                Scalar::Text("x".to_string()),
            ]
        );
        assert_eq!(Scalar::Number(10.0).to_string(), "10");
    }

    #[test]
    fn formats_numeric_cells_with_hints() {
        let mut cell = Cell::new(Scalar::Number(12.5), 1, 0);
        cell.data_type = DataType::Currency;
        cell.formatting = CellFormatting {
            decimal_places: None,
            currency_symbol: Some('€'),
        };
        assert_eq!(cell.formatted_value(), "€12.50");

        cell.data_type = DataType::Percentage;
        cell.formatting = CellFormatting {
            decimal_places: Some(1),
            currency_symbol: None,
        };
        assert_eq!(cell.formatted_value(), "12.5%");

        let text = Cell::new(Scalar::from("$3"), 1, 1);
        assert_eq!(text.formatted_value(), "$3");
    }
}
