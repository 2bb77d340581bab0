use std::io::Write;
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::error::ExtractError;
use crate::model::Table;

fn header_record(width: usize) -> Vec<String> {
    ["page", "table", "row"]
        .into_iter()
        .map(str::to_string)
        .chain((1..=width).map(|column| format!("col_{column}")))
        .collect()
}

fn write_records<W: Write>(writer: &mut Writer<W>, tables: &[Table]) -> Result<(), ExtractError> {
    let width = tables
        .iter()
        .map(|table| table.shape().1)
        .max()
        .unwrap_or_default();
    writer.write_record(header_record(width))?;

    for (table_index, table) in tables.iter().enumerate() {
        for row in &table.cells {
            let mut record = Vec::with_capacity(width + 3);
            record.push(table.info.page_number.to_string());
            record.push((table_index + 1).to_string());
            record.push((row.first().map_or(0, |cell| cell.row_index) + 1).to_string());
            record.extend(row.iter().map(|cell| cell.value.to_string()));
            record.resize(width + 3, String::new());
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes every table row as one record: `page,table,row,col_1..col_n`,
/// padded to the widest table.
pub fn write_tables_csv(path: &Path, tables: &[Table]) -> Result<(), ExtractError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    write_records(&mut writer, tables)
}

pub fn write_tables_csv_to_string(tables: &[Table]) -> Result<String, ExtractError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::<u8>::new());
    write_records(&mut writer, tables)?;

    let bytes = writer
        .into_inner()
        .map_err(|error| ExtractError::Csv(error.into_error().into()))?;
    String::from_utf8(bytes)
        .map_err(|error| ExtractError::InvalidOption(format!("invalid utf-8 csv output: {error}")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::write_tables_csv_to_string;
    use crate::builder::build;
    use crate::model::{ExtractionMethod, grid_from_rows};

    #[test]
    fn pads_narrow_tables_to_the_widest() {
        let wide = build(
            &grid_from_rows([vec!["A", "B", "C"], vec!["1", "2", "3"]]),
            1,
            ExtractionMethod::PageBuiltin,
            0.85,
            None,
        );
        let narrow = build(
            &grid_from_rows([vec!["K", "V"], vec!["x, y", "z"]]),
            2,
            ExtractionMethod::PageBuiltin,
            0.85,
            None,
        );

        let csv = write_tables_csv_to_string(&[wide, narrow]).expect("csv should render");
        assert_eq!(
            csv,
            "page,table,row,col_1,col_2,col_3\n\
             1,1,1,A,B,C\n\
             1,1,2,1,2,3\n\
             2,2,1,K,V,\n\
             2,2,2,\"x, y\",z,\n"
        );
    }

    #[test]
    fn empty_table_list_writes_only_the_fixed_columns() {
        let csv = write_tables_csv_to_string(&[]).expect("csv should render");
        assert_eq!(csv, "page,table,row\n");
    }
}
