use crate::classify::{classify, formatting_hints};
use crate::error::ExtractError;
use crate::model::{ExtractionResult, Table, TableInfo};
use crate::options::HeaderMatch;
use crate::page::PageSource;
use crate::reconcile::PageReconciler;
use crate::warning::{ExtractWarning, WarningCode};

/// Whether `next` continues `current`: same column count and, when both
/// carry a header row, matching header values.
#[must_use]
pub fn should_merge(current: &Table, next: &Table, header_match: HeaderMatch) -> bool {
    if current.shape().1 != next.shape().1 {
        return false;
    }

    if current.info.has_header && next.info.has_header {
        let left = current.headers();
        let right = next.headers();
        return left.len() == right.len()
            && left
                .iter()
                .zip(&right)
                .all(|(a, b)| header_match.matches(&a.to_string(), &b.to_string()));
    }

    true
}

/// Appends the rows of `second` to `first`, producing a new table.
///
/// The merged table keeps the first table's page, method and title, takes
/// the lower of the two confidences and records where it continued. Column
/// types are recomputed over the combined body so they stay uniform.
#[must_use]
pub fn merge_tables(first: &Table, second: &Table, second_page: u32) -> Table {
    let width = first.shape().1;
    let mut cells = first.cells.clone();
    cells.extend(second.cells.iter().cloned());
    for (row_index, row) in cells.iter_mut().enumerate() {
        for cell in row {
            cell.row_index = row_index;
        }
    }

    for column in 0..width {
        let data_type = classify(
            cells
                .iter()
                .filter_map(|row| row.get(column))
                .filter(|cell| !cell.is_header)
                .map(|cell| &cell.value),
        );
        for cell in cells.iter_mut().filter_map(|row| row.get_mut(column)) {
            cell.data_type = data_type;
            if !cell.is_header {
                cell.formatting = formatting_hints(&cell.value, data_type);
            }
        }
    }

    let mut extraction_warnings = first.info.extraction_warnings.clone();
    extraction_warnings.push(format!("Continued on page {second_page}"));

    let mut raw_data = first.raw_data.clone();
    raw_data.extend(second.raw_data.iter().cloned());

    Table {
        info: TableInfo {
            page_number: first.info.page_number,
            method_used: first.info.method_used,
            confidence_score: first
                .info
                .confidence_score
                .min(second.info.confidence_score),
            row_count: cells.len(),
            column_count: width,
            has_header: first.info.has_header,
            table_title: first.info.table_title.clone(),
            table_footnote: first.info.table_footnote.clone(),
            extraction_warnings,
        },
        cells,
        raw_data,
    }
}

/// Single forward pass over tables in encounter order, folding each
/// continuation into the table before it.
fn merge_in_order<I>(tables: I, header_match: HeaderMatch) -> Vec<Table>
where
    I: IntoIterator<Item = Table>,
{
    let mut merged = Vec::new();
    let mut current: Option<Table> = None;

    for table in tables {
        current = Some(match current.take() {
            None => table,
            Some(open) if should_merge(&open, &table, header_match) => {
                tracing::debug!(
                    from = open.info.page_number,
                    to = table.info.page_number,
                    "merging table continuation"
                );
                merge_tables(&open, &table, table.info.page_number)
            }
            Some(open) => {
                merged.push(open);
                table
            }
        });
    }

    merged.extend(current);
    merged
}

/// Merges tables that continue across consecutive pages of a per-page result.
#[must_use]
pub fn merge_sequential_pages(result: ExtractionResult, header_match: HeaderMatch) -> Vec<Table> {
    merge_in_order(result.into_values().flatten(), header_match)
}

/// Drives a [`PageReconciler`] over a whole document.
pub struct DocumentAssembler {
    reconciler: PageReconciler,
    header_match: HeaderMatch,
    merge_continuations: bool,
}

impl DocumentAssembler {
    #[must_use]
    pub fn new(reconciler: PageReconciler) -> Self {
        Self {
            reconciler,
            header_match: HeaderMatch::default(),
            merge_continuations: true,
        }
    }

    #[must_use]
    pub fn with_header_match(mut self, header_match: HeaderMatch) -> Self {
        self.header_match = header_match;
        self
    }

    #[must_use]
    pub fn with_merging(mut self, merge_continuations: bool) -> Self {
        self.merge_continuations = merge_continuations;
        self
    }

    /// Reconciles every page. Pages must come in ascending page order.
    pub fn extract_pages<P: PageSource>(
        &self,
        pages: &[P],
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<ExtractionResult, ExtractError> {
        let mut result = ExtractionResult::new();
        let mut previous: Option<u32> = None;

        for page in pages {
            let page_number = page.page_number();
            if let Some(previous) = previous.filter(|previous| *previous >= page_number) {
                return Err(ExtractError::PagesOutOfOrder {
                    previous,
                    current: page_number,
                });
            }
            previous = Some(page_number);

            tracing::info!(page = page_number, "processing page");
            let tables = self.reconciler.reconcile_with_warnings(page, warnings);
            if tables.is_empty() {
                tracing::info!(page = page_number, "no tables found");
                warnings.push(
                    ExtractWarning::new(WarningCode::NoTablesDetected, "no tables found on page")
                        .with_page(page_number),
                );
                continue;
            }

            for table in &tables {
                tracing::info!(
                    page = page_number,
                    method = %table.info.method_used,
                    "extracted table with confidence {:.2}%",
                    table.info.confidence_score * 100.0
                );
            }
            result.insert(page_number, tables);
        }

        Ok(result)
    }

    pub fn assemble<P: PageSource>(&self, pages: &[P]) -> Result<Vec<Table>, ExtractError> {
        self.assemble_with_warnings(pages, &mut Vec::new())
    }

    /// One logical table list for the document, continuations merged unless
    /// merging is switched off.
    pub fn assemble_with_warnings<P: PageSource>(
        &self,
        pages: &[P],
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Vec<Table>, ExtractError> {
        let result = self.extract_pages(pages, warnings)?;
        if self.merge_continuations {
            Ok(merge_sequential_pages(result, self.header_match))
        } else {
            Ok(result.into_values().flatten().collect())
        }
    }
}
