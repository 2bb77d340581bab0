mod assemble;
pub mod builder;
pub mod classify;
pub mod csv_out;
mod error;
mod extractor;
pub mod header;
mod model;
mod options;
mod page;
mod pdf_reader;
mod process;
mod reconcile;
pub mod regions;
mod runner;
mod text_grid;
mod warning;

use std::path::Path;
use std::sync::Arc;

pub use assemble::{DocumentAssembler, merge_sequential_pages, merge_tables, should_merge};
pub use error::ExtractError;
pub use extractor::CommandGridExtractor;
pub use model::{
    Cell, CellFormatting, CellRecord, DataType, ExtractionMethod, ExtractionResult, Grid,
    MergeSpan, Scalar, Table, TableInfo, TableRecord, grid_from_rows,
};
pub use options::{
    Capabilities, ExtractOptions, ExternalToolConfig, HeaderMatch, INPUT_PLACEHOLDER,
    PageSelection,
};
pub use page::{GridCandidate, GridExtractor, GridMode, LineSegment, PageSource, Word};
pub use pdf_reader::{PdfDocument, PdfPage};
pub use reconcile::{FallbackPolicy, PageReconciler, fingerprint};
pub use runner::{
    BUILTIN_CONFIDENCE, BuiltinRunner, DEFAULT_GRID_METRIC, EXTERNAL_TOOL_CONFIDENCE,
    ExternalToolRunner, GridRunner, MethodRunner, RunOutcome, grid_confidence, run_guarded,
};
pub use warning::{ExtractWarning, WarningCode};

/// Tables scoring below this are reported with a `LowConfidence` warning.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    pub tables: Vec<Table>,
    pub warnings: Vec<ExtractWarning>,
    pub page_count: usize,
}

impl ExtractionReport {
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn records(&self) -> Vec<TableRecord> {
        self.tables.iter().map(Table::to_record).collect()
    }
}

fn validate_options(options: &ExtractOptions) -> Result<(), ExtractError> {
    if options.min_cols < 2 {
        return Err(ExtractError::InvalidOption(
            "min_cols must be at least 2".to_string(),
        ));
    }
    if options.pages.as_ref().is_some_and(PageSelection::is_empty) {
        return Err(ExtractError::InvalidPageSelection(
            "page selection cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn flag_low_confidence(tables: &[Table], warnings: &mut Vec<ExtractWarning>) {
    for table in tables
        .iter()
        .filter(|table| table.info.confidence_score < LOW_CONFIDENCE_THRESHOLD)
    {
        warnings.push(
            ExtractWarning::new(WarningCode::LowConfidence, "table confidence is low")
                .with_page(table.info.page_number)
                .with_method(table.info.method_used)
                .with_confidence(table.info.confidence_score),
        );
    }
}

/// Reconciles and assembles any sequence of pages, supplied in ascending
/// page order.
pub fn extract_pages<P: PageSource>(
    pages: &[P],
    reconciler: PageReconciler,
    options: &ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    validate_options(options)?;

    let assembler = DocumentAssembler::new(reconciler)
        .with_header_match(options.header_match)
        .with_merging(options.merge_continuations);
    let mut warnings = Vec::new();
    let tables = assembler.assemble_with_warnings(pages, &mut warnings)?;
    flag_low_confidence(&tables, &mut warnings);

    tracing::info!(
        pages = pages.len(),
        tables = tables.len(),
        warnings = warnings.len(),
        "extraction finished"
    );
    Ok(ExtractionReport {
        tables,
        warnings,
        page_count: pages.len(),
    })
}

fn extract_document(
    document: &PdfDocument,
    options: &ExtractOptions,
    grid_extractor: Option<Arc<dyn GridExtractor>>,
) -> Result<ExtractionReport, ExtractError> {
    let pages = document.pages(options.pages.as_ref(), options.min_cols)?;
    let reconciler = PageReconciler::from_options(options, grid_extractor);
    extract_pages(&pages, reconciler, options)
}

pub fn extract_pdf(path: &Path, options: &ExtractOptions) -> Result<ExtractionReport, ExtractError> {
    extract_pdf_with(path, options, None)
}

/// Like [`extract_pdf`], with a grid analyzer for the stream and lattice
/// runners.
pub fn extract_pdf_with(
    path: &Path,
    options: &ExtractOptions,
    grid_extractor: Option<Arc<dyn GridExtractor>>,
) -> Result<ExtractionReport, ExtractError> {
    validate_options(options)?;
    let document = PdfDocument::open(path)?;
    extract_document(&document, options, grid_extractor)
}

pub fn extract_pdf_bytes(
    input_pdf: &[u8],
    options: &ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    extract_pdf_bytes_with(input_pdf, options, None)
}

pub fn extract_pdf_bytes_with(
    input_pdf: &[u8],
    options: &ExtractOptions,
    grid_extractor: Option<Arc<dyn GridExtractor>>,
) -> Result<ExtractionReport, ExtractError> {
    validate_options(options)?;
    let document = PdfDocument::from_bytes(input_pdf)?;
    extract_document(&document, options, grid_extractor)
}

#[cfg(test)]
mod tests {
    use super::{ExtractOptions, flag_low_confidence, validate_options};
    use crate::builder::build;
    use crate::error::ExtractError;
    use crate::model::{ExtractionMethod, grid_from_rows};
    use crate::warning::WarningCode;

    #[test]
    fn rejects_min_cols_below_two() {
        let options = ExtractOptions {
            min_cols: 1,
            ..ExtractOptions::default()
        };
        assert!(matches!(
            validate_options(&options),
            Err(ExtractError::InvalidOption(_))
        ));
        assert!(validate_options(&ExtractOptions::default()).is_ok());
    }

    #[test]
    fn low_confidence_tables_are_flagged() {
        let grid = grid_from_rows([vec!["a", "b"], vec!["c", "d"]]);
        let tables = vec![
            build(&grid, 1, ExtractionMethod::GridStream, 0.9, None),
            build(&grid, 2, ExtractionMethod::GridLattice, 0.4, None),
        ];
        let mut warnings = Vec::new();
        flag_low_confidence(&tables, &mut warnings);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::LowConfidence);
        assert_eq!(warnings[0].page, Some(2));
        assert_eq!(warnings[0].method, Some(ExtractionMethod::GridLattice));
    }
}
