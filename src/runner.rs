//! One runner per extraction strategy. Every runner turns whatever its
//! backend produced into [`Table`]s; failures stop at [`run_guarded`].

use std::any::Any;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::Command;
use std::sync::Arc;

use csv::ReaderBuilder;
use tempfile::Builder;

use crate::builder::build;
use crate::error::ExtractError;
use crate::model::{ExtractionMethod, Grid, Scalar, Table};
use crate::options::{ExternalToolConfig, INPUT_PLACEHOLDER};
use crate::page::{GridExtractor, GridMode, PageSource};
use crate::process::run_with_timeout;
use crate::warning::{ExtractWarning, WarningCode};

/// Confidence of the page backend's own extraction, which reports no metric.
pub const BUILTIN_CONFIDENCE: f64 = 0.85;
/// Confidence of the out-of-process tool.
pub const EXTERNAL_TOOL_CONFIDENCE: f64 = 0.80;
/// Used for a grid metric the extractor did not report.
pub const DEFAULT_GRID_METRIC: f64 = 0.9;

pub trait MethodRunner: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    fn extract(&self, page: &dyn PageSource) -> Result<Vec<Table>, ExtractError>;
}

/// Tables produced by one guarded runner invocation.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub tables: Vec<Table>,
    pub warning: Option<ExtractWarning>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one strategy; errors and panics become an empty result plus a warning.
pub fn run_guarded(runner: &dyn MethodRunner, page: &dyn PageSource) -> RunOutcome {
    let method = runner.method();
    let page_number = page.page_number();

    let result = catch_unwind(AssertUnwindSafe(|| runner.extract(page))).unwrap_or_else(
        |payload| {
            Err(ExtractError::RunnerPanicked {
                method,
                message: panic_message(payload.as_ref()),
            })
        },
    );

    match result {
        Ok(tables) => {
            tracing::debug!(
                page = page_number,
                %method,
                count = tables.len(),
                "runner finished"
            );
            RunOutcome {
                tables,
                warning: None,
            }
        }
        Err(error) => {
            tracing::warn!(page = page_number, %method, "{method} extraction failed: {error}");
            let code = if error.is_unavailable() {
                WarningCode::RunnerUnavailable
            } else {
                WarningCode::RunnerFailed
            };
            RunOutcome {
                tables: Vec::new(),
                warning: Some(
                    ExtractWarning::new(code, error.to_string())
                        .with_page(page_number)
                        .with_method(method),
                ),
            }
        }
    }
}

/// Builds one table per grid, titled by position.
fn tables_from_grids<I>(grids: I, page_number: u32, method: ExtractionMethod) -> Vec<Table>
where
    I: IntoIterator<Item = (Grid, f64)>,
{
    grids
        .into_iter()
        .enumerate()
        .map(|(index, (grid, confidence))| {
            build(
                &grid,
                page_number,
                method,
                confidence,
                Some(format!("Table {}", index + 1)),
            )
        })
        .collect()
}

fn unit_metric(metric: Option<f64>) -> f64 {
    let value = metric.filter(|value| value.is_finite()).unwrap_or(DEFAULT_GRID_METRIC);
    if value > 1.0 { value / 100.0 } else { value }
}

/// Mean of accuracy and precision on a 0–1 scale.
#[must_use]
pub fn grid_confidence(accuracy: Option<f64>, precision: Option<f64>) -> f64 {
    ((unit_metric(accuracy) + unit_metric(precision)) / 2.0).clamp(0.0, 1.0)
}

/// Asks a [`GridExtractor`] to analyze a single-page rendition.
pub struct GridRunner {
    extractor: Arc<dyn GridExtractor>,
    mode: GridMode,
}

impl GridRunner {
    #[must_use]
    pub fn new(extractor: Arc<dyn GridExtractor>, mode: GridMode) -> Self {
        Self { extractor, mode }
    }

    #[must_use]
    pub fn stream(extractor: Arc<dyn GridExtractor>) -> Self {
        Self::new(extractor, GridMode::Stream)
    }

    #[must_use]
    pub fn lattice(extractor: Arc<dyn GridExtractor>) -> Self {
        Self::new(extractor, GridMode::Lattice)
    }
}

impl MethodRunner for GridRunner {
    fn method(&self) -> ExtractionMethod {
        match self.mode {
            GridMode::Stream => ExtractionMethod::GridStream,
            GridMode::Lattice => ExtractionMethod::GridLattice,
        }
    }

    fn extract(&self, page: &dyn PageSource) -> Result<Vec<Table>, ExtractError> {
        let document = page.render_standalone()?;
        let candidates = self.extractor.analyze(&document, "1", self.mode)?;
        Ok(tables_from_grids(
            candidates.into_iter().map(|candidate| {
                let confidence = grid_confidence(candidate.accuracy, candidate.precision);
                (candidate.grid, confidence)
            }),
            page.page_number(),
            self.method(),
        ))
    }
}

/// Uses the page backend's own table extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRunner;

impl MethodRunner for BuiltinRunner {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PageBuiltin
    }

    fn extract(&self, page: &dyn PageSource) -> Result<Vec<Table>, ExtractError> {
        let grids = page.extract_tables()?;
        Ok(tables_from_grids(
            grids.into_iter().map(|grid| (grid, BUILTIN_CONFIDENCE)),
            page.page_number(),
            self.method(),
        ))
    }
}

/// Splits CSV output into tables at blank lines.
pub(crate) fn parse_csv_tables(text: &str) -> Result<Vec<Grid>, ExtractError> {
    let mut chunks = vec![String::new()];
    for line in text.lines() {
        if line.trim().is_empty() {
            if chunks.last().is_some_and(|chunk| !chunk.is_empty()) {
                chunks.push(String::new());
            }
            continue;
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push_str(line);
            chunk.push('\n');
        }
    }

    let mut grids = Vec::new();
    for chunk in chunks.iter().filter(|chunk| !chunk.is_empty()) {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(chunk.as_bytes());
        let mut grid = Grid::new();
        for record in reader.records() {
            grid.push(record?.iter().map(Scalar::from).collect());
        }
        if !grid.is_empty() {
            grids.push(grid);
        }
    }
    Ok(grids)
}

/// Hands a single-page rendition to an out-of-process tool that prints CSV.
///
/// The temporary page file lives for exactly one `extract` call and is
/// removed on drop, whichever way the call ends.
#[derive(Debug, Clone)]
pub struct ExternalToolRunner {
    config: ExternalToolConfig,
}

impl ExternalToolRunner {
    #[must_use]
    pub fn new(config: ExternalToolConfig) -> Self {
        Self { config }
    }
}

impl MethodRunner for ExternalToolRunner {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ExternalTool
    }

    fn extract(&self, page: &dyn PageSource) -> Result<Vec<Table>, ExtractError> {
        let document = page.render_standalone()?;
        let mut input = Builder::new()
            .prefix("page-")
            .suffix(".pdf")
            .tempfile()?;
        input.write_all(&document)?;
        input.flush()?;

        let input_path = input.path().to_string_lossy().into_owned();
        let mut command = Command::new(&self.config.program);
        command.args(
            self.config
                .args
                .iter()
                .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input_path)),
        );

        let tool = self.config.program.display().to_string();
        let output = run_with_timeout(command, &tool, self.config.timeout)?;
        let grids = parse_csv_tables(&output.stdout)?;
        Ok(tables_from_grids(
            grids
                .into_iter()
                .map(|grid| (grid, EXTERNAL_TOOL_CONFIDENCE)),
            page.page_number(),
            self.method(),
        ))
    }
}
