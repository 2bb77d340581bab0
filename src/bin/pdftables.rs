use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_table_reconcile::csv_out::{write_tables_csv, write_tables_csv_to_string};
use pdf_table_reconcile::regions::detect_page_regions;
use pdf_table_reconcile::{
    CommandGridExtractor, ExtractOptions, ExtractionReport, ExternalToolConfig, GridExtractor,
    HeaderMatch, PageSelection, PageSource, PdfDocument, extract_pdf_with,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pdftables",
    version,
    about = "Extract tables from PDFs with several methods and reconcile the results"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract, deduplicate and merge tables.
    Extract(ExtractArgs),
    /// Print likely table regions per page as JSON.
    Regions(RegionsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Output path; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Minimum cells per row for the built-in text grid detector.
    #[arg(long, default_value_t = 2)]
    min_cols: usize,

    /// Grid analyzer command for the stream and lattice methods.
    #[arg(long)]
    grid_command: Option<PathBuf>,

    /// Extra argument passed to the grid analyzer. Repeatable.
    #[arg(long = "grid-arg", requires = "grid_command")]
    grid_args: Vec<String>,

    /// Last-resort CSV extraction tool.
    #[arg(long, conflicts_with = "no_external")]
    tabula: Option<PathBuf>,

    /// Never run the last-resort tool.
    #[arg(long)]
    no_external: bool,

    /// Compare headers trimmed and case-folded when merging continuations.
    #[arg(long)]
    normalize_headers: bool,

    /// Run the primary methods of a page concurrently.
    #[arg(long)]
    parallel: bool,

    /// Keep tables that continue across pages separate.
    #[arg(long)]
    no_merge: bool,

    /// Enable info logging and list every warning.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct RegionsArgs {
    /// Input PDF path.
    #[arg(short, long)]
    input: PathBuf,

    /// Page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_pages(pages: Option<&str>) -> Result<Option<PageSelection>> {
    pages
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")
}

fn parse_options(args: &ExtractArgs) -> Result<ExtractOptions> {
    let mut options = ExtractOptions {
        pages: parse_pages(args.pages.as_deref())?,
        header_match: if args.normalize_headers {
            HeaderMatch::Normalized
        } else {
            HeaderMatch::Exact
        },
        parallel_runners: args.parallel,
        merge_continuations: !args.no_merge,
        min_cols: args.min_cols,
        ..ExtractOptions::default()
    };
    options.capabilities.grid_extractor = args.grid_command.is_some();
    options.capabilities.external_tool = !args.no_external;
    if let Some(program) = &args.tabula {
        options.external_tool = ExternalToolConfig {
            program: program.clone(),
            ..ExternalToolConfig::default()
        };
    }
    Ok(options)
}

fn grid_extractor(args: &ExtractArgs) -> Option<Arc<dyn GridExtractor>> {
    args.grid_command.as_ref().map(|program| {
        Arc::new(CommandGridExtractor::new(program.clone()).with_args(args.grid_args.clone()))
            as Arc<dyn GridExtractor>
    })
}

fn render_json(report: &ExtractionReport) -> Result<String> {
    let value = json!({
        "page_count": report.page_count,
        "tables": report.records(),
        "warnings": report.warnings,
    });
    serde_json::to_string_pretty(&value).context("failed to serialize report")
}

fn write_output(args: &ExtractArgs, report: &ExtractionReport) -> Result<()> {
    match (args.format, &args.output) {
        (OutputFormat::Csv, Some(path)) => write_tables_csv(path, &report.tables)
            .with_context(|| format!("failed to write '{}'", path.display())),
        (OutputFormat::Csv, None) => {
            print!("{}", write_tables_csv_to_string(&report.tables)?);
            Ok(())
        }
        (OutputFormat::Json, Some(path)) => std::fs::write(path, render_json(report)? + "\n")
            .with_context(|| format!("failed to write '{}'", path.display())),
        (OutputFormat::Json, None) => {
            println!("{}", render_json(report)?);
            Ok(())
        }
    }
}

fn log_report(report: &ExtractionReport, verbose: bool) {
    if report.warnings.is_empty() {
        return;
    }

    eprintln!("warning: {} issue(s) detected", report.warnings.len());
    if verbose {
        for warning in &report.warnings {
            eprintln!(
                "  - {:?} page={:?} method={:?} confidence={:?}: {}",
                warning.code, warning.page, warning.method, warning.confidence, warning.message
            );
        }
    }
}

fn run_extract(args: &ExtractArgs) -> Result<ExtractionReport> {
    let options = parse_options(args)?;
    let report = extract_pdf_with(&args.input, &options, grid_extractor(args))
        .with_context(|| format!("failed to extract tables from '{}'", args.input.display()))?;
    write_output(args, &report)?;
    Ok(report)
}

fn run_regions(args: &RegionsArgs) -> Result<usize> {
    let selection = parse_pages(args.pages.as_deref())?;
    let document = PdfDocument::open(&args.input)
        .with_context(|| format!("failed to open '{}'", args.input.display()))?;
    let pages = document.pages(selection.as_ref(), 2)?;

    let mut found = 0;
    let listing = pages
        .iter()
        .map(|page| {
            let regions = detect_page_regions(page);
            found += regions.len();
            json!({ "page": page.page_number(), "regions": regions })
        })
        .collect::<Vec<_>>();
    println!(
        "{}",
        serde_json::to_string_pretty(&listing).context("failed to serialize regions")?
    );
    Ok(found)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "pdf_table_reconcile=info"
    } else {
        "pdf_table_reconcile=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn exit_code(result: Result<usize>) -> ExitCode {
    match result {
        Ok(0) => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract(args) => {
            init_tracing(args.verbose);
            exit_code(run_extract(&args).map(|report| {
                log_report(&report, args.verbose);
                report.table_count()
            }))
        }
        Commands::Regions(args) => {
            init_tracing(args.verbose);
            exit_code(run_regions(&args))
        }
    }
}
