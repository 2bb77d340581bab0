use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use crate::model::{ExtractionMethod, Table};
use crate::options::ExtractOptions;
use crate::page::{GridExtractor, PageSource};
use crate::runner::{
    BuiltinRunner, ExternalToolRunner, GridRunner, MethodRunner, RunOutcome, run_guarded,
};
use crate::warning::ExtractWarning;

const FINGERPRINT_SPAN: usize = 3;

/// When the last-resort runners are attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Only when no primary runner produced a table.
    #[default]
    WhenEmpty,
    /// After the primary runners, regardless of their output.
    Always,
}

/// Top-left values of a table, row-major, joined with `|`.
///
/// Two tables with the same shape and fingerprint are treated as the same
/// table. Tables that share their first rows but differ further down collide.
#[must_use]
pub fn fingerprint(table: &Table) -> String {
    table
        .cells
        .iter()
        .take(FINGERPRINT_SPAN)
        .flat_map(|row| row.iter().take(FINGERPRINT_SPAN))
        .map(|cell| cell.value.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

#[derive(Default)]
struct Accumulator {
    seen: HashSet<((usize, usize), String)>,
    tables: Vec<Table>,
}

impl Accumulator {
    /// Adds the tables not seen before and returns how many were kept.
    fn absorb(&mut self, tables: Vec<Table>) -> usize {
        let before = self.tables.len();
        for table in tables {
            if self.seen.insert((table.shape(), fingerprint(&table))) {
                self.tables.push(table);
            }
        }
        self.tables.len() - before
    }
}

/// Runs every strategy for a page, drops duplicate discoveries and ranks
/// the rest by confidence.
#[derive(Default)]
pub struct PageReconciler {
    primary: Vec<Box<dyn MethodRunner>>,
    fallback: Vec<Box<dyn MethodRunner>>,
    fallback_policy: FallbackPolicy,
    parallel: bool,
}

impl PageReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard runner set, limited to the backends `options` declares
    /// available: grid-stream, grid-lattice, built-in, then the external
    /// tool as last resort.
    #[must_use]
    pub fn from_options(
        options: &ExtractOptions,
        grid_extractor: Option<Arc<dyn GridExtractor>>,
    ) -> Self {
        let mut reconciler = Self::new().with_parallel(options.parallel_runners);

        if let Some(extractor) = grid_extractor.filter(|_| options.capabilities.grid_extractor) {
            reconciler = reconciler
                .with_runner(GridRunner::stream(Arc::clone(&extractor)))
                .with_runner(GridRunner::lattice(extractor));
        }
        reconciler = reconciler.with_runner(BuiltinRunner);
        if options.capabilities.external_tool {
            reconciler =
                reconciler.with_fallback(ExternalToolRunner::new(options.external_tool.clone()));
        }

        reconciler
    }

    #[must_use]
    pub fn with_runner(mut self, runner: impl MethodRunner + 'static) -> Self {
        self.primary.push(Box::new(runner));
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, runner: impl MethodRunner + 'static) -> Self {
        self.fallback.push(Box::new(runner));
        self
    }

    #[must_use]
    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Methods in the order they are attempted.
    #[must_use]
    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.primary
            .iter()
            .chain(&self.fallback)
            .map(|runner| runner.method())
            .collect()
    }

    #[must_use]
    pub fn reconcile(&self, page: &dyn PageSource) -> Vec<Table> {
        self.reconcile_with_warnings(page, &mut Vec::new())
    }

    pub fn reconcile_with_warnings(
        &self,
        page: &dyn PageSource,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Vec<Table> {
        let mut accumulator = Accumulator::default();

        let primary = self.run_primary(page);
        for (runner, outcome) in self.primary.iter().zip(primary) {
            absorb_outcome(&mut accumulator, runner.method(), outcome, warnings);
        }

        let run_fallback = match self.fallback_policy {
            FallbackPolicy::WhenEmpty => accumulator.tables.is_empty(),
            FallbackPolicy::Always => true,
        };
        if run_fallback {
            for runner in &self.fallback {
                let outcome = run_guarded(runner.as_ref(), page);
                absorb_outcome(&mut accumulator, runner.method(), outcome, warnings);
            }
        }

        let mut tables = accumulator.tables;
        tables.sort_by(|a, b| b.info.confidence_score.total_cmp(&a.info.confidence_score));
        tables
    }

    /// Outcomes in runner priority order, whether or not the runners ran
    /// concurrently.
    fn run_primary(&self, page: &dyn PageSource) -> Vec<RunOutcome> {
        if !self.parallel || self.primary.len() < 2 {
            return self
                .primary
                .iter()
                .map(|runner| run_guarded(runner.as_ref(), page))
                .collect();
        }

        thread::scope(|scope| {
            let handles = self
                .primary
                .iter()
                .map(|runner| scope.spawn(move || run_guarded(runner.as_ref(), page)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_default())
                .collect()
        })
    }
}

fn absorb_outcome(
    accumulator: &mut Accumulator,
    method: ExtractionMethod,
    outcome: RunOutcome,
    warnings: &mut Vec<ExtractWarning>,
) {
    warnings.extend(outcome.warning);
    let found = outcome.tables.len();
    if found == 0 {
        return;
    }

    let kept = accumulator.absorb(outcome.tables);
    tracing::info!(
        %method,
        found,
        kept,
        "extracted {kept} new table(s) using {method}"
    );
}
