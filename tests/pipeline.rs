mod common;

use common::{FakePage, ScriptedRunner, grid};
use pdf_table_reconcile::{
    BuiltinRunner, DocumentAssembler, ExtractError, ExtractOptions, ExtractionMethod, Grid,
    PageReconciler, WarningCode, extract_pages,
};
use pretty_assertions::assert_eq;

fn header_table(rows: &[&str]) -> Grid {
    let mut cells: Vec<&[&str]> = Vec::new();
    cells.push(&["Region", "Units", "Revenue"]);
    for row in rows {
        cells.push(match *row {
            "north" => &["North", "10", "$100"],
            "south" => &["South", "12", "$120"],
            "east" => &["East", "7", "$70"],
            _ => &["West", "9", "$90"],
        });
    }
    grid(&cells)
}

#[test]
fn two_page_document_merges_the_continuation_only() {
    let runner = ScriptedRunner::new(ExtractionMethod::GridStream)
        .on_page(1, header_table(&["north", "south", "east"]), 0.9)
        .on_page(2, header_table(&["west", "north", "south"]), 0.85)
        .on_page(2, grid(&[&["Key", "Value"], &["a", "1"]]), 0.7);
    let pages = vec![FakePage::new(1, Vec::new()), FakePage::new(2, Vec::new())];

    let report = extract_pages(
        &pages,
        PageReconciler::new().with_runner(runner),
        &ExtractOptions::default(),
    )
    .expect("extraction should succeed");

    assert_eq!(report.page_count, 2);
    assert_eq!(report.tables.len(), 2);

    let merged = &report.tables[0];
    assert_eq!(merged.info.row_count, 8);
    assert_eq!(merged.shape(), (8, 3));
    assert!((merged.info.confidence_score - 0.85).abs() < 1e-9);
    assert_eq!(merged.info.page_number, 1);
    assert_eq!(
        merged.info.extraction_warnings,
        vec!["Continued on page 2".to_string()]
    );

    let unrelated = &report.tables[1];
    assert_eq!(unrelated.shape(), (2, 2));
    assert!((unrelated.info.confidence_score - 0.7).abs() < 1e-9);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn merging_can_be_switched_off() {
    let runner = ScriptedRunner::new(ExtractionMethod::GridLattice)
        .on_page(1, header_table(&["north"]), 0.9)
        .on_page(2, header_table(&["south"]), 0.8);
    let pages = vec![FakePage::new(1, Vec::new()), FakePage::new(2, Vec::new())];
    let options = ExtractOptions {
        merge_continuations: false,
        ..ExtractOptions::default()
    };

    let report = extract_pages(&pages, PageReconciler::new().with_runner(runner), &options)
        .expect("extraction should succeed");

    let pages_seen = report
        .tables
        .iter()
        .map(|table| table.info.page_number)
        .collect::<Vec<_>>();
    assert_eq!(pages_seen, vec![1, 2]);
}

#[test]
fn single_page_without_continuations_is_returned_unchanged() {
    let page = FakePage::new(
        3,
        vec![
            grid(&[&["A", "B", "C"], &["1", "2", "3"]]),
            grid(&[&["K", "V"], &["k", "v"]]),
        ],
    );
    let reconciler = PageReconciler::new().with_runner(BuiltinRunner);
    let reconciled = reconciler.reconcile(&page);

    let assembled = DocumentAssembler::new(PageReconciler::new().with_runner(BuiltinRunner))
        .assemble(&[&page])
        .expect("assembly should succeed");

    assert_eq!(assembled, reconciled);
}

#[test]
fn pages_out_of_order_are_rejected() {
    let pages = vec![FakePage::new(2, Vec::new()), FakePage::new(1, Vec::new())];
    let result = extract_pages(
        &pages,
        PageReconciler::new().with_runner(BuiltinRunner),
        &ExtractOptions::default(),
    );

    assert!(matches!(
        result,
        Err(ExtractError::PagesOutOfOrder {
            previous: 2,
            current: 1
        })
    ));
}

#[test]
fn empty_pages_and_weak_tables_are_reported() {
    let runner = ScriptedRunner::new(ExtractionMethod::ExternalTool).on_page(
        2,
        grid(&[&["x", "y"], &["1", "2"]]),
        0.4,
    );
    let pages = vec![FakePage::new(1, Vec::new()), FakePage::new(2, Vec::new())];

    let report = extract_pages(
        &pages,
        PageReconciler::new().with_runner(runner),
        &ExtractOptions::default(),
    )
    .expect("extraction should succeed");

    let codes = report
        .warnings
        .iter()
        .map(|warning| (warning.code, warning.page))
        .collect::<Vec<_>>();
    assert_eq!(
        codes,
        vec![
            (WarningCode::NoTablesDetected, Some(1)),
            (WarningCode::LowConfidence, Some(2)),
        ]
    );
    assert_eq!(report.table_count(), 1);
}

#[test]
fn duplicate_discoveries_keep_the_first_method() {
    let table = grid(&[&["A", "B"], &["1", "2"]]);
    let page = FakePage::new(1, vec![table.clone()]);
    let reconciler = PageReconciler::new()
        .with_runner(ScriptedRunner::new(ExtractionMethod::GridStream).on_page(1, table, 0.75))
        .with_runner(BuiltinRunner);

    let report = extract_pages(&[page], reconciler, &ExtractOptions::default())
        .expect("extraction should succeed");

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].info.method_used, ExtractionMethod::GridStream);
    assert!((report.tables[0].info.confidence_score - 0.75).abs() < 1e-9);
}

#[test]
fn empty_document_yields_an_empty_report() {
    let pages: Vec<FakePage> = Vec::new();
    let report = extract_pages(
        &pages,
        PageReconciler::new().with_runner(BuiltinRunner),
        &ExtractOptions::default(),
    )
    .expect("extraction should succeed");

    assert!(report.tables.is_empty());
    assert_eq!(report.page_count, 0);
}
