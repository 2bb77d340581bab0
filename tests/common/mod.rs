#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pdf_table_reconcile::builder::build;
use pdf_table_reconcile::{
    ExtractError, ExtractionMethod, Grid, LineSegment, MethodRunner, PageSource, Table, Word,
    grid_from_rows,
};

/// One page of text lines in Courier 12, 16 units apart, framed by a ruled
/// rectangle.
pub fn test_pdf_bytes(pages: &[Vec<&str>]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new(
                "re",
                vec![40.into(), 600.into(), 400.into(), 200.into()],
            ),
            Operation::new("S", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![16.into()]),
            Operation::new("Td", vec![50.into(), 780.into()]),
        ];
        for (index, line) in lines.iter().enumerate() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            if index + 1 < lines.len() {
                operations.push(Operation::new("T*", vec![]));
            }
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

pub fn create_test_pdf(path: &Path, pages: &[Vec<&str>]) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, test_pdf_bytes(pages)?)?;
    Ok(())
}

pub fn grid(rows: &[&[&str]]) -> Grid {
    grid_from_rows(rows.iter().map(|row| row.iter().copied()))
}

/// A page that exposes fixed grids through its built-in extraction.
pub struct FakePage {
    pub number: u32,
    pub grids: Vec<Grid>,
    pub words: Vec<Word>,
}

impl FakePage {
    pub fn new(number: u32, grids: Vec<Grid>) -> Self {
        Self {
            number,
            grids,
            words: Vec::new(),
        }
    }
}

impl PageSource for FakePage {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn extract_tables(&self) -> Result<Vec<Grid>, ExtractError> {
        Ok(self.grids.clone())
    }

    fn extract_words(&self) -> Vec<Word> {
        self.words.clone()
    }

    fn lines(&self) -> Vec<LineSegment> {
        Vec::new()
    }

    fn render_standalone(&self) -> Result<Vec<u8>, ExtractError> {
        Ok(Vec::new())
    }
}

/// A runner that reports preset grids and confidences per page number.
pub struct ScriptedRunner {
    pub method: ExtractionMethod,
    pub by_page: BTreeMap<u32, Vec<(Grid, f64)>>,
}

impl ScriptedRunner {
    pub fn new(method: ExtractionMethod) -> Self {
        Self {
            method,
            by_page: BTreeMap::new(),
        }
    }

    pub fn on_page(mut self, page: u32, grid: Grid, confidence: f64) -> Self {
        self.by_page.entry(page).or_default().push((grid, confidence));
        self
    }
}

impl MethodRunner for ScriptedRunner {
    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn extract(&self, page: &dyn PageSource) -> Result<Vec<Table>, ExtractError> {
        let page_number = page.page_number();
        Ok(self
            .by_page
            .get(&page_number)
            .into_iter()
            .flatten()
            .map(|(grid, confidence)| build(grid, page_number, self.method, *confidence, None))
            .collect())
    }
}
