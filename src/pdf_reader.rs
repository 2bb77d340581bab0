use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::error::ExtractError;
use crate::model::Grid;
use crate::options::PageSelection;
use crate::page::{LineSegment, PageSource, Word};
use crate::text_grid::{detect_grids, tabularity_score};

/// Estimated glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.5;
const DEFAULT_PAGE_HEIGHT: f64 = 792.0;
/// Words whose tops differ by less than this share a text line.
const LINE_TOLERANCE: f64 = 2.0;

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();
    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(body);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding.map(str::to_ascii_lowercase) {
        if ["utf16", "ucs2", "identity-h", "unicode"]
            .iter()
            .any(|hint| name.contains(hint))
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }
        if ["big5", "b5", "eten", "cns"].iter().any(|hint| name.contains(hint)) {
            let (big5, _, had_errors) = BIG5.decode(bytes);
            if !had_errors && !big5.is_empty() {
                return big5.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn number(object: &Object) -> Option<f64> {
    match object {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(number).collect()
}

/// Height of the page's media box, following inherited attributes.
fn page_height(document: &Document, page_id: ObjectId) -> f64 {
    let mut current = document.get_dictionary(page_id).ok();
    while let Some(dictionary) = current {
        if let Ok(Object::Array(bounds)) = dictionary.get(b"MediaBox") {
            let bounds = bounds.iter().filter_map(number).collect::<Vec<_>>();
            if let [_, y0, _, y1] = bounds[..] {
                return (y1 - y0).abs();
            }
        }
        current = dictionary
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|parent| document.get_dictionary(parent))
            .ok();
    }
    DEFAULT_PAGE_HEIGHT
}

/// Walks a content stream, tracking text and path positions.
struct ContentWalker<'a> {
    encodings: BTreeMap<Vec<u8>, &'a str>,
    height: f64,
    encoding: Option<&'a str>,
    font_size: f64,
    scale: f64,
    leading: f64,
    line_start: (f64, f64),
    cursor: (f64, f64),
    word: Option<(String, f64)>,
    words: Vec<Word>,
    path_point: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
    segments: Vec<LineSegment>,
}

impl<'a> ContentWalker<'a> {
    fn new(encodings: BTreeMap<Vec<u8>, &'a str>, height: f64) -> Self {
        Self {
            encodings,
            height,
            encoding: None,
            font_size: 12.0,
            scale: 1.0,
            leading: 0.0,
            line_start: (0.0, 0.0),
            cursor: (0.0, 0.0),
            word: None,
            words: Vec::new(),
            path_point: None,
            subpath_start: None,
            segments: Vec::new(),
        }
    }

    fn advance(&self) -> f64 {
        self.font_size * self.scale * GLYPH_WIDTH
    }

    fn end_word(&mut self) {
        let Some((text, x0)) = self.word.take() else {
            return;
        };
        let baseline = self.height - self.cursor.1;
        self.words.push(Word {
            text,
            x0,
            x1: self.cursor.0,
            top: baseline - self.font_size * self.scale,
            bottom: baseline,
        });
    }

    fn move_line(&mut self, x: f64, y: f64) {
        self.end_word();
        self.line_start = (x, y);
        self.cursor = (x, y);
    }

    fn next_line(&mut self) {
        let (x, y) = self.line_start;
        self.move_line(x, y - self.leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = decode_pdf_bytes(self.encoding, bytes);
        let advance = self.advance();
        for ch in text.chars() {
            if ch.is_whitespace() {
                self.end_word();
            } else {
                let start = self.cursor.0;
                self.word
                    .get_or_insert_with(|| (String::new(), start))
                    .0
                    .push(ch);
            }
            self.cursor.0 += advance;
        }
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    if let Some(adjust) = number(other) {
                        if adjust < -100.0 {
                            self.end_word();
                        }
                        self.cursor.0 -= adjust / 1000.0 * self.font_size * self.scale;
                    }
                }
            }
        }
    }

    fn segment(&mut self, from: (f64, f64), to: (f64, f64)) {
        self.segments.push(LineSegment {
            x0: from.0,
            y0: self.height - from.1,
            x1: to.0,
            y1: self.height - to.1,
        });
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let values = numbers(operands);
        match (operator, values.as_slice()) {
            ("BT", _) => {
                self.scale = 1.0;
                self.move_line(0.0, 0.0);
            }
            ("ET", _) => self.end_word(),
            ("Tf", _) => {
                if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.encoding = self.encodings.get(name).copied();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            ("TL", [leading, ..]) => self.leading = *leading,
            ("Td", [tx, ty, ..]) => {
                let (x, y) = self.line_start;
                self.move_line(x + tx, y + ty);
            }
            ("TD", [tx, ty, ..]) => {
                self.leading = -ty;
                let (x, y) = self.line_start;
                self.move_line(x + tx, y + ty);
            }
            ("Tm", [_, _, _, d, e, f, ..]) => {
                self.scale = if *d == 0.0 { 1.0 } else { d.abs() };
                self.move_line(*e, *f);
            }
            ("T*", _) => self.next_line(),
            ("Tj", _) => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            ("TJ", _) => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            ("'", _) => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            ("\"", _) => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            ("m", [x, y, ..]) => {
                self.path_point = Some((*x, *y));
                self.subpath_start = Some((*x, *y));
            }
            ("l", [x, y, ..]) => {
                if let Some(from) = self.path_point {
                    self.segment(from, (*x, *y));
                }
                self.path_point = Some((*x, *y));
            }
            ("h", _) => {
                if let (Some(from), Some(to)) = (self.path_point, self.subpath_start) {
                    if from != to {
                        self.segment(from, to);
                    }
                    self.path_point = Some(to);
                }
            }
            ("re", [x, y, w, h, ..]) => {
                let corners = [
                    (*x, *y),
                    (x + w, *y),
                    (x + w, y + h),
                    (*x, y + h),
                ];
                for index in 0..corners.len() {
                    self.segment(corners[index], corners[(index + 1) % corners.len()]);
                }
                self.path_point = Some((*x, *y));
                self.subpath_start = Some((*x, *y));
            }
            _ => {}
        }
    }
}

/// Joins positioned words into text lines; wide gaps become double spaces so
/// that columns survive as cell separators.
fn words_to_text(words: &[Word]) -> String {
    let mut ordered = words.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.x0.total_cmp(&b.x0)));

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    for word in ordered {
        match lines.last_mut() {
            Some(line) if (line[0].top - word.top).abs() < LINE_TOLERANCE => line.push(word),
            _ => lines.push(vec![word]),
        }
    }

    lines
        .iter_mut()
        .map(|line| {
            line.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            let mut text = String::new();
            let mut previous: Option<&Word> = None;
            for word in line.iter().copied() {
                if let Some(previous) = previous {
                    #[allow(clippy::cast_precision_loss)]
                    let glyph = (previous.x1 - previous.x0) / previous.text.chars().count().max(1) as f64;
                    let gap = word.x0 - previous.x1;
                    text.push_str(if gap > glyph * 1.5 { "  " } else { " " });
                }
                text.push_str(&word.text);
                previous = Some(word);
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A loaded PDF whose pages act as [`PageSource`]s.
pub struct PdfDocument {
    document: Document,
    extracted_pages: Option<Vec<String>>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractError> {
        let document = Document::load_mem(bytes)?;
        let page_count = document.get_pages().len();

        // pdf-extract separates pages with form feeds; only trust it when the
        // page count lines up.
        let extracted_pages = pdf_extract::extract_text_from_mem(bytes)
            .ok()
            .map(|text| {
                let mut pages = text.split('\u{000C}').map(str::to_string).collect::<Vec<_>>();
                if pages.last().is_some_and(String::is_empty) {
                    pages.pop();
                }
                pages
            })
            .filter(|pages| pages.len() == page_count);

        Ok(Self {
            document,
            extracted_pages,
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Selected pages in ascending order.
    pub fn pages(
        &self,
        selection: Option<&PageSelection>,
        min_cols: usize,
    ) -> Result<Vec<PdfPage<'_>>, ExtractError> {
        let mut pages = Vec::new();
        for (index, (page_number, page_id)) in self.document.get_pages().into_iter().enumerate() {
            if selection.is_some_and(|selection| !selection.contains(page_number)) {
                continue;
            }
            pages.push(self.read_page(index, page_number, page_id, min_cols));
        }

        if pages.is_empty() {
            return Err(ExtractError::NoPagesSelected);
        }
        Ok(pages)
    }

    fn read_page(
        &self,
        index: usize,
        page_number: u32,
        page_id: ObjectId,
        min_cols: usize,
    ) -> PdfPage<'_> {
        let (words, lines) = self.walk_content(page_id);

        let mut candidates = Vec::new();
        if let Some(text) = self
            .extracted_pages
            .as_ref()
            .and_then(|pages| pages.get(index))
            .filter(|text| !text.trim().is_empty())
        {
            candidates.push(text.clone());
        }
        if let Ok(text) = self.document.extract_text(&[page_number]) {
            if !text.trim().is_empty() {
                candidates.push(text);
            }
        }
        candidates.push(words_to_text(&words));

        // Later candidates win ties, so the positional text is preferred.
        let text = candidates
            .into_iter()
            .max_by_key(|text| {
                let penalty = if looks_decoding_broken(text) { 800 } else { 0 };
                tabularity_score(text) - penalty
            })
            .unwrap_or_default();

        PdfPage {
            document: &self.document,
            page_number,
            text,
            words,
            lines,
            min_cols,
        }
    }

    fn walk_content(&self, page_id: ObjectId) -> (Vec<Word>, Vec<LineSegment>) {
        let encodings = self
            .document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, font.get_font_encoding()))
            .collect::<BTreeMap<Vec<u8>, &str>>();
        let mut walker = ContentWalker::new(encodings, page_height(&self.document, page_id));

        let content = self
            .document
            .get_page_content(page_id)
            .ok()
            .and_then(|raw| Content::decode(&raw).ok());
        let Some(content) = content else {
            tracing::debug!(?page_id, "page content could not be decoded");
            return (Vec::new(), Vec::new());
        };

        for operation in &content.operations {
            walker.apply(&operation.operator, &operation.operands);
        }
        walker.end_word();
        (walker.words, walker.segments)
    }
}

/// One page of a [`PdfDocument`].
pub struct PdfPage<'a> {
    document: &'a Document,
    page_number: u32,
    text: String,
    words: Vec<Word>,
    lines: Vec<LineSegment>,
    min_cols: usize,
}

impl PdfPage<'_> {
    /// The page text the built-in grid detection runs on.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PageSource for PdfPage<'_> {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn extract_tables(&self) -> Result<Vec<Grid>, ExtractError> {
        Ok(detect_grids(&self.text, self.min_cols))
    }

    fn extract_words(&self) -> Vec<Word> {
        self.words.clone()
    }

    fn lines(&self) -> Vec<LineSegment> {
        self.lines.clone()
    }

    fn render_standalone(&self) -> Result<Vec<u8>, ExtractError> {
        let mut single = self.document.clone();
        let others = single
            .get_pages()
            .into_keys()
            .filter(|number| *number != self.page_number)
            .collect::<Vec<_>>();
        single.delete_pages(&others);
        single.prune_objects();

        let mut bytes = Vec::new();
        single.save_to(&mut bytes).map_err(|error| ExtractError::PageRender {
            page: self.page_number,
            reason: error.to_string(),
        })?;
        Ok(bytes)
    }
}
