//! Grid detection on plain page text: runs of consecutive lines that split
//! into enough cells form one grid.

use crate::model::{Grid, Scalar};

/// Splits on tabs and on runs of two or more spaces.
pub(crate) fn split_columns(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0_usize;

    let flush = |current: &mut String, cells: &mut Vec<String>| {
        let cell = current.trim();
        if !cell.is_empty() {
            cells.push(cell.to_string());
        }
        current.clear();
    };

    for ch in line.trim().chars() {
        if ch == '\t' {
            flush(&mut current, &mut cells);
            spaces = 0;
        } else if ch.is_whitespace() {
            spaces += 1;
            if spaces == 2 {
                flush(&mut current, &mut cells);
            } else if spaces == 1 {
                current.push(' ');
            }
        } else {
            spaces = 0;
            current.push(ch);
        }
    }
    flush(&mut current, &mut cells);

    cells
}

fn looks_like_sentence(line: &str) -> bool {
    line.trim_end().ends_with(['.', '!', '?'])
}

/// Cells of a line when it reads as a table row.
fn row_cells(line: &str, min_cols: usize) -> Option<Vec<String>> {
    let cells = split_columns(line);
    if cells.len() >= min_cols {
        return Some(cells);
    }

    let words = line.split_whitespace().map(str::to_string).collect::<Vec<_>>();
    let has_digit = words
        .iter()
        .any(|word| word.chars().any(|ch| ch.is_ascii_digit()));
    (words.len() >= min_cols && !looks_like_sentence(line) && (has_digit || words.len() <= 6))
        .then_some(words)
}

/// Grids of at least two consecutive row-like lines.
pub(crate) fn detect_grids(text: &str, min_cols: usize) -> Vec<Grid> {
    let min_cols = min_cols.max(2);
    let mut grids = Vec::new();
    let mut rows: Grid = Vec::new();

    let close = |rows: &mut Grid, grids: &mut Vec<Grid>| {
        if rows.len() >= 2 {
            grids.push(std::mem::take(rows));
        } else {
            rows.clear();
        }
    };

    for line in text.lines() {
        match row_cells(line, min_cols) {
            Some(cells) => rows.push(cells.into_iter().map(Scalar::from).collect()),
            None => close(&mut rows, &mut grids),
        }
    }
    close(&mut rows, &mut grids);

    grids
}

/// Score of how table-like a page text is; used to pick between decodings.
pub(crate) fn tabularity_score(text: &str) -> i64 {
    if text.trim().is_empty() {
        return i64::MIN / 4;
    }

    let mut score = 0_i64;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        score += 1;
        if row_cells(line, 2).is_some_and(|cells| cells.len() >= 3)
            || split_columns(line).len() >= 2
        {
            score += 50;
        }
    }
    score
}
