use std::collections::BTreeMap;

use serde::Serialize;

use crate::page::{PageSource, Word};

const BAND_HEIGHT: f64 = 20.0;
const REGION_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    PotentialTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRegion {
    /// `(x0, y0, x1, y1)`
    pub bbox: (f64, f64, f64, f64),
    pub kind: RegionKind,
    pub confidence: f64,
}

#[allow(clippy::cast_possible_truncation)]
fn band_key(top: f64) -> i64 {
    (top / BAND_HEIGHT).round() as i64
}

/// Cheap pre-filter: words whose 20-unit vertical bands are regularly spaced
/// suggest a table spanning all of them.
#[must_use]
pub fn detect_table_regions(words: &[Word]) -> Vec<TableRegion> {
    let mut bands: BTreeMap<i64, usize> = BTreeMap::new();
    for word in words {
        *bands.entry(band_key(word.top)).or_default() += 1;
    }
    if bands.len() <= 2 {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let positions = bands
        .keys()
        .map(|key| *key as f64 * BAND_HEIGHT)
        .collect::<Vec<_>>();
    let gaps = positions
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect::<Vec<_>>();

    #[allow(clippy::cast_precision_loss)]
    let count = gaps.len() as f64;
    let mean = gaps.iter().sum::<f64>() / count;
    let std_dev = (gaps.iter().map(|gap| (gap - mean).powi(2)).sum::<f64>() / count).sqrt();
    if std_dev >= mean * 0.5 {
        return Vec::new();
    }

    let x0 = words.iter().map(|word| word.x0).fold(f64::INFINITY, f64::min);
    let y0 = words.iter().map(|word| word.top).fold(f64::INFINITY, f64::min);
    let x1 = words.iter().map(|word| word.x1).fold(f64::NEG_INFINITY, f64::max);
    let y1 = words
        .iter()
        .map(|word| word.bottom)
        .fold(f64::NEG_INFINITY, f64::max);

    vec![TableRegion {
        bbox: (x0, y0, x1, y1),
        kind: RegionKind::PotentialTable,
        confidence: REGION_CONFIDENCE,
    }]
}

#[must_use]
pub fn detect_page_regions(page: &dyn PageSource) -> Vec<TableRegion> {
    detect_table_regions(&page.extract_words())
}

#[cfg(test)]
mod tests {
    use super::{RegionKind, detect_table_regions};
    use crate::page::Word;

    fn word(x0: f64, top: f64) -> Word {
        Word {
            text: "w".to_string(),
            x0,
            x1: x0 + 30.0,
            top,
            bottom: top + 10.0,
        }
    }

    #[test]
    fn regular_rows_produce_one_region() {
        let words = (0..5)
            .flat_map(|row| {
                let top = 100.0 + f64::from(row) * 20.0;
                [word(50.0, top), word(150.0, top)]
            })
            .collect::<Vec<_>>();

        let regions = detect_table_regions(&words);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::PotentialTable);
        assert_eq!(regions[0].bbox, (50.0, 100.0, 180.0, 190.0));
        assert!((regions[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn irregular_spacing_produces_nothing() {
        let words = [100.0, 120.0, 300.0, 320.0, 700.0]
            .into_iter()
            .map(|top| word(10.0, top))
            .collect::<Vec<_>>();
        assert!(detect_table_regions(&words).is_empty());
    }

    #[test]
    fn needs_more_than_two_bands() {
        let words = vec![word(10.0, 100.0), word(10.0, 120.0)];
        assert!(detect_table_regions(&words).is_empty());
        assert!(detect_table_regions(&[]).is_empty());
    }
}
