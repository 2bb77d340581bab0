//! Interfaces of the collaborators the engine reads from: the paging backend
//! and grid extraction backends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::model::Grid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
}

/// A straight ruling segment drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// One page of a paginated document.
pub trait PageSource: Sync {
    /// 1-based page number.
    fn page_number(&self) -> u32;

    /// The backend's own best-effort table grids.
    fn extract_tables(&self) -> Result<Vec<Grid>, ExtractError>;

    fn extract_words(&self) -> Vec<Word>;

    fn lines(&self) -> Vec<LineSegment>;

    /// The page as a standalone single-page document.
    fn render_standalone(&self) -> Result<Vec<u8>, ExtractError>;
}

impl<P: PageSource + ?Sized> PageSource for &P {
    fn page_number(&self) -> u32 {
        (**self).page_number()
    }

    fn extract_tables(&self) -> Result<Vec<Grid>, ExtractError> {
        (**self).extract_tables()
    }

    fn extract_words(&self) -> Vec<Word> {
        (**self).extract_words()
    }

    fn lines(&self) -> Vec<LineSegment> {
        (**self).lines()
    }

    fn render_standalone(&self) -> Result<Vec<u8>, ExtractError> {
        (**self).render_standalone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    /// Tables separated by whitespace and visual gaps.
    Stream,
    /// Tables drawn with ruling lines.
    Lattice,
}

impl GridMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Lattice => "lattice",
        }
    }
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCandidate {
    pub grid: Grid,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub precision: Option<f64>,
}

/// A backend that locates grid structures in a document.
pub trait GridExtractor: Send + Sync {
    fn analyze(
        &self,
        document: &[u8],
        page_spec: &str,
        mode: GridMode,
    ) -> Result<Vec<GridCandidate>, ExtractError>;
}
