use std::io;

use thiserror::Error;

use crate::model::ExtractionMethod;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to render page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,

    #[error("pages must be supplied in ascending order (page {current} after page {previous})")]
    PagesOutOfOrder { previous: u32, current: u32 },

    #[error("{0} is not available")]
    BackendUnavailable(String),

    #[error("{tool} did not finish within {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{method} runner panicked: {message}")]
    RunnerPanicked {
        method: ExtractionMethod,
        message: String,
    },
}

impl ExtractError {
    /// True when the failure means the backend cannot run at all, as opposed
    /// to failing on this particular page.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::BackendUnavailable(_) => true,
            Self::Io(error) => error.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
