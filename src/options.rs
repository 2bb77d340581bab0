use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Placeholder in [`ExternalToolConfig::args`] replaced by the page file path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut pages = BTreeSet::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range start: '{start}'"))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range end: '{end}'"))?;
                if start == 0 || end == 0 {
                    return Err("pages are 1-based".to_string());
                }
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| format!("invalid page number: '{token}'"))?;
                if page == 0 {
                    return Err("pages are 1-based".to_string());
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self { pages })
    }
}

/// How header rows are compared when deciding whether a table continues
/// onto the next page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Values must be identical.
    #[default]
    Exact,
    /// Values are trimmed and case-folded before comparison.
    Normalized,
}

impl HeaderMatch {
    #[must_use]
    pub fn matches(self, left: &str, right: &str) -> bool {
        match self {
            Self::Exact => left == right,
            Self::Normalized => left.trim().to_lowercase() == right.trim().to_lowercase(),
        }
    }
}

/// Which optional backends are installed and may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub grid_extractor: bool,
    pub external_tool: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            grid_extractor: true,
            external_tool: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToolConfig {
    pub program: PathBuf,
    /// Arguments passed to `program`; `{input}` is replaced by the path of
    /// the single-page document.
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for ExternalToolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tabula"),
            args: ["--pages", "1", "--format", "CSV", INPUT_PLACEHOLDER]
                .map(str::to_string)
                .to_vec(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub pages: Option<PageSelection>,
    pub capabilities: Capabilities,
    pub header_match: HeaderMatch,
    pub parallel_runners: bool,
    pub merge_continuations: bool,
    pub external_tool: ExternalToolConfig,
    /// Minimum cells per row for the built-in text grid detector.
    pub min_cols: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: None,
            capabilities: Capabilities::default(),
            header_match: HeaderMatch::Exact,
            parallel_runners: false,
            merge_continuations: true,
            external_tool: ExternalToolConfig::default(),
            min_cols: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HeaderMatch, PageSelection};
    use std::str::FromStr;

    #[test]
    fn parse_page_selection_range_and_single() {
        let selection = PageSelection::from_str("1-3,5").expect("selection should parse");
        assert!(selection.contains(1));
        assert!(selection.contains(3));
        assert!(selection.contains(5));
        assert!(!selection.contains(4));
    }

    #[test]
    fn reject_invalid_page_selection() {
        let err = PageSelection::from_str("3-1").expect_err("invalid range should fail");
        assert!(err.contains("invalid range"));
        let err = PageSelection::from_str("0").expect_err("page zero should fail");
        assert!(err.contains("1-based"));
    }

    #[test]
    fn header_match_modes() {
        assert!(!HeaderMatch::Exact.matches("Name ", "name"));
        assert!(HeaderMatch::Normalized.matches("Name ", "name"));
        assert!(HeaderMatch::Exact.matches("Qty", "Qty"));
    }
}
