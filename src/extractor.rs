use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tempfile::Builder;

use crate::error::ExtractError;
use crate::page::{GridCandidate, GridExtractor, GridMode};
use crate::process::run_with_timeout;

/// A [`GridExtractor`] backed by an external command.
///
/// The command is invoked as `<program> <args…> --mode <mode> --pages <spec>
/// <document.pdf>` and must print a JSON array of
/// `{"grid": [[…]], "accuracy": f64?, "precision": f64?}` objects.
#[derive(Debug, Clone)]
pub struct CommandGridExtractor {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGridExtractor {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn tool_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl GridExtractor for CommandGridExtractor {
    fn analyze(
        &self,
        document: &[u8],
        page_spec: &str,
        mode: GridMode,
    ) -> Result<Vec<GridCandidate>, ExtractError> {
        let mut input = Builder::new().suffix(".pdf").tempfile()?;
        input.write_all(document)?;
        input.flush()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(["--mode", mode.as_str(), "--pages", page_spec])
            .arg(input.path());

        let output = run_with_timeout(command, &self.tool_name(), self.timeout)?;
        let candidates = serde_json::from_str::<Vec<GridCandidate>>(output.stdout.trim())?;
        Ok(candidates)
    }
}
