#![forbid(unsafe_code)]

use std::path::Path;

use updraft_storage::AtomicFile;

use crate::{LoaderError, LoaderResult};

/// Unrecovered fatal errors, reported once on the next manifest request.
pub struct FatalErrorLog {
    file: AtomicFile,
}

impl FatalErrorLog {
    pub const FILENAME: &'static str = "fatal-error.log";

    pub fn new(updates_dir: &Path) -> Self {
        Self {
            file: AtomicFile::new(updates_dir.join(Self::FILENAME)),
        }
    }

    /// Append `message` to the log.
    pub fn record(&self, message: &str) -> LoaderResult<()> {
        let mut content = self
            .file
            .read()
            .map_err(LoaderError::FileWrite)?
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(message);
        self.file
            .write_all(content.as_bytes())
            .map_err(LoaderError::FileWrite)
    }

    /// Read and delete the log. Failures are logged and read as empty.
    pub fn consume(&self) -> Option<String> {
        let content = match self.file.read() {
            Ok(content) => content?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read fatal error log");
                return None;
            }
        };
        if let Err(e) = self.file.remove() {
            tracing::warn!(error = %e, "failed to remove fatal error log");
        }
        let message = String::from_utf8_lossy(&content).into_owned();
        (!message.is_empty()).then_some(message)
    }
}
