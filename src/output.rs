//! Materialized PDF results.
//!
//! [`RenderedFile`] holds a captured PDF in a named temporary file for
//! callers that stream from disk instead of memory. The file is deleted
//! when the `RenderedFile` is dropped, and a partially written file is
//! deleted before the error is returned.
//!
//! ```rust,ignore
//! let file = renderer.render_to_file(RenderRequest::markup(html)).await?;
//! send_file(file.path()).await?;
//! // file removed here
//! ```

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{RenderError, Result};
use crate::pipeline::types::RenderResult;

/// Prefix of temporary PDF file names.
pub const FILE_PREFIX: &str = "document_";

/// Suffix of temporary PDF file names.
pub const FILE_SUFFIX: &str = ".pdf";

/// A captured PDF stored in a temporary file.
#[derive(Debug)]
pub struct RenderedFile {
    file: NamedTempFile,
    size: usize,
    duration_ms: u64,
    correlation_id: String,
}

impl RenderedFile {
    /// Write `result` to a fresh temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::OutputFailure`] if the file cannot be created
    /// or written. Nothing is left on disk in that case.
    pub fn materialize(result: RenderResult) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(FILE_SUFFIX)
            .tempfile()
            .map_err(|e| output_failure(&result.correlation_id, "create", e))?;

        file.write_all(&result.bytes)
            .and_then(|()| file.flush())
            .map_err(|e| output_failure(&result.correlation_id, "write", e))?;

        log::debug!(
            "[{}] PDF written to {:?} ({} bytes)",
            result.correlation_id,
            file.path(),
            result.bytes.len()
        );

        Ok(Self {
            file,
            size: result.bytes.len(),
            duration_ms: result.duration_ms,
            correlation_id: result.correlation_id,
        })
    }

    /// Location of the PDF on disk. Valid until `self` is dropped.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the PDF back into memory.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::OutputFailure`] on I/O errors.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(self.path()).map_err(|e| output_failure(&self.correlation_id, "read", e))
    }

    /// Size of the PDF in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Render duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Correlation identifier of the request.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

fn output_failure(correlation_id: &str, action: &str, error: std::io::Error) -> RenderError {
    log::error!("❌ [{}] failed to {} PDF file: {}", correlation_id, action, error);
    RenderError::OutputFailure(format!("{} failed: {}", action, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RequestDiagnostics;

    fn result(bytes: &[u8]) -> RenderResult {
        RenderResult {
            bytes: bytes.to_vec(),
            duration_ms: 12,
            correlation_id: "file-test".to_string(),
            diagnostics: RequestDiagnostics::new("file-test").report(),
        }
    }

    /// Verifies the file holds the bytes and carries the naming convention.
    #[test]
    fn test_materialize_and_read() {
        let file = RenderedFile::materialize(result(b"%PDF-1.7 body")).unwrap();

        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(FILE_PREFIX));
        assert!(name.ends_with(FILE_SUFFIX));
        assert_eq!(file.read().unwrap(), b"%PDF-1.7 body");
        assert_eq!(file.size(), 13);
        assert_eq!(file.duration_ms(), 12);
        assert_eq!(file.correlation_id(), "file-test");
    }

    /// Verifies the file is removed on drop.
    #[test]
    fn test_removed_on_drop() {
        let file = RenderedFile::materialize(result(b"%PDF-")).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());

        drop(file);
        assert!(!path.exists());
    }
}
