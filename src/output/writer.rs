// src/output/writer.rs

//! Writes a finished digest to its destination (stdout or a file).

use crate::core_types::IngestResult;
use crate::errors::{io_error_with_path, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where the rendered document goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputDestination {
    #[default]
    Stdout,
    File(PathBuf),
}

/// The full document: summary, a blank line, then the digest.
pub fn render_document(result: &IngestResult) -> String {
    format!("{}\n\n{}", result.summary, result.digest())
}

/// Writes the rendered document of `result` to `destination`.
///
/// # Errors
/// Returns [`crate::errors::Error::Io`] if the file cannot be created or written.
pub fn write_document(result: &IngestResult, destination: &OutputDestination) -> Result<()> {
    let document = render_document(result);
    match destination {
        OutputDestination::Stdout => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_all(&mut handle, &document, Path::new("<stdout>"))
        }
        OutputDestination::File(path) => {
            let file = File::create(path).map_err(|e| io_error_with_path(e, path))?;
            let mut writer = BufWriter::new(file);
            write_all(&mut writer, &document, path)?;
            log::info!("Digest written to {}", path.display());
            Ok(())
        }
    }
}

fn write_all(writer: &mut dyn Write, document: &str, path: &Path) -> Result<()> {
    writer
        .write_all(document.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| io_error_with_path(e, path))
}
