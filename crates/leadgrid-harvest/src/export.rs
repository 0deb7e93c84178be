//! Export boundary.
//!
//! The orchestrator guarantees the exporter is called exactly once, after all
//! records are final, with a stable column order. The bundled implementation
//! writes CSV; richer tabular writers are external collaborators behind the
//! same trait.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::records::EnrichedRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Consumer of the final record set.
pub trait Exporter: Send + Sync {
    /// Writes all records under `destination` (a file stem, no extension)
    /// and returns the path of the written file.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the orchestrator treats any error as fatal to
    /// the run's COMPLETED transition and keeps the checkpoint for an
    /// export-only resume.
    fn export(&self, records: &[EnrichedRecord], destination: &str)
        -> Result<PathBuf, ExportError>;
}

/// CSV exporter writing `{destination}.csv` into a fixed directory.
///
/// Column order is stable: name, address, phone, website, rating,
/// review_count. The email column is appended only when at least one record
/// carries an email (the email path is an external collaborator, so most
/// runs have none).
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Exporter for CsvExporter {
    fn export(
        &self,
        records: &[EnrichedRecord],
        destination: &str,
    ) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.dir.join(format!("{destination}.csv"));

        let with_email = records.iter().any(|r| !r.email.is_empty());

        let mut file = std::fs::File::create(&path).map_err(|e| io_err(&path, e))?;
        let mut header = vec!["name", "address", "phone", "website", "rating", "review_count"];
        if with_email {
            header.push("email");
        }
        write_row(&mut file, &path, &header)?;

        for record in records {
            let rating = record.rating.map(|r| r.to_string()).unwrap_or_default();
            let reviews = record
                .review_count
                .map(|c| c.to_string())
                .unwrap_or_default();
            let mut row = vec![
                record.name.as_str(),
                record.address.as_str(),
                record.phone.as_str(),
                record.website.as_str(),
                rating.as_str(),
                reviews.as_str(),
            ];
            if with_email {
                row.push(record.email.as_str());
            }
            write_row(&mut file, &path, &row)?;
        }

        Ok(path)
    }
}

fn write_row(file: &mut std::fs::File, path: &Path, fields: &[&str]) -> Result<(), ExportError> {
    let line = fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",");
    writeln!(file, "{line}").map_err(|e| io_err(path, e))
}

/// Minimal CSV quoting: fields containing a comma, quote, or newline are
/// wrapped in double quotes with embedded quotes doubled.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}
