//! Session table loading and writing

use crate::error::{Result, SentinelError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Load a session table. The format is chosen by file extension
/// (`csv`, `json`, `parquet`).
pub fn load_sessions(path: &Path) -> Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        "json" => JsonReader::new(File::open(path)?).finish()?,
        "parquet" => ParquetReader::new(File::open(path)?).finish()?,
        _ => {
            return Err(SentinelError::DataError(format!(
                "Unsupported file format: {:?} ({})",
                ext,
                path.display()
            )))
        }
    };

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded session table");
    Ok(df)
}

/// Write a session table as CSV with a header row.
pub fn write_sessions(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    let mut out = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)?;

    debug!(path = %path.display(), rows = df.height(), "Wrote session table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.csv");

        let df = df!(
            "user_id" => &["U1", "B2"],
            "requests_per_sec" => &[0.4, 12.0],
        )
        .unwrap();

        write_sessions(&df, &path).unwrap();
        let loaded = load_sessions(&path).unwrap();

        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = load_sessions(Path::new("sessions.xlsx"));
        assert!(matches!(result, Err(SentinelError::DataError(_))));
    }
}
