use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// Yields the statement batch of one migration unit.
pub trait MigrationSource: Send + Sync {
    /// `Ok(None)` means the source does not exist (a missing file).
    fn read(&self) -> Result<Option<String>, ServerError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// A `.sql` file on disk, read in full at apply time.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MigrationSource for FileSource {
    fn read(&self) -> Result<Option<String>, ServerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path).map(Some).map_err(|e| {
            ServerError::Internal(format!(
                "Failed to read migration file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// SQL held in memory.
#[derive(Debug, Clone)]
pub struct InlineSource {
    sql: String,
}

impl InlineSource {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

impl MigrationSource for InlineSource {
    fn read(&self) -> Result<Option<String>, ServerError> {
        Ok(Some(self.sql.clone()))
    }

    fn describe(&self) -> String {
        "<inline>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.sql");
        let source = FileSource::new(&path);
        assert!(source.read().unwrap().is_none());

        std::fs::write(&path, "SELECT 1;\nSELECT 2;").unwrap();
        assert_eq!(source.read().unwrap().as_deref(), Some("SELECT 1;\nSELECT 2;"));
    }
}
