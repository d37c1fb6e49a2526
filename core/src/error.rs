use std::collections::BTreeMap;
use std::fmt;

/// Errors produced while building or querying a field index.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch at row {row}: expected {expected}, got {actual}")]
    DimensionMismatch { row: usize, expected: usize, actual: usize },

    #[error("invalid query: expected dimension {expected}, got {actual}")]
    InvalidQuery { expected: usize, actual: usize },

    #[error("unknown field: {0}")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Fields that could not be indexed during a build. Fields not listed here
/// were indexed successfully and are searchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildError {
    pub failed: BTreeMap<String, IndexError>,
}

impl BuildError {
    pub fn is_empty(&self) -> bool { self.failed.is_empty() }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed to index", self.failed.len())?;
        for (field, err) in &self.failed {
            write!(f, "; {field}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildError {}
