use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed or incomplete source document.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A mapped meter row carried a status other than valid.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to read {}: {source}", path.display())]
    BatchRead {
        path: PathBuf,
        #[source]
        source: Box<AppError>,
    },

    #[error("Sensor not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Time parse error: {0}")]
    Time(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Failures that concern a single source file and can be skipped at batch level.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            AppError::Parse(_) | AppError::Validation(_) | AppError::Io(_) | AppError::Time(_)
        )
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(e: quick_xml::Error) -> Self {
        AppError::Parse(format!("malformed XML: {e}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for AppError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        AppError::Parse(format!("malformed attribute: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_read_names_path() {
        let err = AppError::BatchRead {
            path: PathBuf::from("data/a.xml"),
            source: Box::new(AppError::Parse("missing DocumentID".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/a.xml"));
        assert!(msg.contains("missing DocumentID"));
    }

    #[test]
    fn test_per_file_classification() {
        assert!(AppError::Parse("x".into()).is_per_file());
        assert!(AppError::Validation("x".into()).is_per_file());
        assert!(!AppError::NotFound("ID1".into()).is_per_file());
        assert!(!AppError::Config("x".into()).is_per_file());
    }
}
