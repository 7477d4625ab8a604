use std::path::PathBuf;

use thiserror::Error;

/// Every way a run can fail.
///
/// Structural problems (wrong file, changed export layout, nothing to fit) are
/// fatal. Individual unparsable cells never show up here; they become nulls.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing file: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unexpected schema for {source_name} file: {detail}")]
    SchemaMismatch { source_name: String, detail: String },

    #[error("No rows in {source_name} file matched {predicate}.")]
    NoMatchingRows { source_name: String, predicate: String },

    #[error("{count} rows in {source_name} file matched {predicate}; expected exactly one.")]
    AmbiguousRows {
        source_name: String,
        predicate: String,
        count: usize,
    },

    #[error("No rows available for OLS ({model}) after dropping incomplete rows.")]
    InsufficientData { model: String },

    #[error("Failed to decode '{}' as {encoding}.", path.display())]
    Decode { path: PathBuf, encoding: &'static str },

    #[error("Malformed CSV in '{}': {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl AppError {
    pub fn schema(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for the `mstat` binary.
    ///
    /// - 2: the inputs or the configuration are wrong
    /// - 3: the inputs are fine but leave nothing to fit
    /// - 4: I/O or numerical failure
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::FileNotFound { .. }
            | AppError::SchemaMismatch { .. }
            | AppError::NoMatchingRows { .. }
            | AppError::AmbiguousRows { .. }
            | AppError::Decode { .. }
            | AppError::Csv { .. }
            | AppError::Config(_) => 2,
            AppError::InsufficientData { .. } => 3,
            AppError::Io { .. } | AppError::Numerical(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let missing = AppError::FileNotFound {
            path: PathBuf::from("dataset/Reg_vehicles.csv"),
        };
        assert_eq!(missing.exit_code(), 2);
        assert!(missing.to_string().contains("Reg_vehicles.csv"));

        let empty = AppError::InsufficientData {
            model: "levels".to_string(),
        };
        assert_eq!(empty.exit_code(), 3);
        assert!(empty.to_string().contains("levels"));
    }

    #[test]
    fn schema_mismatch_names_source_and_column() {
        let err = AppError::schema("emissions", "no 'emission category' column.");
        assert_eq!(
            err.to_string(),
            "Unexpected schema for emissions file: no 'emission category' column."
        );
    }
}
