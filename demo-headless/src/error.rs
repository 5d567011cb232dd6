use std::path::{Path, PathBuf};

/// Errors reading inputs or writing artifacts
#[derive(Debug)]
pub enum IoError {
    /// File could not be opened, read or created
    File { path: PathBuf, message: String },
    /// Input content could not be interpreted
    Parse { source: String, message: String },
    /// Artifact could not be serialized
    Serialize(String),
}

impl IoError {
    pub fn file(path: &Path, err: &impl std::fmt::Display) -> Self {
        IoError::File {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn parse(source: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Parse {
            source: source.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::File { path, message } => write!(f, "{}: {message}", path.display()),
            IoError::Parse { source, message } => write!(f, "Failed to parse {source}: {message}"),
            IoError::Serialize(msg) => write!(f, "Failed to serialize: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}
