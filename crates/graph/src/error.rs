use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph source error for scope '{scope}': {message}")]
    Source { scope: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid graph payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown layout mode: {0}")]
    InvalidLayoutMode(String),
}

impl GraphError {
    pub fn source_failure(scope: &str, message: impl Into<String>) -> Self {
        Self::Source {
            scope: scope.to_string(),
            message: message.into(),
        }
    }
}
