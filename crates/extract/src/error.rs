use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Invalid template file {path}: {message}")]
    Template { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
