use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook {url} answered {status}: {body}")]
    Rejected {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unknown webhook template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid template file {path}: {message}")]
    Template { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
