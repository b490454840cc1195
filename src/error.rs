use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid response from endpoint: {0}")]
    InvalidResponse(&'static str),

    #[error("scenario file error: {0}")]
    Scenario(String),
}
