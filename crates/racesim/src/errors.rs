use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid course: {0}")]
    Course(String),

    #[error("Invalid roster: {0}")]
    Roster(String),

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure of a single submission to the remote event sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Sink rejected event with status {0}")]
    Status(u16),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}
