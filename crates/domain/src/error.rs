/// Shared error type used across all gateway crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("LLM HTTP {status}: {message}")]
    Llm { status: u16, message: String },

    #[error("search: {0}")]
    Search(String),

    #[error("music platform: {0}")]
    Platform(String),

    #[error("mail: {0}")]
    Mail(String),

    #[error("database: {0}")]
    Db(String),

    #[error("config: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this is the provider's transient "overloaded" response,
    /// safe to retry with backoff.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Error::Llm { status: 529, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
