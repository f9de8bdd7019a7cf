use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Caller error: missing parameter, bad syntax, unknown provider type.
    /// Reported to the route layer as an envelope error, never thrown.
    #[error("{0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Remote command failed: {0}")]
    Exec(String),

    /// Control-channel status from the enumerated vocabulary
    /// ("key missing", "key mismatch", "port closed", "port timeout",
    /// "unreachable"), rendered verbatim for the UI.
    #[error("control channel {0}")]
    Control(String),

    #[error("DNS provider error: {0}")]
    Provider(String),

    /// Deliberately generic: provider auth failures must not leak
    /// response bodies or reveal which credential field was wrong.
    #[error("DNS provider rejected the credentials, check the stored profile")]
    BadCredentials,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConsoleError::Invalid(msg.into())
    }

    /// Expected failure conditions become envelope errors; everything else
    /// propagates to the 500-equivalent path.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ConsoleError::Invalid(_)
                | ConsoleError::Control(_)
                | ConsoleError::BadCredentials
                | ConsoleError::Exec(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
