use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoistError {
    #[error("not initialized: run 'hoist init'")]
    NotInitialized,

    #[error("command failed with exit code {exit_code}: {command}\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("destroy is disabled in the '{0}' environment configuration")]
    DestroyDisabled(String),

    #[error("gave up after {attempts} attempts waiting for {what}")]
    Timeout { what: String, attempts: u32 },

    #[error("malformed tool output: {0}")]
    Parse(String),

    #[error("unknown environment '{0}': see 'hoist config list'")]
    UnknownEnvironment(String),

    #[error("invalid environment name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidEnvName(String),

    #[error("required executable not found: {0}")]
    MissingExecutable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HoistError {
    /// Parse-class failures are absorbed by the poller as "not ready yet";
    /// everywhere else they are fatal.
    pub fn is_parse(&self) -> bool {
        matches!(self, HoistError::Parse(_) | HoistError::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, HoistError>;
