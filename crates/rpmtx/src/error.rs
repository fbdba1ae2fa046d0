use thiserror::Error;

use crate::ts::ElementRef;

#[derive(Error, Debug)]
pub enum ResolutionError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database is not open")]
    DatabaseClosed,

    // Probe errors
    #[error("{namespace} probe failed for {subject}: {reason}")]
    ProbeFailed {
        namespace: String,
        subject: String,
        reason: String,
    },

    #[error("Malformed ELF object {path}: {reason}")]
    MalformedElf { path: String, reason: String },

    // Cache errors
    #[error("Result cache error: {0}")]
    Cache(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Dependency errors
    #[error("Invalid dependency \"{input}\": {reason}")]
    InvalidDependency { input: String, reason: String },

    #[error(transparent)]
    Evr(#[from] rpmtx_evr::EvrError),

    // Internal invariant violations
    #[error("Relation references unknown element {0}")]
    UnknownElement(ElementRef),
}

impl ResolutionError {
    pub fn probe(namespace: &str, subject: &str, reason: impl Into<String>) -> Self {
        ResolutionError::ProbeFailed {
            namespace: namespace.to_string(),
            subject: subject.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
