use thiserror::Error;

/// Main error type for bpmn-atlas operations
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("No BPMN files in the input set")]
    NoFiles,

    #[error("Root file '{root}' is missing from the {context}")]
    RootMissing { root: String, context: String },

    #[error("Invalid process map: {0}")]
    InvalidMap(String),
}

pub type Result<T> = std::result::Result<T, AtlasError>;
