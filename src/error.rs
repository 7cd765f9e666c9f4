use std::path::PathBuf;

use thiserror::Error;

/// Fatal failure to obtain a compiled schema; aborts the run before any document is touched
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("Cannot read from XSD file: {path}")]
    Unreadable { path: PathBuf },

    #[error("Schema compilation failed: {path} - {details}")]
    Invalid { path: PathBuf, details: String },

    #[error("Schema path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },
}

/// Per-document parse failure (the file is not well-formed XML)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Document is not well-formed: {path} - L:{line} - {details}")]
    NotWellFormed {
        path: PathBuf,
        line: u32,
        details: String,
    },

    #[error("Document path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Parser context creation failed for {path}")]
    ContextAllocation { path: PathBuf },
}

impl ParseError {
    /// Line of the syntax problem, when libxml2 reported one
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::NotWellFormed { line, .. } if *line > 0 => Some(*line),
            _ => None,
        }
    }

    /// Underlying problem without the path prefix
    pub fn details(&self) -> String {
        match self {
            ParseError::NotWellFormed { details, .. } => details.clone(),
            ParseError::InvalidPath { .. } => "path contains an interior NUL byte".to_string(),
            ParseError::ContextAllocation { .. } => "parser context creation failed".to_string(),
        }
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibXml2Error {
    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Schema validation internal error: code {code}")]
    InternalError { code: i32 },
}

/// Input discovery errors raised before the batch starts
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid file pattern '{pattern}': {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },
}

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
