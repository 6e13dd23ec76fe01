use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("dictionary not found: {0:?}")]
    DictionaryMissing(PathBuf),
    #[error("empty dictionary: {0:?}")]
    DictionaryEmpty(PathBuf),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(&'static str),
    #[error("unknown issue: {0}")]
    UnknownIssue(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CheckError>;
