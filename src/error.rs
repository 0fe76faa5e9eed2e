use crate::cif::CifError;
use config_file::ConfigFileError;
use reqwest;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    ConfigFileError(ConfigFileError),
    HttpRequestError(reqwest::Error),
    IoError(std::io::Error),
    CifError(CifError),
    SerdeJsonError(serde_json::Error),
    QueryError(QueryError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConfigFileError(x) => write!(f, "Configuration error: {}", x),
            Error::HttpRequestError(x) => write!(f, "HTTP request error: {}", x),
            Error::IoError(x) => write!(f, "I/O error: {}", x),
            Error::CifError(x) => write!(f, "{}", x),
            Error::SerdeJsonError(x) => write!(f, "JSON error: {}", x),
            Error::QueryError(x) => write!(f, "{}", x),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigFileError> for Error {
    fn from(error: ConfigFileError) -> Self {
        Error::ConfigFileError(error)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::HttpRequestError(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IoError(error)
    }
}

impl From<CifError> for Error {
    fn from(error: CifError) -> Self {
        Error::CifError(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerdeJsonError(error)
    }
}

impl From<QueryError> for Error {
    fn from(error: QueryError) -> Self {
        Error::QueryError(error)
    }
}

/// Per-query failures. These are returned, not raised, so a batch of lookups can
/// report them item by item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryError {
    NotFound(String),
    InvalidDate(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryError::NotFound(x) => write!(f, "No schedule found for {}", x),
            QueryError::InvalidDate(x) => write!(
                f,
                "Invalid date {}. Dates must be valid and in ISO 8601 format (YYYY-MM-DD)",
                x
            ),
        }
    }
}

impl std::error::Error for QueryError {}
