use thiserror::Error;

use crate::checksum::ChecksumError;

#[derive(Debug, Error)]
pub enum EcPayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the gateway: {0}")]
    RequestError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("The gateway response for trade {0} failed CheckMacValue verification")]
    ResponseChecksumMismatch(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ChecksumError),
}
