use std::error::Error;
use std::fmt::Display;

use strum::AsRefStr;
use tonic::Code;
use tonic::Status;

use crate::operation_error::OperationError;

/// Error type returned by every service operation.
///
/// `Validation` covers malformed inputs that slipped past the request-shape layer,
/// `Internal` covers datastore and other infrastructure failures (details are logged at the
/// failure site, never surfaced to the caller), and `Operation` wraps the operation's own
/// domain error.
#[derive(Debug, AsRefStr)]
pub enum EndpointError<E: OperationError> {
    Validation(String),
    Internal,
    Operation(E),
}

impl<E: OperationError> EndpointError<E> {
    pub fn validation(msg: impl Into<String>) -> Self {
        EndpointError::Validation(msg.into())
    }

    pub fn internal() -> Self {
        EndpointError::Internal
    }

    pub fn operation(err: E) -> Self {
        EndpointError::Operation(err)
    }
}

impl<E: OperationError> OperationError for EndpointError<E> {
    fn code(&self) -> Code {
        match self {
            EndpointError::Validation(_) => Code::InvalidArgument,
            EndpointError::Internal => Code::Internal,
            EndpointError::Operation(e) => e.code(),
        }
    }
}

impl<E: OperationError> Error for EndpointError<E> {}

impl<E: OperationError> Display for EndpointError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind: &str = self.as_ref();
        let msg = match self {
            EndpointError::Validation(msg) => msg.clone(),
            EndpointError::Internal => String::from("Internal server error."),
            EndpointError::Operation(err) => err.to_string(),
        };

        write!(f, "{}: {}", kind, msg)
    }
}

impl<E: OperationError> From<EndpointError<E>> for Status {
    fn from(err: EndpointError<E>) -> Status {
        Status::new(err.code(), err.to_string())
    }
}
