use thiserror::Error;
use tokio::sync::mpsc::error::SendError as MpscSendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// ErrInvalidState indicates an operation on an object that is closed,
    /// not loaded yet, or already loaded.
    #[error("invalid state: {0}")]
    ErrInvalidState(String),

    /// ErrUnsupported indicates a wrong transport direction, a media kind that
    /// cannot be produced, or a capability the handler does not support.
    #[error("unsupported: {0}")]
    ErrUnsupported(String),

    /// ErrNotFound indicates an unknown mid or local id.
    #[error("not found: {0}")]
    ErrNotFound(String),

    /// ErrParameter indicates a missing or malformed required field.
    #[error("invalid parameter: {0}")]
    ErrParameter(String),

    /// ErrSignaling indicates the caller's signaling listener rejected a request.
    #[error("signaling: {0}")]
    ErrSignaling(String),

    /// ErrHandler indicates the native handler failed to perform a request.
    #[error("handler: {0}")]
    ErrHandler(String),

    #[error("{0}")]
    Sdp(#[from] sdp::Error),

    #[error("mpsc send: {0}")]
    MpscSend(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn new(msg: String) -> Self {
        Error::Other(msg)
    }

    /// Error returned by any operation that was queued on, or invoked against,
    /// a closed object.
    pub(crate) fn closed() -> Self {
        Error::ErrInvalidState("closed".to_owned())
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::ErrInvalidState(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::ErrUnsupported(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ErrNotFound(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Error::ErrParameter(_))
    }
}

impl<T> From<MpscSendError<T>> for Error {
    fn from(e: MpscSendError<T>) -> Self {
        Error::MpscSend(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ErrParameter(e.to_string())
    }
}
