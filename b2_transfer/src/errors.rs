use b2_client::B2ClientError;
use thiserror::Error;

use crate::upload_session::SessionState;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("storage service error: {0}")]
    ClientError(#[from] B2ClientError),

    #[error("{operation} is not valid while the transfer is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("cannot finish: parts {missing:?} have not been uploaded")]
    MissingParts { missing: Vec<u16> },

    #[error("cannot finish: no parts have been uploaded")]
    NoParts,

    #[error("subtask scheduling error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("permit acquisition error: {0}")]
    PermitAcquisitionError(#[from] tokio::sync::AcquireError),
}

pub type Result<T> = std::result::Result<T, TransferError>;
