use instance_lock::LockError;
use net::TransportError;
use persistence::PersistenceError;
use pickup::DecodeError;

use crate::client::ClientState;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not lock game slot: {0}")]
    LockAcquisition(#[from] LockError),

    #[error("sync state error: {0}")]
    State(#[from] PersistenceError),

    #[error("failed to decode received pickup: {0}")]
    Decode(#[from] DecodeError),

    #[error("session server error: {0}")]
    Transport(#[from] TransportError),

    #[error("client is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: ClientState,
        actual: ClientState,
    },

    #[error("client has no sync state loaded")]
    NotStarted,

    #[error("location upload abandoned after {attempts} failed attempts")]
    UploadAbandoned { attempts: u32 },

    #[error("location upload cancelled by shutdown")]
    UploadCancelled,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("shutdown incomplete: {0}")]
    Shutdown(String),
}
