//! Client and server error types

use thiserror::Error;

use crate::types::{ClientState, Direction};

/// Failures reported by an audio server backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Server not running or handshake refused
    #[error("Unable to open client '{name}': {reason}. Is the server running?")]
    Unreachable { name: String, reason: String },

    /// Exact name requested but already taken
    #[error("Client name '{0}' is already in use")]
    NameTaken(String),

    #[error("Unable to activate client: {0}")]
    ActivationFailed(String),

    #[error("Unable to deactivate client: {0}")]
    DeactivationFailed(String),

    #[error("Unable to close client: {0}")]
    CloseFailed(String),

    /// Server refused to create a port (e.g. resource exhaustion)
    #[error("Server refused port '{name}': {reason}")]
    PortRefused { name: String, reason: String },

    #[error("Unable to unregister port '{name}': {reason}")]
    PortUnregisterFailed { name: String, reason: String },

    #[error("Unable to connect '{from}' to '{to}': {reason}")]
    ConnectFailed {
        from: String,
        to: String,
        reason: String,
    },
}

/// Errors surfaced by [`Client`](crate::Client) operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Cannot open, activate, deactivate or close the server connection
    #[error("Audio server connection error: {0}")]
    Connection(#[from] ServerError),

    /// Operation not allowed in the current lifecycle state
    #[error("You cannot {operation} while the client is {state}")]
    State {
        operation: &'static str,
        state: ClientState,
    },

    /// Port name already registered in that direction
    #[error("An {direction} port named '{name}' already exists")]
    DuplicatePort { name: String, direction: Direction },

    /// Server refused to create or remove a port
    #[error("Port '{name}' registration failed: {source}")]
    PortRegistration { name: String, source: ServerError },

    #[error("No {direction} port named '{name}' is registered")]
    PortNotFound { name: String, direction: Direction },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
