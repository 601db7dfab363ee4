//! Client configuration
//!
//! Options used when opening a connection to the audio server.

use serde::{Deserialize, Serialize};

/// Client name used when none is configured
pub const DEFAULT_CLIENT_NAME: &str = "portbridge";

/// Configuration for opening a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Requested client name (the server may assign a unique variant)
    pub client_name: String,

    /// Allow the open to start a server if none is running
    /// Off by default: a missing server is reported instead
    pub start_server: bool,

    /// Treat a name collision as an error instead of accepting a reassigned name
    pub use_exact_name: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            start_server: false,
            use_exact_name: false,
        }
    }
}

impl ClientConfig {
    /// Create config for the given client name with default options
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            ..Default::default()
        }
    }

    /// Allow starting the server on open
    pub fn with_start_server(mut self, start: bool) -> Self {
        self.start_server = start;
        self
    }

    /// Require the exact requested name
    pub fn with_exact_name(mut self, exact: bool) -> Self {
        self.use_exact_name = exact;
        self
    }
}
