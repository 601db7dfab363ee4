//! Audio server abstraction
//!
//! The client talks to the server only through these traits, so the same
//! lifecycle runs against the native JACK backend on Linux and against the
//! in-process [`mock`] server in tests.
//!
//! # Ownership model
//!
//! ```text
//! Backend::open() ──► Connection ──activate(callback)──► Connection::Active<C>
//!                        ▲  │                                   │
//!                        │  └─ register/unregister ports        │
//!                        └──────────── deactivate() ◄───────────┘
//!                                  (returns the callback)
//! ```
//!
//! Activation moves the callback (and everything it owns) into the server,
//! deactivation hands it back. While active, the administrative thread has no
//! access to it, so the process thread never contends for a lock.

use std::ffi::c_void;

use crate::config::ClientConfig;
use crate::error::ServerError;
use crate::types::{Control, Frames, PortSpec};

pub mod mock;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub mod jack_backend;

/// Invoked by the server once per process cycle on its real-time thread
pub trait Callback: Send + 'static {
    fn run(&mut self, frames: Frames) -> Control;
}

/// A port handle returned by the server
pub trait ServerPort: Send + 'static {
    /// Resolve this port's buffer for the current cycle
    ///
    /// # Safety
    ///
    /// Must only be called from within a process cycle of `frames` frames.
    /// The returned pointer is valid until that cycle ends.
    unsafe fn buffer(&self, frames: Frames) -> *mut c_void;
}

/// Queries available on both inactive and active connections
pub trait ServerInfo {
    /// Name assigned by the server (may differ from the requested one)
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Current buffer size in frames
    fn buffer_size(&self) -> Frames;

    /// Connect two ports by full name (`client:port`)
    fn connect_ports(&self, from: &str, to: &str) -> Result<(), ServerError>;
}

/// Result of a successful open
pub struct Opened<C> {
    pub connection: C,
    /// The server assigned a unique name because the requested one was taken
    pub name_reassigned: bool,
    /// The server was started by this open
    pub server_started: bool,
}

/// Activation refused by the server
///
/// `recovered` carries the connection and callback back when the backend
/// could keep them; `None` means the connection was lost with the failure.
pub struct Rejected<C, B> {
    pub error: ServerError,
    pub recovered: Option<(C, B)>,
}

/// Entry point to an audio server: opens named connections
pub trait Backend {
    type Connection: Connection;

    fn open(&self, config: &ClientConfig) -> Result<Opened<Self::Connection>, ServerError>;
}

/// An open, inactive connection
pub trait Connection: ServerInfo + Sized + 'static {
    type Port: ServerPort;
    type Active<C: Callback>: ActiveConnection<Connection = Self, Callback = C>;

    fn register_port(&mut self, name: &str, spec: PortSpec) -> Result<Self::Port, ServerError>;

    fn unregister_port(&mut self, port: Self::Port) -> Result<(), ServerError>;

    /// Start invoking `callback` once per cycle
    fn activate<C: Callback>(self, callback: C) -> Result<Self::Active<C>, Rejected<Self, C>>;

    /// Release the connection
    fn close(self) -> Result<(), ServerError>;
}

/// A connection whose callback is being invoked by the server
pub trait ActiveConnection: ServerInfo {
    type Connection;
    type Callback;

    /// Stop invoking the callback and hand it back
    ///
    /// No cycle runs after this returns. On failure the connection is gone.
    fn deactivate(self) -> Result<(Self::Connection, Self::Callback), ServerError>;
}
