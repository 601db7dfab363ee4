//! Portbridge Core - client abstraction for real-time audio connection servers
//!
//! Manages a client's connection lifecycle, its input/output ports and the
//! bridge from the server's real-time process callback to user code.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  add/remove ports,   ┌─────────────────────┐
//! │  Owning Thread   │  start/stop/close    │       Client        │
//! │                  │─────────────────────►│  (lifecycle state)  │
//! └──────────────────┘                      └──────────┬──────────┘
//!                                                      │ start(): registry + handler
//!                                                      ▼ move into the server
//! ┌──────────────────┐    run(frames)       ┌─────────────────────┐
//! │  Server RT Thread│─────────────────────►│   CallbackBridge    │
//! │  (once per cycle)│◄── Control ──────────│  resolves buffers   │
//! └──────────────────┘                      └──────────┬──────────┘
//!                                                      ▼
//!                                            ProcessHandler::process()
//! ```
//!
//! - **Linux**: native JACK backend (with the `jack-backend` feature)
//! - **Tests**: in-process [`server::mock`] backend
//!
//! # Example Usage
//!
//! ```ignore
//! use portbridge_core::{Buffers, BuffersMut, Control, Frames, JackBackend, JackClient, ProcessHandler};
//!
//! struct Passthrough;
//!
//! impl ProcessHandler for Passthrough {
//!     fn process(&mut self, _frames: Frames, inputs: &Buffers<'_>, outputs: &mut BuffersMut<'_>) -> Control {
//!         if let (Some(input), Some(output)) = (inputs.audio(0), outputs.audio_mut(0)) {
//!             output.copy_from_slice(input);
//!         }
//!         Control::Continue
//!     }
//! }
//!
//! let mut client: JackClient<_> = JackClient::new(&JackBackend, "simple_client", Passthrough)?;
//! client.add_audio_in_port("input")?;
//! client.add_audio_out_port("output")?;
//! client.start()?;
//! ```

pub mod bridge;
pub mod buffers;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod types;

pub use bridge::{CallbackBridge, ClosureHandler, ProcessHandler};
pub use buffers::{Buffers, BuffersMut, RawBuffer};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_CLIENT_NAME};
pub use error::{ClientError, ClientResult, ServerError};
pub use registry::{PortRegistry, RegisteredPort};
pub use types::*;

#[cfg(all(target_os = "linux", feature = "jack-backend"))]
pub use server::jack_backend::{JackBackend, JackClient};
