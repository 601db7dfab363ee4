//! Common types for portbridge
//!
//! Port identity, lifecycle state and the per-cycle status returned to the
//! audio server.

use std::fmt;

/// Frame count type used by the audio server (matches `jack_nframes_t`)
pub type Frames = u32;

/// Audio sample type delivered in audio port buffers
pub type Sample = f32;

/// Direction of a port, seen from this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Receives data from the server graph
    Input,
    /// Sends data into the server graph
    Output,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Media carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Stream of 32-bit float samples, one per frame
    Audio,
    /// Event stream in the server's native MIDI encoding
    Midi,
}

impl MediaType {
    pub fn name(&self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Midi => "midi",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed identity of a port: direction and media type never change after registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub direction: Direction,
    pub media: MediaType,
}

impl PortSpec {
    pub fn new(direction: Direction, media: MediaType) -> Self {
        Self { direction, media }
    }
}

/// Name and media type of a registered port, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub media: MediaType,
}

/// Lifecycle state of a client
///
/// ```text
///            start()              close()
/// NotActive ─────────► Active ──────────────► Closed
///     ▲                  │                      ▲
///     └──── stop() ──────┘                      │
///     └──────────────────── close() ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    NotActive,
    Active,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClientState::NotActive => "not active",
            ClientState::Active => "active",
            ClientState::Closed => "closed",
        })
    }
}

/// Status returned from a process cycle
///
/// Maps onto the server's integer convention: zero keeps the callback
/// running, anything else asks the server to stop invoking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    Continue,
    Quit,
}

impl Control {
    /// Integer status as the server expects it
    pub fn status(self) -> i32 {
        match self {
            Control::Continue => 0,
            Control::Quit => 1,
        }
    }

    /// Interpret an integer status returned by processing code
    pub fn from_status(status: i32) -> Self {
        if status == 0 {
            Control::Continue
        } else {
            Control::Quit
        }
    }
}
