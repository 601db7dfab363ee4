//! Native JACK backend for Linux
//!
//! Maps the server traits onto the `jack` crate. This backend is used on
//! Linux when the `jack-backend` feature is enabled, and works with
//! PipeWire's JACK compatibility layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  register/unregister  ┌─────────────────────┐
//! │   Owning Thread  │──────────────────────►│    jack::Client     │
//! │  (NotActive)     │                       │                     │
//! └────────┬─────────┘                       └──────────┬──────────┘
//!          │ activate_async(bridge)                     │
//!          ▼                                            ▼
//! ┌──────────────────┐      process()       ┌─────────────────────┐
//! │ jack::AsyncClient│─────────────────────►│  JACK RT Thread     │
//! │  (Active)        │                      │  (owns the bridge)  │
//! └──────────────────┘                      └─────────────────────┘
//! ```

use std::ffi::c_void;

use jack::{AudioIn, AudioOut, ClientOptions, ClientStatus, MidiIn, MidiOut, Port, ProcessScope};

use super::{
    ActiveConnection, Backend, Callback, Connection, Opened, Rejected, ServerInfo, ServerPort,
};
use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::ServerError;
use crate::types::{Direction, Frames, MediaType, PortSpec};

/// Client running on the JACK server
pub type JackClient<H> = Client<JackConnection, H>;

/// Opens connections to the JACK server
#[derive(Debug, Clone, Copy, Default)]
pub struct JackBackend;

impl Backend for JackBackend {
    type Connection = JackConnection;

    fn open(&self, config: &ClientConfig) -> Result<Opened<JackConnection>, ServerError> {
        let mut options = ClientOptions::empty();
        if !config.start_server {
            options |= ClientOptions::NO_START_SERVER;
        }
        if config.use_exact_name {
            options |= ClientOptions::USE_EXACT_NAME;
        }

        let (client, status) = jack::Client::new(&config.client_name, options)
            .map_err(|e| open_error(config, e))?;

        Ok(Opened {
            name_reassigned: status.contains(ClientStatus::NAME_NOT_UNIQUE),
            server_started: status.contains(ClientStatus::SERVER_STARTED),
            connection: JackConnection { client },
        })
    }
}

/// Classify a failed `jack_client_open`
fn open_error(config: &ClientConfig, error: jack::Error) -> ServerError {
    match error {
        jack::Error::ClientError(status)
            if config.use_exact_name && status.contains(ClientStatus::NAME_NOT_UNIQUE) =>
        {
            ServerError::NameTaken(config.client_name.clone())
        }
        e => ServerError::Unreachable {
            name: config.client_name.clone(),
            reason: e.to_string(),
        },
    }
}

/// A port registered with JACK, of any direction and media type
pub enum JackPort {
    AudioIn(Port<AudioIn>),
    AudioOut(Port<AudioOut>),
    MidiIn(Port<MidiIn>),
    MidiOut(Port<MidiOut>),
}

impl ServerPort for JackPort {
    unsafe fn buffer(&self, frames: Frames) -> *mut c_void {
        match self {
            JackPort::AudioIn(port) => port.buffer(frames) as *mut c_void,
            JackPort::AudioOut(port) => port.buffer(frames) as *mut c_void,
            JackPort::MidiIn(port) => port.buffer(frames) as *mut c_void,
            JackPort::MidiOut(port) => port.buffer(frames) as *mut c_void,
        }
    }
}

fn connect(client: &jack::Client, from: &str, to: &str) -> Result<(), ServerError> {
    client
        .connect_ports_by_name(from, to)
        .map_err(|e| ServerError::ConnectFailed {
            from: from.to_string(),
            to: to.to_string(),
            reason: e.to_string(),
        })
}

/// Inactive JACK client
pub struct JackConnection {
    client: jack::Client,
}

impl ServerInfo for JackConnection {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn sample_rate(&self) -> u32 {
        self.client.sample_rate() as u32
    }

    fn buffer_size(&self) -> Frames {
        self.client.buffer_size()
    }

    fn connect_ports(&self, from: &str, to: &str) -> Result<(), ServerError> {
        connect(&self.client, from, to)
    }
}

impl Connection for JackConnection {
    type Port = JackPort;
    type Active<C: Callback> = JackActive<C>;

    fn register_port(&mut self, name: &str, spec: PortSpec) -> Result<JackPort, ServerError> {
        let refused = |e: jack::Error| ServerError::PortRefused {
            name: name.to_string(),
            reason: e.to_string(),
        };

        let port = match (spec.direction, spec.media) {
            (Direction::Input, MediaType::Audio) => self
                .client
                .register_port(name, AudioIn::default())
                .map(JackPort::AudioIn),
            (Direction::Output, MediaType::Audio) => self
                .client
                .register_port(name, AudioOut::default())
                .map(JackPort::AudioOut),
            (Direction::Input, MediaType::Midi) => self
                .client
                .register_port(name, MidiIn::default())
                .map(JackPort::MidiIn),
            (Direction::Output, MediaType::Midi) => self
                .client
                .register_port(name, MidiOut::default())
                .map(JackPort::MidiOut),
        };
        port.map_err(refused)
    }

    fn unregister_port(&mut self, port: JackPort) -> Result<(), ServerError> {
        let (name, result) = match port {
            JackPort::AudioIn(p) => (p.name(), self.client.unregister_port(p)),
            JackPort::AudioOut(p) => (p.name(), self.client.unregister_port(p)),
            JackPort::MidiIn(p) => (p.name(), self.client.unregister_port(p)),
            JackPort::MidiOut(p) => (p.name(), self.client.unregister_port(p)),
        };
        result.map_err(|e| ServerError::PortUnregisterFailed {
            name: name.unwrap_or_default(),
            reason: e.to_string(),
        })
    }

    fn activate<C: Callback>(self, callback: C) -> Result<JackActive<C>, Rejected<Self, C>> {
        // JACK consumes the client even when activation fails
        match self
            .client
            .activate_async(JackNotifications, JackProcess { callback })
        {
            Ok(client) => Ok(JackActive { client }),
            Err(e) => Err(Rejected {
                error: ServerError::ActivationFailed(e.to_string()),
                recovered: None,
            }),
        }
    }

    fn close(self) -> Result<(), ServerError> {
        // jack_client_close runs when the client is dropped
        drop(self.client);
        Ok(())
    }
}

/// Active JACK client; the RT thread owns the callback
pub struct JackActive<C: Callback> {
    client: jack::AsyncClient<JackNotifications, JackProcess<C>>,
}

impl<C: Callback> ServerInfo for JackActive<C> {
    fn name(&self) -> &str {
        self.client.as_client().name()
    }

    fn sample_rate(&self) -> u32 {
        self.client.as_client().sample_rate() as u32
    }

    fn buffer_size(&self) -> Frames {
        self.client.as_client().buffer_size()
    }

    fn connect_ports(&self, from: &str, to: &str) -> Result<(), ServerError> {
        connect(self.client.as_client(), from, to)
    }
}

impl<C: Callback> ActiveConnection for JackActive<C> {
    type Connection = JackConnection;
    type Callback = C;

    fn deactivate(self) -> Result<(JackConnection, C), ServerError> {
        let (client, _notifications, process) = self
            .client
            .deactivate()
            .map_err(|e| ServerError::DeactivationFailed(e.to_string()))?;
        Ok((JackConnection { client }, process.callback))
    }
}

/// JACK process handler: forwards each cycle to the callback bridge
pub struct JackProcess<C> {
    callback: C,
}

impl<C: Callback> jack::ProcessHandler for JackProcess<C> {
    fn process(&mut self, _client: &jack::Client, ps: &ProcessScope) -> jack::Control {
        // JACK stops calling a client whose process callback returns nonzero
        match self.callback.run(ps.n_frames()).status() {
            0 => jack::Control::Continue,
            _ => jack::Control::Quit,
        }
    }
}

/// JACK notification handler
pub struct JackNotifications;

impl jack::NotificationHandler for JackNotifications {
    fn sample_rate(&mut self, _client: &jack::Client, srate: jack::Frames) -> jack::Control {
        log::info!("JACK sample rate changed to: {}", srate);
        jack::Control::Continue
    }

    fn xrun(&mut self, _client: &jack::Client) -> jack::Control {
        log::warn!("JACK xrun detected");
        jack::Control::Continue
    }
}
