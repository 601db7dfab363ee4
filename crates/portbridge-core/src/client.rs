//! Client lifecycle and facade
//!
//! A [`Client`] owns one server connection, the ports registered on it and
//! the consumer's [`ProcessHandler`]. Operations are gated by its state:
//!
//! | operation              | NotActive | Active      | Closed  |
//! |------------------------|-----------|-------------|---------|
//! | add/remove ports       | yes       | StateError  | StateError |
//! | `start()`              | yes       | StateError  | StateError |
//! | `stop()`               | StateError| yes         | StateError |
//! | `close()`              | yes       | stops first | no-op   |
//! | `connect()`            | StateError| yes         | StateError |
//!
//! `start()` moves the registry and handler into the server as a
//! [`CallbackBridge`]; `stop()` takes them back. Dropping a client that is
//! not closed closes it.

use crate::bridge::{CallbackBridge, ProcessHandler};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::registry::PortRegistry;
use crate::server::{ActiveConnection, Backend, Connection, Rejected, ServerInfo};
use crate::types::{ClientState, Direction, Frames, MediaType, PortInfo, PortSpec};

type Bridge<C, H> = CallbackBridge<<C as Connection>::Port, H>;

enum Inner<C: Connection, H: ProcessHandler> {
    NotActive {
        connection: C,
        registry: PortRegistry<C::Port>,
        handler: H,
    },
    Active {
        session: C::Active<Bridge<C, H>>,
        inputs: Vec<PortInfo>,
        outputs: Vec<PortInfo>,
    },
    Closed,
}

impl<C: Connection, H: ProcessHandler> Inner<C, H> {
    fn state(&self) -> ClientState {
        match self {
            Inner::NotActive { .. } => ClientState::NotActive,
            Inner::Active { .. } => ClientState::Active,
            Inner::Closed => ClientState::Closed,
        }
    }
}

/// A client of the audio server
pub struct Client<C: Connection, H: ProcessHandler> {
    /// Name assigned by the server
    name: String,
    inner: Inner<C, H>,
}

impl<C: Connection, H: ProcessHandler> Client<C, H> {
    /// Open a connection and bind `handler` as its process routine
    ///
    /// The client starts in [`ClientState::NotActive`]. If the server assigns
    /// a different name than requested, it is logged and available via
    /// [`Client::name`].
    pub fn open<B>(backend: &B, config: &ClientConfig, handler: H) -> ClientResult<Self>
    where
        B: Backend<Connection = C>,
    {
        let opened = backend.open(config)?;
        let connection = opened.connection;
        let name = connection.name().to_string();

        if opened.server_started {
            log::info!("Audio server started");
        }
        if opened.name_reassigned {
            log::info!(
                "NOTE: Unique name '{}' assigned by the server (requested '{}')",
                name,
                config.client_name
            );
        }
        log::info!(
            "Client '{}' opened (sample rate: {}Hz, buffer: {} frames)",
            name,
            connection.sample_rate(),
            connection.buffer_size()
        );

        Ok(Self {
            name,
            inner: Inner::NotActive {
                connection,
                registry: PortRegistry::new(),
                handler,
            },
        })
    }

    /// Open with default options under the given name
    pub fn new<B>(backend: &B, name: &str, handler: H) -> ClientResult<Self>
    where
        B: Backend<Connection = C>,
    {
        Self::open(backend, &ClientConfig::new(name), handler)
    }

    /// Activate: the server starts calling the process routine
    pub fn start(&mut self) -> ClientResult<()> {
        let inner = std::mem::replace(&mut self.inner, Inner::Closed);
        let (connection, registry, handler) = match inner {
            Inner::NotActive {
                connection,
                registry,
                handler,
            } => (connection, registry, handler),
            other => return Err(self.restore(other, "start the client")),
        };

        let inputs = registry.infos(Direction::Input);
        let outputs = registry.infos(Direction::Output);
        let bridge = CallbackBridge::new(registry, handler);

        match connection.activate(bridge) {
            Ok(session) => {
                self.inner = Inner::Active {
                    session,
                    inputs,
                    outputs,
                };
                log::info!("Client '{}' activated", self.name);
                Ok(())
            }
            Err(Rejected {
                error,
                recovered: Some((connection, bridge)),
            }) => {
                let (registry, handler) = bridge.into_parts();
                self.inner = Inner::NotActive {
                    connection,
                    registry,
                    handler,
                };
                Err(error.into())
            }
            Err(Rejected {
                error,
                recovered: None,
            }) => {
                log::error!(
                    "Client '{}' lost its server connection during activation",
                    self.name
                );
                Err(error.into())
            }
        }
    }

    /// Deactivate: no process cycle runs after this returns
    pub fn stop(&mut self) -> ClientResult<()> {
        let inner = std::mem::replace(&mut self.inner, Inner::Closed);
        let session = match inner {
            Inner::Active { session, .. } => session,
            other => return Err(self.restore(other, "stop the client")),
        };

        match session.deactivate() {
            Ok((connection, bridge)) => {
                let (registry, handler) = bridge.into_parts();
                self.inner = Inner::NotActive {
                    connection,
                    registry,
                    handler,
                };
                log::info!("Client '{}' deactivated", self.name);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "Client '{}' lost its server connection during deactivation",
                    self.name
                );
                Err(e.into())
            }
        }
    }

    /// Release every port and the connection
    ///
    /// Stops the client first if it is active. Ports are unregistered before
    /// the connection is closed. Every step is attempted; the first failure
    /// is returned. Closing a closed client does nothing.
    pub fn close(&mut self) -> ClientResult<()> {
        if self.state() == ClientState::Active {
            self.stop()?;
        }

        let Inner::NotActive {
            mut connection,
            mut registry,
            ..
        } = std::mem::replace(&mut self.inner, Inner::Closed)
        else {
            return Ok(());
        };

        let mut first_error = None;
        for port in registry.drain() {
            let name = port.name().to_string();
            if let Err(source) = connection.unregister_port(port.into_handle()) {
                log::warn!("Failed to unregister port '{}': {}", name, source);
                first_error = first_error.or(Some(ClientError::PortRegistration { name, source }));
            }
        }

        if let Err(e) = connection.close() {
            log::error!("Failed to close client '{}': {}", self.name, e);
            first_error = first_error.or(Some(e.into()));
        }

        log::info!("Client '{}' closed", self.name);
        first_error.map_or(Ok(()), Err)
    }

    /// Register a port with the server and append it to the registry
    pub fn add_port(
        &mut self,
        name: &str,
        direction: Direction,
        media: MediaType,
    ) -> ClientResult<()> {
        let Inner::NotActive {
            connection,
            registry,
            ..
        } = &mut self.inner
        else {
            return Err(ClientError::State {
                operation: "add ports",
                state: self.inner.state(),
            });
        };

        if registry.contains(name, direction) {
            return Err(ClientError::DuplicatePort {
                name: name.to_string(),
                direction,
            });
        }

        let handle = connection
            .register_port(name, PortSpec::new(direction, media))
            .map_err(|source| ClientError::PortRegistration {
                name: name.to_string(),
                source,
            })?;

        if registry.insert(name, direction, media, handle).is_err() {
            // Checked above; the registry is only touched from this thread
            return Err(ClientError::DuplicatePort {
                name: name.to_string(),
                direction,
            });
        }

        log::debug!(
            "Registered {} {} port '{}:{}'",
            media,
            direction,
            self.name,
            name
        );
        Ok(())
    }

    /// Unregister a port; removing an unknown name is a no-op
    pub fn remove_port(&mut self, name: &str, direction: Direction) -> ClientResult<()> {
        let Inner::NotActive {
            connection,
            registry,
            ..
        } = &mut self.inner
        else {
            return Err(ClientError::State {
                operation: "remove ports",
                state: self.inner.state(),
            });
        };

        let Some(port) = registry.remove(name, direction) else {
            return Ok(());
        };

        connection
            .unregister_port(port.into_handle())
            .map_err(|source| ClientError::PortRegistration {
                name: name.to_string(),
                source,
            })?;

        log::debug!("Unregistered {} port '{}:{}'", direction, self.name, name);
        Ok(())
    }

    pub fn add_audio_in_port(&mut self, name: &str) -> ClientResult<()> {
        self.add_port(name, Direction::Input, MediaType::Audio)
    }

    pub fn add_audio_out_port(&mut self, name: &str) -> ClientResult<()> {
        self.add_port(name, Direction::Output, MediaType::Audio)
    }

    pub fn add_midi_in_port(&mut self, name: &str) -> ClientResult<()> {
        self.add_port(name, Direction::Input, MediaType::Midi)
    }

    pub fn add_midi_out_port(&mut self, name: &str) -> ClientResult<()> {
        self.add_port(name, Direction::Output, MediaType::Midi)
    }

    pub fn remove_in_port(&mut self, name: &str) -> ClientResult<()> {
        self.remove_port(name, Direction::Input)
    }

    pub fn remove_out_port(&mut self, name: &str) -> ClientResult<()> {
        self.remove_port(name, Direction::Output)
    }

    /// Connect one of this client's ports to a remote port (`client:port`)
    ///
    /// Output ports are the source of the connection, input ports the
    /// destination. Only possible while active.
    pub fn connect(&self, port: &str, direction: Direction, remote: &str) -> ClientResult<()> {
        let Inner::Active {
            session,
            inputs,
            outputs,
        } = &self.inner
        else {
            return Err(ClientError::State {
                operation: "connect ports",
                state: self.inner.state(),
            });
        };

        let ports = match direction {
            Direction::Input => inputs,
            Direction::Output => outputs,
        };
        if !ports.iter().any(|info| info.name == port) {
            return Err(ClientError::PortNotFound {
                name: port.to_string(),
                direction,
            });
        }

        let local = format!("{}:{}", self.name, port);
        let (from, to) = match direction {
            Direction::Output => (local.as_str(), remote),
            Direction::Input => (remote, local.as_str()),
        };
        session.connect_ports(from, to)?;

        log::info!("Connected {} to {}", from, to);
        Ok(())
    }

    /// Name assigned by the server
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        self.inner.state()
    }

    pub fn sample_rate(&self) -> ClientResult<u32> {
        Ok(self.server("query the sample rate")?.sample_rate())
    }

    /// Buffer size in frames
    pub fn buffer_size(&self) -> ClientResult<Frames> {
        Ok(self.server("query the buffer size")?.buffer_size())
    }

    /// Output latency of one buffer in milliseconds
    pub fn latency_ms(&self) -> ClientResult<f32> {
        let server = self.server("query the latency")?;
        Ok((server.buffer_size() as f32 / server.sample_rate() as f32) * 1000.0)
    }

    /// Registered ports of one direction, in the order their buffers are passed
    pub fn ports(&self, direction: Direction) -> Vec<PortInfo> {
        match &self.inner {
            Inner::NotActive { registry, .. } => registry.infos(direction),
            Inner::Active {
                inputs, outputs, ..
            } => match direction {
                Direction::Input => inputs.clone(),
                Direction::Output => outputs.clone(),
            },
            Inner::Closed => Vec::new(),
        }
    }

    /// The process routine; `None` while it runs on the server's thread
    pub fn handler(&self) -> Option<&H> {
        match &self.inner {
            Inner::NotActive { handler, .. } => Some(handler),
            _ => None,
        }
    }

    pub fn handler_mut(&mut self) -> Option<&mut H> {
        match &mut self.inner {
            Inner::NotActive { handler, .. } => Some(handler),
            _ => None,
        }
    }

    /// Put back a state that does not allow `operation`
    fn restore(&mut self, inner: Inner<C, H>, operation: &'static str) -> ClientError {
        let state = inner.state();
        self.inner = inner;
        ClientError::State { operation, state }
    }

    fn server(&self, operation: &'static str) -> ClientResult<&dyn ServerInfo> {
        match &self.inner {
            Inner::NotActive { connection, .. } => Ok(connection),
            Inner::Active { session, .. } => Ok(session),
            Inner::Closed => Err(ClientError::State {
                operation,
                state: ClientState::Closed,
            }),
        }
    }
}

impl<C: Connection, H: ProcessHandler> Drop for Client<C, H> {
    fn drop(&mut self) {
        if self.state() != ClientState::Closed {
            if let Err(e) = self.close() {
                log::error!("Error closing client '{}': {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::{Buffers, BuffersMut};
    use crate::error::ServerError;
    use crate::server::mock::{MockBackend, MockConnection};
    use crate::types::Control;

    /// Copies input 0 to output 0 and counts cycles
    #[derive(Default)]
    struct Passthrough {
        cycles: usize,
        last_frames: Frames,
        input_count: usize,
        output_count: usize,
    }

    impl ProcessHandler for Passthrough {
        fn process(
            &mut self,
            frames: Frames,
            inputs: &Buffers<'_>,
            outputs: &mut BuffersMut<'_>,
        ) -> Control {
            self.cycles += 1;
            self.last_frames = frames;
            self.input_count = inputs.len();
            self.output_count = outputs.len();
            if let (Some(input), Some(output)) = (inputs.audio(0), outputs.audio_mut(0)) {
                output.copy_from_slice(input);
            }
            Control::Continue
        }
    }

    type TestClient = Client<MockConnection, Passthrough>;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn open(backend: &MockBackend, name: &str) -> TestClient {
        init_logging();
        Client::new(backend, name, Passthrough::default()).unwrap()
    }

    fn names(client: &TestClient, direction: Direction) -> Vec<String> {
        client.ports(direction).into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_end_to_end_passthrough() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "t1");
        assert_eq!(client.state(), ClientState::NotActive);

        client.add_port("a", Direction::Input, MediaType::Audio).unwrap();
        client.add_port("b", Direction::Output, MediaType::Audio).unwrap();
        client.start().unwrap();
        assert_eq!(client.state(), ClientState::Active);

        let ramp: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
        assert!(backend.write_port("t1:a", &ramp));
        assert_eq!(backend.run_cycle("t1", 64), Some(Control::Continue));
        assert_eq!(backend.read_port("t1:b", 64), Some(ramp));

        client.stop().unwrap();
        let handler = client.handler().unwrap();
        assert_eq!(handler.cycles, 1);
        assert_eq!(handler.last_frames, 64);
        assert_eq!((handler.input_count, handler.output_count), (1, 1));

        client.close().unwrap();
        assert_eq!(client.state(), ClientState::Closed);

        let calls = backend.calls();
        assert_eq!(calls.registered, ["t1:a", "t1:b"]);
        assert_eq!(calls.unregistered, ["t1:a", "t1:b"]);
        assert_eq!((calls.opened, calls.activated, calls.deactivated, calls.closed), (1, 1, 1, 1));
    }

    #[test]
    fn test_buffer_order_is_registration_order() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "order");
        client.add_audio_in_port("left").unwrap();
        client.add_audio_in_port("right").unwrap();
        client.add_audio_out_port("out").unwrap();

        assert_eq!(names(&client, Direction::Input), ["left", "right"]);
        assert_eq!(names(&client, Direction::Input), ["left", "right"]);

        backend.write_port("order:left", &[1.0; 32]);
        backend.write_port("order:right", &[2.0; 32]);
        client.start().unwrap();
        assert_eq!(names(&client, Direction::Input), ["left", "right"]);
        backend.run_cycle("order", 32);
        client.stop().unwrap();

        // Passthrough copies input 0, which must be "left"
        assert_eq!(backend.read_port("order:out", 32), Some(vec![1.0; 32]));
        assert_eq!(client.handler().map(|h| h.input_count), Some(2));
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "dup");
        client.add_audio_in_port("main").unwrap();

        let err = client.add_midi_in_port("main").unwrap_err();
        assert!(matches!(
            err,
            ClientError::DuplicatePort { ref name, direction: Direction::Input } if name == "main"
        ));
        assert_eq!(names(&client, Direction::Input), ["main"]);
        assert_eq!(backend.calls().registered, ["dup:main"]);

        // The registry allows the name in the other direction, but the
        // server's port namespace is per client, so the server refuses it
        assert!(matches!(
            client.add_audio_out_port("main"),
            Err(ClientError::PortRegistration { .. })
        ));
        assert!(names(&client, Direction::Output).is_empty());
        assert_eq!(names(&client, Direction::Input), ["main"]);
    }

    #[test]
    fn test_port_identity_is_kept() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "both");
        client.add_midi_in_port("ctl").unwrap();
        client.add_audio_in_port("mic").unwrap();

        let inputs = client.ports(Direction::Input);
        assert_eq!(inputs[0].media, MediaType::Midi);
        assert_eq!(inputs[1].media, MediaType::Audio);
        assert!(names(&client, Direction::Output).is_empty());
    }

    #[test]
    fn test_ports_frozen_while_active() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "frozen");
        client.add_audio_in_port("in").unwrap();
        client.start().unwrap();

        assert!(matches!(
            client.add_audio_in_port("late"),
            Err(ClientError::State { state: ClientState::Active, .. })
        ));
        assert!(matches!(
            client.remove_in_port("in"),
            Err(ClientError::State { state: ClientState::Active, .. })
        ));
        assert_eq!(names(&client, Direction::Input), ["in"]);
        assert_eq!(backend.calls().registered.len(), 1);
        assert!(backend.calls().unregistered.is_empty());
    }

    #[test]
    fn test_ports_rejected_when_closed() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "gone");
        client.close().unwrap();

        assert!(matches!(
            client.add_audio_out_port("out"),
            Err(ClientError::State { state: ClientState::Closed, .. })
        ));
        assert!(matches!(
            client.remove_out_port("out"),
            Err(ClientError::State { state: ClientState::Closed, .. })
        ));
        assert!(backend.calls().registered.is_empty());
    }

    #[test]
    fn test_remove_port() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "rm");
        client.add_audio_out_port("l").unwrap();
        client.add_audio_out_port("r").unwrap();

        client.remove_out_port("l").unwrap();
        // Unknown names are ignored
        client.remove_out_port("l").unwrap();
        client.remove_in_port("r").unwrap();

        assert_eq!(names(&client, Direction::Output), ["r"]);
        assert_eq!(backend.calls().unregistered, ["rm:l"]);

        client.close().unwrap();
        assert_eq!(backend.calls().unregistered, ["rm:l", "rm:r"]);
    }

    #[test]
    fn test_rejected_transition_keeps_client_intact() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "keep");
        client.add_audio_in_port("in").unwrap();
        client.handler_mut().unwrap().cycles = 7;

        assert!(client.stop().is_err());
        assert_eq!(client.state(), ClientState::NotActive);
        assert_eq!(names(&client, Direction::Input), ["in"]);
        assert_eq!(client.handler().map(|h| h.cycles), Some(7));

        client.start().unwrap();
        assert!(client.start().is_err());
        assert_eq!(backend.run_cycle("keep", 16), Some(Control::Continue));
        client.stop().unwrap();
        assert_eq!(client.handler().map(|h| h.cycles), Some(8));
        assert_eq!(backend.calls().activated, 1);
    }

    #[test]
    fn test_remove_port_refused_by_server() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "sticky");
        client.add_audio_out_port("l").unwrap();
        client.add_audio_out_port("r").unwrap();
        backend.refuse_unregister("l");

        let err = client.remove_out_port("l").unwrap_err();
        assert!(matches!(
            err,
            ClientError::PortRegistration {
                ref name,
                source: ServerError::PortUnregisterFailed { .. },
            } if name == "l"
        ));
        // The entry is gone even though the server kept the port
        assert_eq!(names(&client, Direction::Output), ["r"]);
        assert!(backend.calls().unregistered.is_empty());

        client.close().unwrap();
        assert_eq!(backend.calls().unregistered, ["sticky:r"]);
    }

    #[test]
    fn test_close_continues_after_unregister_failure() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "partial");
        client.add_audio_in_port("a").unwrap();
        client.add_audio_in_port("b").unwrap();
        client.add_midi_out_port("c").unwrap();
        backend.refuse_unregister("a");

        let err = client.close().unwrap_err();
        assert!(matches!(
            err,
            ClientError::PortRegistration { ref name, .. } if name == "a"
        ));
        assert_eq!(client.state(), ClientState::Closed);

        let calls = backend.calls();
        assert_eq!(calls.unregistered, ["partial:b", "partial:c"]);
        assert_eq!(calls.closed, 1);
        assert!(backend.clients().is_empty());
        assert!(client.close().is_ok());
    }

    #[test]
    fn test_start_stop_state_rules() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "rules");

        assert!(matches!(
            client.stop(),
            Err(ClientError::State { state: ClientState::NotActive, .. })
        ));
        assert_eq!(client.state(), ClientState::NotActive);
        client.start().unwrap();
        assert!(matches!(
            client.start(),
            Err(ClientError::State { state: ClientState::Active, .. })
        ));
        assert_eq!(client.state(), ClientState::Active);
        assert!(backend.is_active("rules"));
        client.stop().unwrap();
        assert_eq!(client.state(), ClientState::NotActive);

        // Restartable after stop
        client.start().unwrap();
        assert!(backend.is_active("rules"));
        client.stop().unwrap();
        assert!(!backend.is_active("rules"));
        assert_eq!(backend.calls().activated, 2);

        client.close().unwrap();
        assert!(matches!(
            client.start(),
            Err(ClientError::State { state: ClientState::Closed, .. })
        ));
        assert!(matches!(
            client.stop(),
            Err(ClientError::State { state: ClientState::Closed, .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "twice");
        client.add_audio_in_port("in").unwrap();
        client.add_midi_out_port("out").unwrap();

        client.close().unwrap();
        client.close().unwrap();
        drop(client);

        let calls = backend.calls();
        assert_eq!(calls.closed, 1);
        assert_eq!(calls.unregistered, ["twice:in", "twice:out"]);
    }

    #[test]
    fn test_close_while_active_stops_first() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "busy");
        client.add_audio_out_port("out").unwrap();
        client.start().unwrap();

        client.close().unwrap();

        let calls = backend.calls();
        assert_eq!(calls.deactivated, 1);
        assert_eq!(calls.unregistered, ["busy:out"]);
        assert_eq!(calls.closed, 1);
        assert_eq!(backend.run_cycle("busy", 64), None);
    }

    #[test]
    fn test_drop_closes_exactly_once() {
        let backend = MockBackend::new();
        {
            let mut client = open(&backend, "scoped");
            client.add_audio_in_port("in").unwrap();
            client.add_audio_out_port("out").unwrap();
            client.start().unwrap();
        }

        let calls = backend.calls();
        assert_eq!(calls.deactivated, 1);
        assert_eq!(calls.unregistered, ["scoped:in", "scoped:out"]);
        assert_eq!(calls.closed, 1);
        assert!(backend.clients().is_empty());
    }

    #[test]
    fn test_open_failure() {
        init_logging();
        let backend = MockBackend::new();
        backend.set_running(false);

        let result: ClientResult<TestClient> = Client::new(&backend, "nobody", Passthrough::default());
        assert!(matches!(result, Err(ClientError::Connection(_))));
        assert_eq!(backend.calls().opened, 0);
    }

    #[test]
    fn test_reassigned_name_is_not_an_error() {
        let backend = MockBackend::new();
        let first = open(&backend, "synth");
        let second = open(&backend, "synth");

        assert_eq!(first.name(), "synth");
        assert_eq!(second.name(), "synth-01");
    }

    #[test]
    fn test_port_refused_by_server() {
        let backend = MockBackend::new();
        backend.refuse_port("big");
        let mut client = open(&backend, "refuse");

        assert!(matches!(
            client.add_audio_out_port("big"),
            Err(ClientError::PortRegistration { ref name, .. }) if name == "big"
        ));
        assert!(names(&client, Direction::Output).is_empty());
    }

    #[test]
    fn test_refused_activation_keeps_client_usable() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "retry");
        client.add_audio_in_port("in").unwrap();

        backend.refuse_activation(true);
        assert!(matches!(client.start(), Err(ClientError::Connection(_))));
        assert_eq!(client.state(), ClientState::NotActive);
        assert_eq!(names(&client, Direction::Input), ["in"]);

        backend.refuse_activation(false);
        client.start().unwrap();
        assert_eq!(client.state(), ClientState::Active);
    }

    #[test]
    fn test_failed_deactivation_closes_client() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "lost");
        client.start().unwrap();

        backend.fail_deactivation(true);
        assert!(matches!(client.stop(), Err(ClientError::Connection(_))));
        assert_eq!(client.state(), ClientState::Closed);
        assert!(client.close().is_ok());
    }

    #[test]
    fn test_close_failure_still_releases() {
        let backend = MockBackend::new();
        let mut client = open(&backend, "stuck");
        client.add_audio_in_port("in").unwrap();
        backend.fail_close(true);

        assert!(matches!(client.close(), Err(ClientError::Connection(_))));
        assert_eq!(client.state(), ClientState::Closed);
        assert_eq!(backend.calls().unregistered, ["stuck:in"]);
    }

    #[test]
    fn test_quit_propagates_to_server() {
        init_logging();
        let backend = MockBackend::new();
        let handler = crate::bridge::ClosureHandler::new(
            |_frames, _inputs: &Buffers<'_>, _outputs: &mut BuffersMut<'_>| Control::Quit,
        );
        let mut client = Client::new(&backend, "quitter", handler).unwrap();
        client.start().unwrap();

        assert_eq!(backend.run_cycle("quitter", 16), Some(Control::Quit));
        assert_eq!(backend.run_cycle("quitter", 16), None);
        client.stop().unwrap();
    }

    #[test]
    fn test_accessors() {
        let backend = MockBackend::new()
            .with_sample_rate(44100)
            .with_buffer_size(441);
        let mut client = open(&backend, "info");

        assert_eq!(client.sample_rate().unwrap(), 44100);
        assert_eq!(client.buffer_size().unwrap(), 441);
        assert!((client.latency_ms().unwrap() - 10.0).abs() < 0.001);

        client.start().unwrap();
        assert_eq!(client.sample_rate().unwrap(), 44100);
        assert!(client.handler().is_none());
        assert!(client.handler_mut().is_none());

        client.close().unwrap();
        assert!(matches!(
            client.buffer_size(),
            Err(ClientError::State { state: ClientState::Closed, .. })
        ));
        assert_eq!(client.name(), "info");
        assert!(client.ports(Direction::Input).is_empty());
    }

    #[test]
    fn test_connect_ports() {
        let backend = MockBackend::new()
            .with_remote_port("system:playback_1")
            .with_remote_port("system:capture_1");
        let mut client = open(&backend, "router");
        client.add_audio_in_port("in").unwrap();
        client.add_audio_out_port("out").unwrap();

        assert!(matches!(
            client.connect("out", Direction::Output, "system:playback_1"),
            Err(ClientError::State { state: ClientState::NotActive, .. })
        ));

        client.start().unwrap();
        client
            .connect("out", Direction::Output, "system:playback_1")
            .unwrap();
        client
            .connect("in", Direction::Input, "system:capture_1")
            .unwrap();
        assert!(matches!(
            client.connect("missing", Direction::Output, "system:playback_1"),
            Err(ClientError::PortNotFound { .. })
        ));
        assert!(matches!(
            client.connect("out", Direction::Output, "system:playback_9"),
            Err(ClientError::Connection(_))
        ));

        assert_eq!(
            backend.calls().connections,
            [
                ("router:out".to_string(), "system:playback_1".to_string()),
                ("system:capture_1".to_string(), "router:in".to_string()),
            ]
        );
    }
}
