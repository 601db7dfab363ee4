//! In-process mock audio server
//!
//! Implements the server traits without any audio hardware. Every server
//! call is recorded in [`MockCalls`], process cycles are driven explicitly
//! with [`MockBackend::run_cycle`], and port buffers can be written and read
//! from the test thread between cycles. Failures can be injected per call
//! type to exercise error paths.
//!
//! ```ignore
//! let backend = MockBackend::new();
//! let mut client = Client::new(&backend, "t1", Passthrough)?;
//! client.add_audio_in_port("in")?;
//! client.add_audio_out_port("out")?;
//! client.start()?;
//!
//! backend.write_port("t1:in", &[0.5; 64]);
//! backend.run_cycle("t1", 64);
//! assert_eq!(backend.read_port("t1:out", 64), Some(vec![0.5; 64]));
//! ```

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    ActiveConnection, Backend, Callback, Connection, Opened, Rejected, ServerInfo, ServerPort,
};
use crate::config::ClientConfig;
use crate::error::ServerError;
use crate::types::{Control, Frames, PortSpec};

/// Samples allocated per mock port; cycles may not exceed this
pub const MOCK_BUFFER_CAPACITY: usize = 8192;

/// Default mock sample rate (48kHz)
pub const MOCK_SAMPLE_RATE: u32 = 48000;

/// Default mock buffer size (frames)
pub const MOCK_BUFFER_SIZE: Frames = 256;

/// Process entry as the server sees it: integer status per cycle
type Driver = Box<dyn FnMut(Frames) -> i32 + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Server calls recorded by the mock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub opened: usize,
    pub closed: usize,
    pub activated: usize,
    pub deactivated: usize,
    /// Full port names (`client:port`) in registration order
    pub registered: Vec<String>,
    /// Full port names in unregistration order
    pub unregistered: Vec<String>,
    /// `(from, to)` pairs
    pub connections: Vec<(String, String)>,
}

struct MockState {
    sample_rate: u32,
    buffer_size: Frames,
    running: bool,
    refuse_activation: bool,
    fail_deactivation: bool,
    fail_close: bool,
    refused_ports: Vec<String>,
    refused_unregister: Vec<String>,
    remote_ports: Vec<String>,
    clients: Vec<String>,
    buffers: HashMap<String, Arc<MockBuffer>>,
    drivers: HashMap<String, Driver>,
    calls: MockCalls,
}

impl MockState {
    fn release_client(&mut self, client: &str) {
        let prefix = format!("{}:", client);
        self.clients.retain(|name| name != client);
        self.buffers.retain(|port, _| !port.starts_with(&prefix));
        self.drivers.remove(client);
    }
}

/// Sample memory of one mock port
struct MockBuffer {
    samples: Box<[UnsafeCell<f32>]>,
}

// Accessed by one thread at a time: cycles run on the caller of
// `run_cycle`, and the test thread only reads or writes between cycles.
unsafe impl Sync for MockBuffer {}

impl MockBuffer {
    fn new() -> Self {
        Self {
            samples: (0..MOCK_BUFFER_CAPACITY).map(|_| UnsafeCell::new(0.0)).collect(),
        }
    }

    fn as_ptr(&self) -> *mut f32 {
        UnsafeCell::raw_get(self.samples.as_ptr())
    }
}

/// Handle to a shared mock server
///
/// Clones share the same server, so a test keeps one clone to drive cycles
/// and inspect calls while the client owns its connection.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                sample_rate: MOCK_SAMPLE_RATE,
                buffer_size: MOCK_BUFFER_SIZE,
                running: true,
                refuse_activation: false,
                fail_deactivation: false,
                fail_close: false,
                refused_ports: Vec::new(),
                refused_unregister: Vec::new(),
                remote_ports: Vec::new(),
                clients: Vec::new(),
                buffers: HashMap::new(),
                drivers: HashMap::new(),
                calls: MockCalls::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    pub fn with_sample_rate(self, rate: u32) -> Self {
        self.lock().sample_rate = rate;
        self
    }

    pub fn with_buffer_size(self, frames: Frames) -> Self {
        self.lock().buffer_size = frames;
        self
    }

    /// Add a port owned by some other client (e.g. `system:playback_1`)
    pub fn with_remote_port(self, name: &str) -> Self {
        self.lock().remote_ports.push(name.to_string());
        self
    }

    /// Simulate the server being down; opens fail unless they may start it
    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn refuse_activation(&self, refuse: bool) {
        self.lock().refuse_activation = refuse;
    }

    /// Deactivation fails and drops the connection
    pub fn fail_deactivation(&self, fail: bool) {
        self.lock().fail_deactivation = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.lock().fail_close = fail;
    }

    /// Refuse registration of ports with this short name
    pub fn refuse_port(&self, name: &str) {
        self.lock().refused_ports.push(name.to_string());
    }

    /// Refuse unregistration of ports with this short name
    pub fn refuse_unregister(&self, name: &str) {
        self.lock().refused_unregister.push(name.to_string());
    }

    pub fn calls(&self) -> MockCalls {
        self.lock().calls.clone()
    }

    /// Names of currently open clients
    pub fn clients(&self) -> Vec<String> {
        self.lock().clients.clone()
    }

    pub fn is_active(&self, client: &str) -> bool {
        self.lock().drivers.contains_key(client)
    }

    /// Run one process cycle of `client`
    ///
    /// Returns `None` if the client is not active, has quit, or `frames`
    /// exceeds [`MOCK_BUFFER_CAPACITY`].
    pub fn run_cycle(&self, client: &str, frames: Frames) -> Option<Control> {
        if frames as usize > MOCK_BUFFER_CAPACITY {
            log::warn!(
                "Mock cycle of {} frames exceeds buffer capacity {}",
                frames,
                MOCK_BUFFER_CAPACITY
            );
            return None;
        }

        // Run without holding the server lock, as a real server would
        let mut driver = self.lock().drivers.remove(client)?;
        let control = Control::from_status(driver(frames));
        if control == Control::Continue {
            self.lock().drivers.insert(client.to_string(), driver);
        }
        Some(control)
    }

    /// Copy samples into a port buffer (full name); false if no such port
    pub fn write_port(&self, port: &str, samples: &[f32]) -> bool {
        let Some(buffer) = self.lock().buffers.get(port).cloned() else {
            return false;
        };
        for (cell, sample) in buffer.samples.iter().zip(samples) {
            unsafe { *cell.get() = *sample };
        }
        true
    }

    /// First `frames` samples of a port buffer (full name)
    pub fn read_port(&self, port: &str, frames: usize) -> Option<Vec<f32>> {
        let buffer = self.lock().buffers.get(port).cloned()?;
        Some(
            buffer
                .samples
                .iter()
                .take(frames)
                .map(|cell| unsafe { *cell.get() })
                .collect(),
        )
    }
}

impl Backend for MockBackend {
    type Connection = MockConnection;

    fn open(&self, config: &ClientConfig) -> Result<Opened<MockConnection>, ServerError> {
        let mut state = self.lock();
        let requested = &config.client_name;

        let mut server_started = false;
        if !state.running {
            if !config.start_server {
                return Err(ServerError::Unreachable {
                    name: requested.clone(),
                    reason: "mock server not running".to_string(),
                });
            }
            state.running = true;
            server_started = true;
        }

        let mut name = requested.clone();
        if state.clients.contains(&name) && config.use_exact_name {
            return Err(ServerError::NameTaken(name));
        }
        let mut suffix = 1;
        while state.clients.contains(&name) {
            name = format!("{}-{:02}", requested, suffix);
            suffix += 1;
        }

        state.clients.push(name.clone());
        state.calls.opened += 1;

        Ok(Opened {
            name_reassigned: name != *requested,
            server_started,
            connection: MockConnection {
                name,
                state: Arc::clone(&self.state),
            },
        })
    }
}

/// Port registered with the mock server
pub struct MockPort {
    name: String,
    buffer: Arc<MockBuffer>,
}

impl MockPort {
    /// Full name (`client:port`)
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ServerPort for MockPort {
    unsafe fn buffer(&self, _frames: Frames) -> *mut c_void {
        self.buffer.as_ptr().cast()
    }
}

/// Inactive connection to the mock server
pub struct MockConnection {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl ServerInfo for MockConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        lock(&self.state).sample_rate
    }

    fn buffer_size(&self) -> Frames {
        lock(&self.state).buffer_size
    }

    fn connect_ports(&self, from: &str, to: &str) -> Result<(), ServerError> {
        let mut state = lock(&self.state);
        let known = |port: &str| {
            state.buffers.contains_key(port) || state.remote_ports.iter().any(|p| p == port)
        };
        if !known(from) || !known(to) {
            return Err(ServerError::ConnectFailed {
                from: from.to_string(),
                to: to.to_string(),
                reason: "no such port".to_string(),
            });
        }
        state
            .calls
            .connections
            .push((from.to_string(), to.to_string()));
        Ok(())
    }
}

impl Connection for MockConnection {
    type Port = MockPort;
    type Active<C: Callback> = MockActive<C>;

    fn register_port(&mut self, name: &str, _spec: PortSpec) -> Result<MockPort, ServerError> {
        let full_name = format!("{}:{}", self.name, name);
        let mut state = lock(&self.state);

        if state.refused_ports.iter().any(|refused| refused == name) {
            return Err(ServerError::PortRefused {
                name: name.to_string(),
                reason: "refused by mock server".to_string(),
            });
        }
        if state.buffers.contains_key(&full_name) {
            return Err(ServerError::PortRefused {
                name: name.to_string(),
                reason: "port already exists".to_string(),
            });
        }

        let buffer = Arc::new(MockBuffer::new());
        state.buffers.insert(full_name.clone(), Arc::clone(&buffer));
        state.calls.registered.push(full_name.clone());

        Ok(MockPort {
            name: full_name,
            buffer,
        })
    }

    fn unregister_port(&mut self, port: MockPort) -> Result<(), ServerError> {
        let mut state = lock(&self.state);
        let short_name = port.name.strip_prefix(&format!("{}:", self.name));
        if state
            .refused_unregister
            .iter()
            .any(|refused| Some(refused.as_str()) == short_name)
        {
            return Err(ServerError::PortUnregisterFailed {
                name: port.name,
                reason: "refused by mock server".to_string(),
            });
        }
        if state.buffers.remove(&port.name).is_none() {
            return Err(ServerError::PortUnregisterFailed {
                name: port.name,
                reason: "unknown port".to_string(),
            });
        }
        state.calls.unregistered.push(port.name);
        Ok(())
    }

    fn activate<C: Callback>(self, callback: C) -> Result<MockActive<C>, Rejected<Self, C>> {
        if lock(&self.state).refuse_activation {
            return Err(Rejected {
                error: ServerError::ActivationFailed("refused by mock server".to_string()),
                recovered: Some((self, callback)),
            });
        }

        let slot = Arc::new(Mutex::new(Some(callback)));
        let driver_slot = Arc::clone(&slot);
        let driver: Driver = Box::new(move |frames: Frames| match lock(&driver_slot).as_mut() {
            Some(callback) => callback.run(frames).status(),
            None => Control::Quit.status(),
        });

        {
            let mut state = lock(&self.state);
            state.drivers.insert(self.name.clone(), driver);
            state.calls.activated += 1;
        }

        Ok(MockActive {
            connection: self,
            slot,
        })
    }

    fn close(self) -> Result<(), ServerError> {
        let mut state = lock(&self.state);
        state.calls.closed += 1;
        state.release_client(&self.name);
        if state.fail_close {
            return Err(ServerError::CloseFailed("mock close failure".to_string()));
        }
        Ok(())
    }
}

/// Active connection to the mock server; cycles run via [`MockBackend::run_cycle`]
pub struct MockActive<C> {
    connection: MockConnection,
    slot: Arc<Mutex<Option<C>>>,
}

impl<C> ServerInfo for MockActive<C> {
    fn name(&self) -> &str {
        self.connection.name()
    }

    fn sample_rate(&self) -> u32 {
        self.connection.sample_rate()
    }

    fn buffer_size(&self) -> Frames {
        self.connection.buffer_size()
    }

    fn connect_ports(&self, from: &str, to: &str) -> Result<(), ServerError> {
        self.connection.connect_ports(from, to)
    }
}

impl<C: Callback> ActiveConnection for MockActive<C> {
    type Connection = MockConnection;
    type Callback = C;

    fn deactivate(self) -> Result<(MockConnection, C), ServerError> {
        {
            let mut state = lock(&self.connection.state);
            state.drivers.remove(&self.connection.name);
            state.calls.deactivated += 1;
            if state.fail_deactivation {
                state.release_client(&self.connection.name);
                return Err(ServerError::DeactivationFailed(
                    "mock deactivation failure".to_string(),
                ));
            }
        }

        let callback = lock(&self.slot).take().ok_or_else(|| {
            ServerError::DeactivationFailed("callback already taken".to_string())
        })?;
        Ok((self.connection, callback))
    }
}
