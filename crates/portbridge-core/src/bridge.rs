//! Real-time callback bridge
//!
//! Turns one server cycle into a call of the consumer's [`ProcessHandler`]
//! with the input and output buffers in registry order.
//!
//! # Real-time safety
//!
//! The bridge owns the registry for the whole time the client is active, so
//! the port set cannot change under it and no lock is needed. The scratch
//! vectors are sized to the port counts when the bridge is built; resolving
//! buffers each cycle only overwrites them. Nothing on this path allocates,
//! blocks or logs.

use crate::buffers::{Buffers, BuffersMut, RawBuffer};
use crate::registry::PortRegistry;
use crate::server::{Callback, ServerPort};
use crate::types::{Control, Direction, Frames};

/// Processing routine supplied by the consumer
///
/// Called on the server's real-time thread once per cycle. Implementations
/// must not allocate, block or take locks shared with other threads.
/// Returning [`Control::Quit`] asks the server to stop calling.
pub trait ProcessHandler: Send + 'static {
    fn process(
        &mut self,
        frames: Frames,
        inputs: &Buffers<'_>,
        outputs: &mut BuffersMut<'_>,
    ) -> Control;
}

/// Wraps a closure as a [`ProcessHandler`]
pub struct ClosureHandler<F> {
    process: F,
}

impl<F> ClosureHandler<F>
where
    F: FnMut(Frames, &Buffers<'_>, &mut BuffersMut<'_>) -> Control + Send + 'static,
{
    pub fn new(process: F) -> Self {
        Self { process }
    }
}

impl<F> ProcessHandler for ClosureHandler<F>
where
    F: FnMut(Frames, &Buffers<'_>, &mut BuffersMut<'_>) -> Control + Send + 'static,
{
    fn process(
        &mut self,
        frames: Frames,
        inputs: &Buffers<'_>,
        outputs: &mut BuffersMut<'_>,
    ) -> Control {
        (self.process)(frames, inputs, outputs)
    }
}

/// The server-facing callback: registry, handler and per-cycle scratch space
pub struct CallbackBridge<P, H> {
    registry: PortRegistry<P>,
    handler: H,
    inputs: Vec<RawBuffer>,
    outputs: Vec<RawBuffer>,
}

impl<P: ServerPort, H: ProcessHandler> CallbackBridge<P, H> {
    pub fn new(registry: PortRegistry<P>, handler: H) -> Self {
        let inputs = Vec::with_capacity(registry.len(Direction::Input));
        let outputs = Vec::with_capacity(registry.len(Direction::Output));
        Self {
            registry,
            handler,
            inputs,
            outputs,
        }
    }

    pub fn registry(&self) -> &PortRegistry<P> {
        &self.registry
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_parts(self) -> (PortRegistry<P>, H) {
        (self.registry, self.handler)
    }
}

/// Resolve one direction into `scratch` (capacity already matches)
fn resolve<P: ServerPort>(
    registry: &PortRegistry<P>,
    direction: Direction,
    frames: Frames,
    scratch: &mut Vec<RawBuffer>,
) {
    scratch.clear();
    for port in registry.iter(direction) {
        // Called from the server's process cycle for `frames` frames
        let ptr = unsafe { port.handle().buffer(frames) };
        scratch.push(RawBuffer::new(ptr, port.media()));
    }
}

impl<P: ServerPort, H: ProcessHandler> Callback for CallbackBridge<P, H> {
    fn run(&mut self, frames: Frames) -> Control {
        resolve(&self.registry, Direction::Input, frames, &mut self.inputs);
        resolve(&self.registry, Direction::Output, frames, &mut self.outputs);

        let inputs = Buffers::new(&self.inputs, frames);
        let mut outputs = BuffersMut::new(&self.outputs, frames);
        self.handler.process(frames, &inputs, &mut outputs)
    }
}
