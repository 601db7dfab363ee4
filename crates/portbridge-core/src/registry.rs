//! Port registry
//!
//! Maps user-chosen port names to server handles, one sequence per direction.
//! Ports are kept in insertion order; that order is the order of the buffer
//! handles the processing routine sees each cycle. Removing a port keeps the
//! relative order of the others.

use crate::types::{Direction, MediaType, PortInfo};

/// A port registered with the server
#[derive(Debug)]
pub struct RegisteredPort<P> {
    name: String,
    media: MediaType,
    handle: P,
}

impl<P> RegisteredPort<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media(&self) -> MediaType {
        self.media
    }

    pub fn handle(&self) -> &P {
        &self.handle
    }

    pub fn into_handle(self) -> P {
        self.handle
    }

    pub fn info(&self) -> PortInfo {
        PortInfo {
            name: self.name.clone(),
            media: self.media,
        }
    }
}

/// Input and output ports of one client, keyed by name within each direction
#[derive(Debug)]
pub struct PortRegistry<P> {
    inputs: Vec<RegisteredPort<P>>,
    outputs: Vec<RegisteredPort<P>>,
}

impl<P> Default for PortRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PortRegistry<P> {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn ports(&self, direction: Direction) -> &Vec<RegisteredPort<P>> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    fn ports_mut(&mut self, direction: Direction) -> &mut Vec<RegisteredPort<P>> {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }

    pub fn contains(&self, name: &str, direction: Direction) -> bool {
        self.get(name, direction).is_some()
    }

    pub fn get(&self, name: &str, direction: Direction) -> Option<&RegisteredPort<P>> {
        self.ports(direction).iter().find(|port| port.name == name)
    }

    /// Append a port after the existing ones of its direction
    ///
    /// Returns the handle back if the name is already taken in that direction.
    pub fn insert(
        &mut self,
        name: &str,
        direction: Direction,
        media: MediaType,
        handle: P,
    ) -> Result<(), P> {
        if self.contains(name, direction) {
            return Err(handle);
        }
        self.ports_mut(direction).push(RegisteredPort {
            name: name.to_string(),
            media,
            handle,
        });
        Ok(())
    }

    /// Remove a port by name; `None` if no such port exists
    pub fn remove(&mut self, name: &str, direction: Direction) -> Option<RegisteredPort<P>> {
        let ports = self.ports_mut(direction);
        let index = ports.iter().position(|port| port.name == name)?;
        Some(ports.remove(index))
    }

    /// Ports of one direction in registry order
    pub fn iter(&self, direction: Direction) -> std::slice::Iter<'_, RegisteredPort<P>> {
        self.ports(direction).iter()
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.ports(direction).len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Names and media types of one direction in registry order
    pub fn infos(&self, direction: Direction) -> Vec<PortInfo> {
        self.iter(direction).map(RegisteredPort::info).collect()
    }

    /// Remove every port, inputs first, each direction in registry order
    pub fn drain(&mut self) -> impl Iterator<Item = RegisteredPort<P>> + '_ {
        self.inputs.drain(..).chain(self.outputs.drain(..))
    }
}
