//! Per-cycle buffer handles
//!
//! The callback bridge resolves every registered port into a [`RawBuffer`]
//! once per cycle. Processing code sees them through [`Buffers`] (inputs,
//! read-only) and [`BuffersMut`] (outputs). Both views borrow the bridge's
//! scratch storage, so a handle cannot outlive the cycle it was resolved in.

use std::ffi::c_void;

use crate::types::{Frames, MediaType, Sample};

/// Pointer into server-owned port memory, valid for one process cycle
#[derive(Debug, Clone, Copy)]
pub struct RawBuffer {
    ptr: *mut c_void,
    media: MediaType,
}

// The pointer is only dereferenced inside the cycle that resolved it, on the
// server's process thread. The scratch vectors holding these move to that
// thread on activation.
unsafe impl Send for RawBuffer {}

impl RawBuffer {
    pub(crate) fn new(ptr: *mut c_void, media: MediaType) -> Self {
        Self { ptr, media }
    }

    pub fn media(&self) -> MediaType {
        self.media
    }

    /// Raw pointer as returned by the server
    ///
    /// For MIDI ports this is the server's opaque event buffer.
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    fn audio_ptr(&self) -> Option<*mut Sample> {
        if self.media == MediaType::Audio && !self.ptr.is_null() {
            Some(self.ptr.cast())
        } else {
            None
        }
    }
}

/// Read-only input buffers for one cycle, in registry order
#[derive(Debug, Clone, Copy)]
pub struct Buffers<'a> {
    raw: &'a [RawBuffer],
    frames: Frames,
}

impl<'a> Buffers<'a> {
    pub(crate) fn new(raw: &'a [RawBuffer], frames: Frames) -> Self {
        Self { raw, frames }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Number of frames in this cycle
    pub fn frames(&self) -> Frames {
        self.frames
    }

    pub fn raw(&self, index: usize) -> Option<RawBuffer> {
        self.raw.get(index).copied()
    }

    /// Samples of an audio port; `None` for MIDI ports or out of range
    pub fn audio(&self, index: usize) -> Option<&'a [Sample]> {
        let ptr = self.raw.get(index)?.audio_ptr()?;
        // Audio port buffers hold `frames` samples for the current cycle
        Some(unsafe { std::slice::from_raw_parts(ptr, self.frames as usize) })
    }
}

/// Writable output buffers for one cycle, in registry order
#[derive(Debug)]
pub struct BuffersMut<'a> {
    raw: &'a [RawBuffer],
    frames: Frames,
}

impl<'a> BuffersMut<'a> {
    pub(crate) fn new(raw: &'a [RawBuffer], frames: Frames) -> Self {
        Self { raw, frames }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn frames(&self) -> Frames {
        self.frames
    }

    pub fn raw(&self, index: usize) -> Option<RawBuffer> {
        self.raw.get(index).copied()
    }

    /// Samples of an audio output port; `None` for MIDI ports or out of range
    pub fn audio_mut(&mut self, index: usize) -> Option<&mut [Sample]> {
        let ptr = self.raw.get(index)?.audio_ptr()?;
        // Each output port owns a distinct buffer; `&mut self` keeps one
        // mutable slice alive at a time.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, self.frames as usize) })
    }

    /// Fill every audio output with silence
    pub fn silence(&mut self) {
        for index in 0..self.raw.len() {
            if let Some(samples) = self.audio_mut(index) {
                samples.fill(0.0);
            }
        }
    }
}
