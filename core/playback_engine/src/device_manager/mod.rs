use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::error::DeviceError;

pub mod cpal_dm;
pub mod null;

/// What the pull callback wants the device to do after the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Continue,
    /// Deliver this buffer, then stop calling back.
    Stop,
}

/// Anything the output device can pull interleaved `f32` frames from.
pub trait AudioSource: Send {
    /// Fill `buffer` with `frame_size` interleaved frames.
    fn fill_buffer(&mut self, buffer: &mut [f32], frame_size: usize) -> CallbackStatus;
}

/// Opaque output device selector, passed straight through to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceId {
    #[default]
    Default,
    /// Case-insensitive substring of the device name.
    Named(String),
}

impl DeviceId {
    pub fn matches(&self, device_name: &str) -> bool {
        match self {
            Self::Default => true,
            Self::Named(needle) => device_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

impl From<Option<String>> for DeviceId {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Default, Self::Named)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default output"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Halt latch shared between a stream handle and its device callback.
///
/// Once the source returns [`CallbackStatus::Stop`] the gate closes and the
/// device writes silence without touching the source again, until the
/// control thread reopens it.
#[derive(Debug, Default)]
pub struct StreamGate {
    halted: AtomicBool,
}

impl StreamGate {
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn reopen(&self) {
        self.halted.store(false, Ordering::Release);
    }
}

/// An [`AudioSource`] behind a [`StreamGate`]; this is what device callbacks own.
pub struct GatedSource {
    source: Box<dyn AudioSource>,
    gate: Arc<StreamGate>,
}

impl GatedSource {
    pub fn new(source: Box<dyn AudioSource>, gate: Arc<StreamGate>) -> Self {
        Self { source, gate }
    }

    /// Returns `true` when the source was actually called.
    pub fn fill(&mut self, buffer: &mut [f32], frame_size: usize) -> bool {
        if self.gate.is_halted() {
            buffer.fill(0.0);
            return false;
        }

        if self.source.fill_buffer(buffer, frame_size) == CallbackStatus::Stop {
            self.gate.halt();
        }
        true
    }
}

impl fmt::Debug for GatedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedSource")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// A bound, open output stream. Created paused.
pub trait OutputStream {
    /// Reopens the gate and starts (or resumes) callbacks.
    fn play(&mut self) -> Result<(), DeviceError>;
    /// Halts callbacks. No callback may touch the source after this returns,
    /// apart from one already in flight.
    fn pause(&mut self) -> Result<(), DeviceError>;
    /// True once the source asked to stop, or after [`pause`](Self::pause).
    fn is_halted(&self) -> bool;
    fn config(&self) -> StreamConfig;
}

pub trait AudioDeviceManager {
    type Stream: OutputStream;

    fn open_output_stream(
        &mut self,
        device: &DeviceId,
        config: StreamConfig,
        audio_source: Box<dyn AudioSource>,
    ) -> Result<Self::Stream, DeviceError>;
}
