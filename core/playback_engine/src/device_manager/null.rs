//! Headless output backend.
//!
//! Nothing is rendered on its own: whoever holds a [`NullStreamHandle`] plays
//! the role of the device thread and pulls buffers explicitly. Used for tests
//! and for running the engine on machines without audio hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AudioDeviceManager, AudioSource, DeviceId, GatedSource, OutputStream, StreamConfig,
    StreamGate,
};
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct Registry {
    /// `None` accepts any name.
    device_names: Option<Vec<String>>,
    /// `None` accepts any configuration.
    supported: Option<Vec<StreamConfig>>,
    fail_next_open: Option<DeviceError>,
    fail_next_play: Option<DeviceError>,
    opened: Vec<NullStreamHandle>,
}

/// Device manager whose streams are driven by hand. Clones share state, so a
/// test can keep one clone and give the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct NullDeviceManager {
    registry: Arc<Mutex<Registry>>,
}

impl NullDeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts named lookups to these devices.
    pub fn with_devices<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry().device_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts opens to these exact configurations.
    pub fn with_supported_configs(self, configs: impl IntoIterator<Item = StreamConfig>) -> Self {
        self.registry().supported = Some(configs.into_iter().collect());
        self
    }

    pub fn fail_next_open(&self, error: DeviceError) {
        self.registry().fail_next_open = Some(error);
    }

    pub fn fail_next_play(&self, error: DeviceError) {
        self.registry().fail_next_play = Some(error);
    }

    pub fn streams_opened(&self) -> usize {
        self.registry().opened.len()
    }

    pub fn last_stream(&self) -> Option<NullStreamHandle> {
        self.registry().opened.last().cloned()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioDeviceManager for NullDeviceManager {
    type Stream = NullOutputStream;

    fn open_output_stream(
        &mut self,
        device: &DeviceId,
        config: StreamConfig,
        audio_source: Box<dyn AudioSource>,
    ) -> Result<Self::Stream, DeviceError> {
        let mut registry = self.registry();

        if let Some(error) = registry.fail_next_open.take() {
            return Err(error);
        }

        if let (DeviceId::Named(_), Some(names)) = (device, &registry.device_names) {
            if !names.iter().any(|name| device.matches(name)) {
                return Err(DeviceError::DeviceNotFound(device.to_string()));
            }
        }

        if let Some(supported) = &registry.supported {
            if !supported.contains(&config) {
                return Err(DeviceError::UnsupportedConfig {
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                });
            }
        }

        let gate = Arc::new(StreamGate::default());
        let handle = NullStreamHandle {
            inner: Arc::new(Mutex::new(NullStreamInner {
                source: GatedSource::new(audio_source, gate.clone()),
                playing: false,
                closed: false,
                callbacks: 0,
            })),
            gate,
            config,
        };
        registry.opened.push(handle.clone());

        Ok(NullOutputStream {
            handle,
            registry: self.registry.clone(),
        })
    }
}

#[derive(Debug)]
struct NullStreamInner {
    source: GatedSource,
    playing: bool,
    closed: bool,
    callbacks: usize,
}

/// The device-thread side of a null stream.
#[derive(Debug, Clone)]
pub struct NullStreamHandle {
    inner: Arc<Mutex<NullStreamInner>>,
    gate: Arc<StreamGate>,
    config: StreamConfig,
}

impl NullStreamHandle {
    /// Requests `frames` frames the way a device callback would.
    /// Returns `None` while the stream is paused or closed.
    pub fn pull(&self, frames: usize) -> Option<Vec<f32>> {
        let mut inner = self.lock();
        if !inner.playing || inner.closed {
            return None;
        }

        let mut buffer = vec![0.0; frames * usize::from(self.config.channels)];
        if inner.source.fill(&mut buffer, frames) {
            inner.callbacks += 1;
        }
        Some(buffer)
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// True once the source asked to stop and the stream went quiet.
    pub fn is_halted(&self) -> bool {
        self.gate.is_halted()
    }

    /// How many times the source has actually been called.
    pub fn callbacks(&self) -> usize {
        self.lock().callbacks
    }

    pub fn config(&self) -> StreamConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, NullStreamInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct NullOutputStream {
    handle: NullStreamHandle,
    registry: Arc<Mutex<Registry>>,
}

impl OutputStream for NullOutputStream {
    fn play(&mut self) -> Result<(), DeviceError> {
        let failure = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_next_play
            .take();
        if let Some(error) = failure {
            return Err(error);
        }

        self.handle.gate.reopen();
        self.handle.lock().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        self.handle.gate.halt();
        self.handle.lock().playing = false;
        Ok(())
    }

    fn is_halted(&self) -> bool {
        self.handle.is_halted()
    }

    fn config(&self) -> StreamConfig {
        self.handle.config
    }
}

impl Drop for NullOutputStream {
    fn drop(&mut self) {
        let mut inner = self.handle.lock();
        inner.playing = false;
        inner.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_manager::CallbackStatus;

    struct Ones;

    impl AudioSource for Ones {
        fn fill_buffer(&mut self, buffer: &mut [f32], _frame_size: usize) -> CallbackStatus {
            buffer.fill(1.0);
            CallbackStatus::Continue
        }
    }

    const STEREO_48K: StreamConfig = StreamConfig {
        sample_rate: 48_000,
        channels: 2,
    };

    #[test]
    fn test_stream_is_silent_until_played() {
        let mut manager = NullDeviceManager::new();
        let mut stream = manager
            .open_output_stream(&DeviceId::Default, STEREO_48K, Box::new(Ones))
            .unwrap();
        let handle = manager.last_stream().unwrap();

        assert!(handle.pull(4).is_none());
        stream.play().unwrap();
        assert!(handle.is_playing());
        assert_eq!(handle.pull(4).unwrap(), vec![1.0; 8]);
        stream.pause().unwrap();
        assert!(!handle.is_playing());
        assert!(stream.is_halted());
        assert!(handle.pull(4).is_none());
        assert_eq!(handle.callbacks(), 1);
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let mut manager = NullDeviceManager::new().with_devices(["Speakers"]);
        let result = manager.open_output_stream(
            &DeviceId::Named("headphones".to_owned()),
            STEREO_48K,
            Box::new(Ones),
        );
        assert_eq!(
            result.err(),
            Some(DeviceError::DeviceNotFound("headphones".to_owned()))
        );
        assert_eq!(manager.streams_opened(), 0);
    }

    #[test]
    fn test_unsupported_config_is_rejected() {
        let mut manager = NullDeviceManager::new().with_supported_configs([STEREO_48K]);
        let mono = StreamConfig {
            sample_rate: 48_000,
            channels: 1,
        };
        let result = manager.open_output_stream(&DeviceId::Default, mono, Box::new(Ones));
        assert!(matches!(
            result,
            Err(DeviceError::UnsupportedConfig { channels: 1, .. })
        ));
    }

    #[test]
    fn test_dropping_the_stream_closes_the_handle() {
        let mut manager = NullDeviceManager::new();
        let stream = manager
            .open_output_stream(&DeviceId::Default, STEREO_48K, Box::new(Ones))
            .unwrap();
        let handle = manager.last_stream().unwrap();

        drop(stream);
        assert!(handle.is_closed());
        assert!(handle.pull(1).is_none());
    }
}
