use std::{fmt, sync::Arc};

use super::{
    AudioDeviceManager, AudioSource, DeviceId, GatedSource, OutputStream, StreamConfig,
    StreamGate,
};
use crate::{constants::CONVERSION_BUFFER_FRAMES, error::DeviceError};
use cpal::{
    FromSample, OutputCallbackInfo, Sample, SampleFormat, StreamError,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

/// Output device as reported by the host, for device pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub default_sample_rate: Option<u32>,
    pub default_channels: Option<u16>,
}

pub struct CpalAudioDeviceManager {
    host: cpal::Host,
}

impl CpalAudioDeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn list_output_devices(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        let devices = self
            .host
            .output_devices()
            .map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        let mut result = Vec::new();
        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };
            let default_config = device.default_output_config().ok();
            result.push(DeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                default_sample_rate: default_config.as_ref().map(|c| c.sample_rate().0),
                default_channels: default_config.as_ref().map(cpal::SupportedStreamConfig::channels),
                name,
            });
        }

        Ok(result)
    }

    fn find_device(&self, id: &DeviceId) -> Result<cpal::Device, DeviceError> {
        match id {
            DeviceId::Default => self
                .host
                .default_output_device()
                .ok_or_else(|| DeviceError::DeviceNotFound(id.to_string())),
            DeviceId::Named(_) => self
                .host
                .output_devices()
                .map_err(|e| DeviceError::Enumeration(e.to_string()))?
                .find(|d| d.name().is_ok_and(|name| id.matches(&name)))
                .ok_or_else(|| DeviceError::DeviceNotFound(id.to_string())),
        }
    }

    /// Picks the best sample format the device offers for exactly this rate and
    /// channel count.
    fn negotiate_format(
        device: &cpal::Device,
        config: StreamConfig,
    ) -> Result<SampleFormat, DeviceError> {
        let ranges = device
            .supported_output_configs()
            .map_err(|e| DeviceError::StreamBuildFailed(e.to_string()))?;

        let formats: Vec<SampleFormat> = ranges
            .filter(|range| {
                range.channels() == config.channels
                    && range.min_sample_rate().0 <= config.sample_rate
                    && config.sample_rate <= range.max_sample_rate().0
            })
            .map(|range| range.sample_format())
            .collect();

        [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16]
            .into_iter()
            .find(|preferred| formats.contains(preferred))
            .ok_or(DeviceError::UnsupportedConfig {
                sample_rate: config.sample_rate,
                channels: config.channels,
            })
    }

    fn build_output_stream<T, C>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut cb: C,
    ) -> Result<cpal::Stream, DeviceError>
    where
        T: cpal::SizedSample,
        C: FnMut(&mut [T], usize) + Send + 'static,
    {
        let error_cb = move |err: StreamError| {
            if matches!(err, StreamError::DeviceNotAvailable) {
                log::error!("Output device lost: {err}");
            } else {
                log::warn!("Stream status: {err}");
            }
        };

        let channels = usize::from(config.channels);
        let data_cb = move |data: &mut [T], _: &OutputCallbackInfo| {
            let frame_size = data.len() / channels;
            cb(data, frame_size);
        };

        device
            .build_output_stream(config, data_cb, error_cb, None)
            .map_err(|e| DeviceError::StreamBuildFailed(e.to_string()))
    }

    /// Wraps the source for device formats other than `f32`. Buffers larger
    /// than the preallocated scratch space are rendered in scratch-sized
    /// pieces, so callbacks never allocate.
    fn converting<T>(
        mut gated: GatedSource,
        channels: usize,
    ) -> impl FnMut(&mut [T], usize) + Send + 'static
    where
        T: cpal::SizedSample + FromSample<f32>,
    {
        let channels = channels.max(1);
        let mut scratch = vec![0.0_f32; CONVERSION_BUFFER_FRAMES * channels];
        move |data: &mut [T], _frame_size| {
            for piece in data.chunks_mut(scratch.len()) {
                let scratch = &mut scratch[..piece.len()];
                gated.fill(scratch, piece.len() / channels);
                for (out, sample) in piece.iter_mut().zip(scratch.iter()) {
                    *out = sample.to_sample::<T>();
                }
            }
        }
    }
}

impl Default for CpalAudioDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CpalAudioDeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalAudioDeviceManager")
            .field("host", &self.host.id())
            .finish()
    }
}

impl AudioDeviceManager for CpalAudioDeviceManager {
    type Stream = CpalOutputStream;

    fn open_output_stream(
        &mut self,
        device: &DeviceId,
        config: StreamConfig,
        audio_source: Box<dyn AudioSource>,
    ) -> Result<Self::Stream, DeviceError> {
        let cpal_device = self.find_device(device)?;
        let device_name = cpal_device
            .name()
            .unwrap_or_else(|_| device.to_string());
        let sample_format = Self::negotiate_format(&cpal_device, config)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = usize::from(config.channels);

        let gate = Arc::new(StreamGate::default());
        let mut gated = GatedSource::new(audio_source, gate.clone());

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_output_stream::<f32, _>(
                &cpal_device,
                &stream_config,
                move |data: &mut [f32], frame_size| {
                    gated.fill(data, frame_size);
                },
            )?,
            SampleFormat::I16 => Self::build_output_stream::<i16, _>(
                &cpal_device,
                &stream_config,
                Self::converting::<i16>(gated, channels),
            )?,
            SampleFormat::U16 => Self::build_output_stream::<u16, _>(
                &cpal_device,
                &stream_config,
                Self::converting::<u16>(gated, channels),
            )?,
            format => {
                return Err(DeviceError::StreamBuildFailed(format!(
                    "Unsupported sample format '{format}'"
                )));
            }
        };

        // Streams may start running as soon as they are built on some hosts.
        stream
            .pause()
            .map_err(|e| DeviceError::StreamStopFailed(e.to_string()))?;

        log::info!(
            "Opened '{device_name}': {} channel(s) @ {} Hz ({sample_format})",
            config.channels,
            config.sample_rate
        );

        Ok(CpalOutputStream {
            stream,
            gate,
            config,
        })
    }
}

pub struct CpalOutputStream {
    stream: cpal::Stream,
    gate: Arc<StreamGate>,
    config: StreamConfig,
}

impl fmt::Debug for CpalOutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalOutputStream")
            .field("gate", &self.gate)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OutputStream for CpalOutputStream {
    fn play(&mut self) -> Result<(), DeviceError> {
        self.gate.reopen();
        self.stream
            .play()
            .map_err(|e| DeviceError::StreamStartFailed(e.to_string()))
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        self.gate.halt();
        self.stream
            .pause()
            .map_err(|e| DeviceError::StreamStopFailed(e.to_string()))
    }

    fn is_halted(&self) -> bool {
        self.gate.is_halted()
    }

    fn config(&self) -> StreamConfig {
        self.config
    }
}
