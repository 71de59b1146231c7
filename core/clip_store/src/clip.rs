use std::time::Duration;

use crate::error::LoadError;

/// An in-memory PCM buffer of shape `(frame_count, channel_count)`.
///
/// Samples are stored interleaved, one frame after another, as normalized
/// `f32` amplitudes. A `Clip` is never mutated once built; normalization
/// produces new clips instead of padding existing ones in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    samples: Vec<f32>,
    channel_count: usize,
    sample_rate: u32,
}

impl Clip {
    pub fn from_interleaved(
        samples: Vec<f32>,
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, LoadError> {
        if channel_count == 0 {
            return Err(LoadError::InvalidLayout(
                "clip must have at least one channel".to_owned(),
            ));
        }
        if samples.len() % channel_count != 0 {
            return Err(LoadError::InvalidLayout(format!(
                "{} samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }

        Ok(Self {
            samples,
            channel_count,
            sample_rate,
        })
    }

    pub(crate) fn from_parts(samples: Vec<f32>, channel_count: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            channel_count,
            sample_rate,
        }
    }

    /// A zero-filled clip of the given shape.
    pub fn silent(frame_count: usize, channel_count: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; frame_count * channel_count],
            channel_count,
            sample_rate,
        }
    }

    pub fn frame_count(&self) -> usize {
        if self.channel_count == 0 {
            0
        } else {
            self.samples.len() / self.channel_count
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Interleaved samples for `count` frames starting at frame `start`.
    /// The range is clamped to the end of the clip.
    pub fn frames(&self, start: usize, count: usize) -> &[f32] {
        let total = self.frame_count();
        let start = start.min(total);
        let end = start.saturating_add(count).min(total);
        &self.samples[start * self.channel_count..end * self.channel_count]
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }
}
