use std::fmt;

use crate::{clip::Clip, slot::ClipSlot};

/// Rate assumed for a set in which no clip decoded.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Format disagreements between the present clips of a set. None of these
/// block playback. Clips that failed to load are reported by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMismatchWarning {
    SampleRate {
        index: usize,
        expected: u32,
        found: u32,
    },
    ChannelCount {
        index: usize,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for ConfigMismatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRate {
                index,
                expected,
                found,
            } => write!(
                f,
                "clip {index} has sample rate {found} Hz, set plays at {expected} Hz"
            ),
            Self::ChannelCount {
                index,
                expected,
                found,
            } => write!(
                f,
                "clip {index} has {found} channel(s), first clip has {expected}"
            ),
        }
    }
}

/// A normalized, immutable collection of clips that all share one shape.
#[derive(Debug, Clone)]
pub struct ClipSet {
    clips: Vec<Clip>,
    labels: Vec<String>,
    frame_count: usize,
    channel_count: usize,
    sample_rate: u32,
    warnings: Vec<ConfigMismatchWarning>,
}

impl ClipSet {
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// False when every clip is zero frames long; such a set cannot be played.
    pub fn has_audio(&self) -> bool {
        self.frame_count > 0 && self.channel_count > 0
    }

    pub fn warnings(&self) -> &[ConfigMismatchWarning] {
        &self.warnings
    }
}

/// Pads every slot to the longest clip and the widest channel layout of the set.
///
/// Present clips are copied into the top-left corner of a zeroed buffer, absent
/// slots become pure silence. The output has one clip per input slot, in order.
/// The set plays at the first present clip's sample rate.
pub fn normalize(slots: Vec<ClipSlot>) -> ClipSet {
    let frame_count = slots
        .iter()
        .filter_map(ClipSlot::clip)
        .map(Clip::frame_count)
        .max()
        .unwrap_or(0);
    let channel_count = slots
        .iter()
        .filter_map(ClipSlot::clip)
        .map(Clip::channel_count)
        .max()
        .unwrap_or(0);
    let first = slots.iter().find_map(ClipSlot::clip);
    let sample_rate = first.map_or(DEFAULT_SAMPLE_RATE, Clip::sample_rate);
    let first_channels = first.map_or(0, Clip::channel_count);

    let warnings = collect_warnings(&slots, sample_rate, first_channels);
    for warning in &warnings {
        log::warn!("{warning}");
    }

    let mut clips = Vec::with_capacity(slots.len());
    let mut labels = Vec::with_capacity(slots.len());
    for slot in slots {
        let padded = match &slot {
            ClipSlot::Present { clip, .. } => pad(clip, frame_count, channel_count, sample_rate),
            ClipSlot::Absent { .. } => Clip::silent(frame_count, channel_count, sample_rate),
        };
        clips.push(padded);
        labels.push(match slot {
            ClipSlot::Present { label, .. } | ClipSlot::Absent { label } => label,
        });
    }

    log::debug!(
        "Normalized {} clip(s) to {frame_count} frames x {channel_count} channel(s) @ {sample_rate} Hz",
        clips.len()
    );

    ClipSet {
        clips,
        labels,
        frame_count,
        channel_count,
        sample_rate,
        warnings,
    }
}

fn collect_warnings(
    slots: &[ClipSlot],
    sample_rate: u32,
    channel_count: usize,
) -> Vec<ConfigMismatchWarning> {
    let mut warnings = Vec::new();
    let present = slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| slot.clip().map(|clip| (index, clip)));
    for (index, clip) in present {
        if clip.sample_rate() != sample_rate {
            warnings.push(ConfigMismatchWarning::SampleRate {
                index,
                expected: sample_rate,
                found: clip.sample_rate(),
            });
        }
        if clip.channel_count() != channel_count {
            warnings.push(ConfigMismatchWarning::ChannelCount {
                index,
                expected: channel_count,
                found: clip.channel_count(),
            });
        }
    }
    warnings
}

fn pad(clip: &Clip, frame_count: usize, channel_count: usize, sample_rate: u32) -> Clip {
    let mut samples = vec![0.0; frame_count * channel_count];
    let src_channels = clip.channel_count();
    if channel_count > 0 && src_channels > 0 {
        for (dst, src) in samples
            .chunks_exact_mut(channel_count)
            .zip(clip.samples().chunks_exact(src_channels))
        {
            dst[..src_channels].copy_from_slice(src);
        }
    }

    Clip::from_parts(samples, channel_count, sample_rate)
}
