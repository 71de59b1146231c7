use std::{
    io::Read,
    path::{Path, PathBuf},
};

use hound::{SampleFormat, WavReader};

use crate::{clip::Clip, error::LoadError, slot::ClipSlot};

/// Reads a `.wav` file fully into memory as a two-dimensional clip.
///
/// Supports:
/// - any channel count (mono stays mono; widening happens at normalization)
/// - 8 to 32-bit integer PCM, scaled to `[-1.0, 1.0]`
/// - 32-bit float PCM, passed through
///
/// # Example
/// ```no_run
/// use clip_store::wav::load_wav;
///
/// let clip = load_wav("assets/wav/clapping.wav").unwrap();
/// ```
pub fn load_wav(path: impl AsRef<Path>) -> Result<Clip, LoadError> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    decode(reader)
}

pub fn load_wav_from_reader<R: Read>(stream: R) -> Result<Clip, LoadError> {
    let reader = WavReader::new(stream)?;
    decode(reader)
}

/// Loads every path into a slot. A file that fails to decode is logged and
/// becomes an `Absent` slot at the same position; it never aborts the rest.
pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Vec<ClipSlot> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let slot = ClipSlot::from_load(label_for(path), load_wav(path));
            if let Some(clip) = slot.clip() {
                log::info!(
                    "Loaded '{}': {} frames, {} channel(s) @ {} Hz",
                    slot.label(),
                    clip.frame_count(),
                    clip.channel_count(),
                    clip.sample_rate()
                );
            }
            slot
        })
        .collect()
}

fn label_for(path: &Path) -> String {
    path.file_name().map_or_else(
        || PathBuf::from(path).display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<Clip, LoadError> {
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = 1.0 / (1_u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        (format, bits) => {
            return Err(LoadError::UnsupportedFormat {
                bits,
                format: match format {
                    SampleFormat::Int => "integer",
                    SampleFormat::Float => "float",
                },
            });
        }
    };

    Clip::from_interleaved(samples, usize::from(spec.channels), spec.sample_rate)
}
