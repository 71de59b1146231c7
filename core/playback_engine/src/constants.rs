/// Tolerance used when comparing rendered samples against expected values.
pub const AUDIO_SAMPLE_EPSILON: f32 = 1e-6;

/// Capacity of the ring carrying playback events from the audio thread.
pub const EVENT_RING_CAPACITY: usize = 64;

/// Frames pre-allocated for the conversion buffer of non-`f32` device formats.
pub const CONVERSION_BUFFER_FRAMES: usize = 8192;
