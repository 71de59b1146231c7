use std::sync::atomic::{AtomicU32, Ordering};

/// Converts a level in decibels to a linear amplitude multiplier.
/// `-inf` dB is silence.
pub fn db_to_linear(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        0.0
    } else {
        10.0_f32.powf(db / 20.0)
    }
}

pub fn linear_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

/// A linear gain shared between the control thread and the audio thread.
/// Stored as raw `f32` bits so reads and writes are single atomic words.
#[derive(Debug)]
pub struct AtomicGain(AtomicU32);

impl AtomicGain {
    pub fn new(gain: f32) -> Self {
        Self(AtomicU32::new(gain.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}
