use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::gain::AtomicGain;

/// Which clip is armed, plus a generation that changes on every (re)arm.
///
/// Both halves live in one `u64` so a single atomic store publishes a complete
/// `(clip, cursor = 0)` snapshot. The audio thread never sees an index from one
/// arm paired with a cursor from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedSlot {
    pub generation: u32,
    pub clip_index: u32,
}

impl ArmedSlot {
    pub fn pack(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.clip_index)
    }

    pub fn unpack(word: u64) -> Self {
        Self {
            generation: (word >> 32) as u32,
            clip_index: word as u32,
        }
    }
}

/// Playback state shared by the control thread and the real-time renderer.
///
/// Every field is a single atomic word. The control thread only ever writes,
/// the renderer only ever reads, except for `position` which flows the other way.
#[derive(Debug, Default)]
pub struct SharedState {
    armed: AtomicU64,
    gain: AtomicGain,
    looping: AtomicBool,
    /// `(generation, frame)` packed like the armed word.
    position: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> ArmedSlot {
        ArmedSlot::unpack(self.armed.load(Ordering::Acquire))
    }

    /// Arms `clip_index` from its first frame.
    pub fn arm(&self, clip_index: u32) {
        let generation = self.armed().generation.wrapping_add(1);
        let slot = ArmedSlot {
            generation,
            clip_index,
        };
        self.armed.store(slot.pack(), Ordering::Release);
    }

    /// Re-arms the current clip, sending the renderer back to frame 0.
    pub fn rewind(&self) {
        self.arm(self.armed().clip_index);
    }

    pub fn gain(&self) -> f32 {
        self.gain.load()
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain);
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, enabled: bool) {
        self.looping.store(enabled, Ordering::Relaxed);
    }

    /// Frame offset last reported by the renderer. Reports made before the
    /// latest (re)arm read as 0, so a callback still in flight during
    /// [`rewind`](Self::rewind) cannot leave a stale position behind.
    pub fn position(&self) -> usize {
        let word = self.position.load(Ordering::Relaxed);
        if (word >> 32) as u32 == self.armed().generation {
            word as u32 as usize
        } else {
            0
        }
    }

    pub(crate) fn publish_position(&self, generation: u32, frame: usize) {
        let frame = u32::try_from(frame).unwrap_or(u32::MAX);
        self.position.store(
            (u64::from(generation) << 32) | u64::from(frame),
            Ordering::Relaxed,
        );
    }
}
