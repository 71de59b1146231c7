use std::sync::Arc;

use clip_store::ClipSet;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::{
    constants::EVENT_RING_CAPACITY,
    device_manager::{AudioSource, CallbackStatus},
    state::{ArmedSlot, SharedState},
};

/// Notifications sent from the audio thread to the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A different clip started rendering from frame 0.
    Switched { clip_index: usize },
    /// End of data with looping on; the next buffer starts from frame 0.
    Looped { clip_index: usize },
    /// End of data with looping off; the device was told to stop.
    Finished { clip_index: usize },
}

pub type PlaybackEventConsumer = Consumer<PlaybackEvent>;

/// The real-time pull callback.
///
/// Owns the playback cursor; the control thread only ever reaches it through
/// the armed snapshot in [`SharedState`]. Rendering never allocates, locks, or
/// panics: the clip set is immutable and shared, and the armed index is checked
/// against it once per buffer.
#[derive(Debug)]
pub struct Renderer {
    clips: Arc<ClipSet>,
    shared: Arc<SharedState>,
    events: Producer<PlaybackEvent>,
    /// Armed snapshot this cursor belongs to.
    armed: Option<ArmedSlot>,
    clip_index: usize,
    cursor: usize,
}

impl Renderer {
    pub fn new(clips: Arc<ClipSet>, shared: Arc<SharedState>) -> (Self, PlaybackEventConsumer) {
        let (events, consumer) = RingBuffer::new(EVENT_RING_CAPACITY);
        let renderer = Self {
            clips,
            shared,
            events,
            armed: None,
            clip_index: 0,
            cursor: 0,
        };
        (renderer, consumer)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clip_index(&self) -> usize {
        self.clip_index
    }

    /// Renders `frames` interleaved frames into `out`.
    pub fn render(&mut self, out: &mut [f32], frames: usize) -> CallbackStatus {
        let generation = self.sync_armed();

        let Some(clip) = self.clips.get(self.clip_index) else {
            out.fill(0.0);
            return CallbackStatus::Continue;
        };

        let channels = clip.channel_count();
        let wanted = (frames * channels).min(out.len());
        let frames = wanted.checked_div(channels).unwrap_or(0);
        let gain = self.shared.gain();

        let chunk = clip.frame_count().saturating_sub(self.cursor).min(frames);
        let source = clip.frames(self.cursor, chunk);
        let (rendered, rest) = out.split_at_mut(source.len());
        for (dst, src) in rendered.iter_mut().zip(source) {
            *dst = src * gain;
        }
        rest.fill(0.0);

        let status = if chunk < frames {
            if self.shared.looping() {
                self.cursor = 0;
                self.notify(PlaybackEvent::Looped {
                    clip_index: self.clip_index,
                });
                CallbackStatus::Continue
            } else {
                self.cursor = clip.frame_count();
                self.notify(PlaybackEvent::Finished {
                    clip_index: self.clip_index,
                });
                CallbackStatus::Stop
            }
        } else {
            self.cursor += chunk;
            CallbackStatus::Continue
        };

        self.shared.publish_position(generation, self.cursor);
        status
    }

    /// Adopts the latest armed snapshot if it changed since the last buffer,
    /// returning its generation. Rewinds of the same clip are silent.
    fn sync_armed(&mut self) -> u32 {
        let armed = self.shared.armed();
        if self.armed == Some(armed) {
            return armed.generation;
        }

        let switched = self
            .armed
            .is_some_and(|previous| previous.clip_index != armed.clip_index);
        self.armed = Some(armed);
        self.cursor = 0;
        self.clip_index = armed.clip_index as usize;
        if switched {
            self.notify(PlaybackEvent::Switched {
                clip_index: self.clip_index,
            });
        }
        armed.generation
    }

    /// Drops the event when the control thread is not keeping up.
    fn notify(&mut self, event: PlaybackEvent) {
        let _ = self.events.push(event);
    }
}

impl AudioSource for Renderer {
    fn fill_buffer(&mut self, buffer: &mut [f32], frame_size: usize) -> CallbackStatus {
        self.render(buffer, frame_size)
    }
}
