use std::{fmt, sync::Arc};

use clip_store::ClipSet;

use crate::{
    device_manager::{AudioDeviceManager, DeviceId, OutputStream, StreamConfig},
    error::{DeviceError, EngineError},
    gain::{db_to_linear, linear_to_db},
    render::{PlaybackEvent, PlaybackEventConsumer, Renderer},
    state::SharedState,
};

/// Where the engine is in its device lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// No device is bound.
    Closed,
    /// Bound and paused at frame 0.
    Stopped,
    Playing,
    /// The armed clip ran out with looping off; the device is silent.
    Finished,
}

/// Everything that belongs to one opened output stream.
struct DeviceBinding<S> {
    stream: S,
    device: DeviceId,
    events: PlaybackEventConsumer,
    on_finished: Box<dyn FnMut()>,
}

impl<S: fmt::Debug> fmt::Debug for DeviceBinding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("stream", &self.stream)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// The soundboard's playback engine.
///
/// Owns the clip set, the shared playback state and at most one device
/// binding. All control operations are meant to be called from a single
/// control thread; the device's audio thread only ever sees the [`Renderer`]
/// built by [`PlaybackEngine::open_stream`].
///
/// # Example
/// ```no_run
/// use clip_store::{normalize, wav::load_all};
/// use playback_engine::{
///     device_manager::{DeviceId, cpal_dm::CpalAudioDeviceManager},
///     engine::PlaybackEngine,
/// };
///
/// let clips = normalize(load_all(&["clapping.wav", "applause.wav"]));
/// let mut engine = PlaybackEngine::new(clips, CpalAudioDeviceManager::new());
/// engine.open_stream(DeviceId::Default, || {}).unwrap();
/// engine.bind(1);
/// engine.start().unwrap();
/// ```
pub struct PlaybackEngine<M: AudioDeviceManager> {
    device_manager: M,
    clips: Arc<ClipSet>,
    shared: Arc<SharedState>,
    armed_index: usize,
    binding: Option<DeviceBinding<M::Stream>>,
    transport: Transport,
}

impl<M: AudioDeviceManager> PlaybackEngine<M> {
    pub fn new(clips: ClipSet, device_manager: M) -> Self {
        Self {
            device_manager,
            clips: Arc::new(clips),
            shared: Arc::new(SharedState::new()),
            armed_index: 0,
            binding: None,
            transport: Transport::Closed,
        }
    }

    /// Arms clip `clip_index` from its first frame. Safe while streaming: the
    /// next buffer comes entirely from the new clip. Out-of-range indices are
    /// ignored.
    pub fn bind(&mut self, clip_index: usize) {
        let Some(armed) = u32::try_from(clip_index)
            .ok()
            .filter(|_| clip_index < self.clips.len())
        else {
            log::debug!(
                "Ignoring bind to clip {clip_index}, only {} loaded",
                self.clips.len()
            );
            return;
        };

        self.armed_index = clip_index;
        self.shared.arm(armed);
        log::debug!(
            "Armed clip {clip_index} ('{}')",
            self.clips.label(clip_index).unwrap_or_default()
        );
    }

    /// Binds the engine to an output device using the armed clip's rate and
    /// channel layout. The stream opens paused.
    ///
    /// A new binding is built before the old one is released, so on error the
    /// engine keeps whatever device it had.
    pub fn open_stream(
        &mut self,
        device: DeviceId,
        on_finished: impl FnMut() + 'static,
    ) -> Result<(), EngineError> {
        let Some(clip) = self
            .clips
            .get(self.armed_index)
            .filter(|_| self.clips.has_audio())
        else {
            log::warn!("No clip contains audio, not opening '{device}'");
            return Err(EngineError::NoData);
        };

        let channels =
            u16::try_from(clip.channel_count()).map_err(|_| DeviceError::UnsupportedConfig {
                sample_rate: clip.sample_rate(),
                channels: u16::MAX,
            })?;
        let config = StreamConfig {
            sample_rate: clip.sample_rate(),
            channels,
        };

        let (renderer, events) = Renderer::new(self.clips.clone(), self.shared.clone());
        let stream = self
            .device_manager
            .open_output_stream(&device, config, Box::new(renderer))?;

        self.release_binding();
        self.shared.rewind();
        log::info!(
            "Bound '{device}' at {} Hz, {} channel(s)",
            config.sample_rate,
            config.channels
        );
        self.binding = Some(DeviceBinding {
            stream,
            device,
            events,
            on_finished: Box::new(on_finished),
        });
        self.transport = Transport::Stopped;
        Ok(())
    }

    /// Starts pulling frames. Replays the armed clip from frame 0 unless
    /// already playing. No-op without a bound device.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.poll_events();
        if self.transport == Transport::Playing {
            if !self.is_halted() {
                return Ok(());
            }
            // Ran out after the poll above.
            self.poll_events();
        }

        let Some(binding) = self.binding.as_mut() else {
            log::debug!("Start requested without an open stream");
            return Ok(());
        };

        self.shared.rewind();
        binding.stream.play()?;
        self.transport = Transport::Playing;
        log::debug!("Playback started on '{}'", binding.device);
        Ok(())
    }

    /// Halts delivery and rewinds, so the next [`start`](Self::start) replays
    /// from the beginning. Repeated calls are harmless.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };

        if matches!(self.transport, Transport::Playing | Transport::Finished) {
            binding.stream.pause()?;
            log::debug!("Playback stopped on '{}'", binding.device);
        }
        // Stopped first, so the paused gate is not taken for a finish.
        self.transport = Transport::Stopped;
        self.poll_events();
        self.shared.rewind();
        Ok(())
    }

    /// Sets the output level in decibels. Applies from the next buffer.
    pub fn set_gain(&mut self, decibels: f32) {
        if decibels.is_nan() || decibels == f32::INFINITY {
            log::warn!("Ignoring invalid gain of {decibels} dB");
            return;
        }
        self.shared.set_gain(db_to_linear(decibels));
    }

    /// Applies the next time the armed clip reaches its end.
    pub fn set_loop(&mut self, enabled: bool) {
        self.shared.set_looping(enabled);
    }

    /// Stops delivery and releases the device binding.
    pub fn close(&mut self) {
        if self.binding.is_some() {
            self.release_binding();
            self.transport = Transport::Closed;
        }
    }

    /// Drains notifications from the audio thread. Call regularly from the
    /// control loop; a finished clip moves the transport to
    /// [`Transport::Finished`] and fires the `on_finished` callback here.
    ///
    /// The halted stream is authoritative. Its `Finished` event may have been
    /// dropped on a full ring and still counts as a finish.
    pub fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let Some(binding) = self.binding.as_mut() else {
            return Vec::new();
        };

        // Read before draining: the renderer queues its event before the gate closes.
        let halted = binding.stream.is_halted();
        let mut drained = Vec::new();
        while let Ok(event) = binding.events.pop() {
            match event {
                PlaybackEvent::Finished { clip_index } => {
                    log::debug!("Clip {clip_index} finished");
                    if self.transport == Transport::Playing {
                        self.transport = Transport::Finished;
                    }
                    (binding.on_finished)();
                }
                PlaybackEvent::Looped { clip_index } => {
                    log::trace!("Clip {clip_index} looped");
                }
                PlaybackEvent::Switched { clip_index } => {
                    log::trace!("Renderer switched to clip {clip_index}");
                }
            }
            drained.push(event);
        }

        if halted && self.transport == Transport::Playing {
            log::debug!("Stream on '{}' halted, finish event was dropped", binding.device);
            self.transport = Transport::Finished;
            (binding.on_finished)();
        }
        drained
    }

    /// Installs a freshly normalized clip set. Any open stream is closed
    /// because it renders from the old set.
    pub fn reload(&mut self, clips: ClipSet) {
        self.close();
        self.clips = Arc::new(clips);
        if self.armed_index >= self.clips.len() {
            self.armed_index = 0;
        }
        self.shared
            .arm(u32::try_from(self.armed_index).unwrap_or_default());
        log::info!("Reloaded {} clip(s)", self.clips.len());
    }

    pub fn armed_index(&self) -> usize {
        self.armed_index
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_open(&self) -> bool {
        self.binding.is_some()
    }

    pub fn device(&self) -> Option<&DeviceId> {
        self.binding.as_ref().map(|binding| &binding.device)
    }

    pub fn stream_config(&self) -> Option<StreamConfig> {
        self.binding.as_ref().map(|binding| binding.stream.config())
    }

    /// Current gain in decibels.
    pub fn gain(&self) -> f32 {
        linear_to_db(self.shared.gain())
    }

    pub fn loop_enabled(&self) -> bool {
        self.shared.looping()
    }

    /// Frame offset into the armed clip as last reported by the audio thread.
    pub fn position(&self) -> usize {
        self.shared.position()
    }

    pub fn clips(&self) -> &ClipSet {
        &self.clips
    }

    pub fn device_manager(&self) -> &M {
        &self.device_manager
    }

    fn is_halted(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.stream.is_halted())
    }

    fn release_binding(&mut self) {
        let Some(mut binding) = self.binding.take() else {
            return;
        };

        if matches!(self.transport, Transport::Playing | Transport::Finished) {
            if let Err(e) = binding.stream.pause() {
                log::warn!("Failed to stop '{}' before closing: {e}", binding.device);
            }
        }
        log::info!("Closed '{}'", binding.device);
    }
}

impl<M> fmt::Debug for PlaybackEngine<M>
where
    M: AudioDeviceManager + fmt::Debug,
    M::Stream: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("device_manager", &self.device_manager)
            .field("clips", &self.clips.len())
            .field("armed_index", &self.armed_index)
            .field("binding", &self.binding)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<M: AudioDeviceManager> Drop for PlaybackEngine<M> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        constants::AUDIO_SAMPLE_EPSILON,
        device_manager::null::{NullDeviceManager, NullStreamHandle},
    };
    use clip_store::{Clip, ClipSlot, normalize};

    /// Stereo clips; both channels of frame `f` in clip `c` hold `c * 1000 + f + 1`.
    fn stereo_clips(lengths: &[usize]) -> ClipSet {
        let slots = lengths
            .iter()
            .enumerate()
            .map(|(c, &len)| {
                let samples = (0..len)
                    .flat_map(|f| {
                        let v = (c * 1000 + f + 1) as f32;
                        [v, v]
                    })
                    .collect();
                let clip = Clip::from_interleaved(samples, 2, 44_100).unwrap();
                ClipSlot::present(format!("clip-{c}"), clip)
            })
            .collect();
        normalize(slots)
    }

    fn open_engine(
        lengths: &[usize],
    ) -> (PlaybackEngine<NullDeviceManager>, NullStreamHandle, Rc<Cell<usize>>) {
        let manager = NullDeviceManager::new();
        let mut engine = PlaybackEngine::new(stereo_clips(lengths), manager.clone());
        let finished = Rc::new(Cell::new(0));
        let counter = finished.clone();
        engine
            .open_stream(DeviceId::Default, move || counter.set(counter.get() + 1))
            .unwrap();
        let handle = manager.last_stream().unwrap();
        (engine, handle, finished)
    }

    fn left_channel(buffer: &[f32]) -> Vec<f32> {
        buffer.iter().step_by(2).copied().collect()
    }

    #[test]
    fn test_open_stream_without_audio_fails_with_no_data() {
        let manager = NullDeviceManager::new();
        let clips = normalize(vec![ClipSlot::absent("a"), ClipSlot::absent("b")]);
        let mut engine = PlaybackEngine::new(clips, manager.clone());

        let result = engine.open_stream(DeviceId::Default, || {});

        assert_eq!(result, Err(EngineError::NoData));
        assert!(!engine.is_open());
        assert_eq!(engine.transport(), Transport::Closed);
        assert_eq!(manager.streams_opened(), 0);
    }

    #[test]
    fn test_open_stream_uses_armed_clip_format() {
        let (engine, handle, _) = open_engine(&[4]);

        let expected = StreamConfig {
            sample_rate: 44_100,
            channels: 2,
        };
        assert_eq!(handle.config(), expected);
        assert_eq!(engine.stream_config(), Some(expected));
        assert_eq!(engine.transport(), Transport::Stopped);
        assert!(handle.pull(4).is_none(), "stream must open paused");
    }

    #[test]
    fn test_empty_clip_in_mixed_set_plays_silence() {
        let manager = NullDeviceManager::new();
        let clips = normalize(vec![
            ClipSlot::present("long", Clip::silent(100, 2, 44_100)),
            ClipSlot::present("short", Clip::from_interleaved(vec![0.5; 100], 2, 44_100).unwrap()),
            ClipSlot::present("empty", Clip::silent(0, 2, 44_100)),
        ]);
        let mut engine = PlaybackEngine::new(clips, manager.clone());
        engine.bind(2);
        engine.open_stream(DeviceId::Default, || {}).unwrap();
        engine.start().unwrap();
        let handle = manager.last_stream().unwrap();

        let buffer = handle.pull(100).unwrap();
        assert_eq!(buffer.len(), 200);
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert!(!handle.is_halted());

        handle.pull(1).unwrap();
        assert!(handle.is_halted());
    }

    #[test]
    fn test_end_of_data_without_loop_stops_the_device() {
        let (mut engine, handle, finished) = open_engine(&[3]);
        engine.start().unwrap();

        let buffer = handle.pull(5).unwrap();
        assert_eq!(left_channel(&buffer), vec![1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(handle.is_halted());
        assert_eq!(handle.callbacks(), 1);

        let after = handle.pull(5).unwrap();
        assert!(after.iter().all(|s| *s == 0.0));
        assert_eq!(handle.callbacks(), 1, "no callback may follow a stop");

        let events = engine.poll_events();
        assert_eq!(events, vec![PlaybackEvent::Finished { clip_index: 0 }]);
        assert_eq!(engine.transport(), Transport::Finished);
        assert_eq!(engine.position(), 3);
        assert_eq!(finished.get(), 1);
    }

    #[test]
    fn test_looping_keeps_delivering_whole_clips() {
        let (mut engine, handle, finished) = open_engine(&[4]);
        engine.set_loop(true);
        engine.start().unwrap();

        let mut real_frames = 0;
        for _ in 0..12 {
            let buffer = handle.pull(3).unwrap();
            real_frames += left_channel(&buffer).iter().filter(|s| **s != 0.0).count();
        }

        // 3 + 1 real frames per two buffers, so 6 full wraps.
        assert_eq!(real_frames, 6 * 4);
        assert!(!handle.is_halted());
        engine.poll_events();
        assert_eq!(engine.transport(), Transport::Playing);
        assert_eq!(finished.get(), 0);
    }

    #[test]
    fn test_enabling_loop_mid_clip_applies_at_end_of_data() {
        let (mut engine, handle, _) = open_engine(&[4]);
        engine.start().unwrap();

        handle.pull(2).unwrap();
        engine.set_loop(true);
        let wrap = handle.pull(3).unwrap();
        assert_eq!(left_channel(&wrap), vec![3.0, 4.0, 0.0]);
        let restarted = handle.pull(2).unwrap();
        assert_eq!(left_channel(&restarted), vec![1.0, 2.0]);
    }

    #[test]
    fn test_bind_while_streaming_switches_on_next_buffer() {
        let (mut engine, handle, _) = open_engine(&[8, 8]);
        engine.start().unwrap();

        let first = handle.pull(3).unwrap();
        assert_eq!(left_channel(&first), vec![1.0, 2.0, 3.0]);

        engine.bind(1);
        assert_eq!(engine.armed_index(), 1);
        let second = handle.pull(3).unwrap();
        assert_eq!(left_channel(&second), vec![1001.0, 1002.0, 1003.0]);
    }

    #[test]
    fn test_bind_out_of_range_is_ignored() {
        let (mut engine, handle, _) = open_engine(&[4, 4]);
        engine.start().unwrap();
        handle.pull(1).unwrap();

        engine.bind(7);

        assert_eq!(engine.armed_index(), 0);
        assert_eq!(left_channel(&handle.pull(1).unwrap()), vec![2.0]);
    }

    #[test]
    fn test_stop_rewinds_to_the_start() {
        let (mut engine, handle, _) = open_engine(&[8]);
        engine.start().unwrap();
        handle.pull(5).unwrap();

        engine.stop().unwrap();
        assert_eq!(engine.position(), 0);
        assert!(handle.pull(1).is_none());

        engine.start().unwrap();
        assert_eq!(left_channel(&handle.pull(2).unwrap()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_stop_while_playing_does_not_report_a_finish() {
        let (mut engine, handle, finished) = open_engine(&[8]);
        engine.start().unwrap();
        handle.pull(3).unwrap();

        engine.stop().unwrap();
        engine.poll_events();

        assert_eq!(finished.get(), 0);
        assert_eq!(engine.transport(), Transport::Stopped);
    }

    #[test]
    fn test_repeated_stop_is_harmless() {
        let (mut engine, handle, _) = open_engine(&[8]);
        engine.start().unwrap();
        handle.pull(3).unwrap();

        assert_eq!(engine.stop(), Ok(()));
        assert_eq!(engine.stop(), Ok(()));
        assert_eq!(engine.stop(), Ok(()));
        assert_eq!(engine.position(), 0);
        assert_eq!(engine.transport(), Transport::Stopped);
    }

    #[test]
    fn test_start_while_playing_does_not_rewind() {
        let (mut engine, handle, _) = open_engine(&[8]);
        engine.start().unwrap();
        handle.pull(3).unwrap();

        engine.start().unwrap();
        assert_eq!(left_channel(&handle.pull(1).unwrap()), vec![4.0]);
    }

    #[test]
    fn test_start_after_finish_replays_from_the_beginning() {
        let (mut engine, handle, finished) = open_engine(&[2]);
        engine.start().unwrap();
        handle.pull(4).unwrap();
        assert!(handle.is_halted());

        engine.start().unwrap();
        assert_eq!(finished.get(), 1);
        assert_eq!(engine.transport(), Transport::Playing);
        assert_eq!(left_channel(&handle.pull(2).unwrap()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_start_replays_when_finish_event_was_dropped() {
        let (mut engine, handle, finished) = open_engine(&[4]);
        engine.set_loop(true);
        engine.start().unwrap();

        // Every second pull wraps, far more Looped events than the ring holds.
        for _ in 0..200 {
            handle.pull(3).unwrap();
        }
        engine.set_loop(false);
        while !handle.is_halted() {
            handle.pull(3).unwrap();
        }
        let callbacks = handle.callbacks();

        engine.start().unwrap();

        assert_eq!(finished.get(), 1);
        assert_eq!(engine.transport(), Transport::Playing);
        assert_eq!(left_channel(&handle.pull(3).unwrap()), vec![1.0, 2.0, 3.0]);
        assert_eq!(handle.callbacks(), callbacks + 1);
    }

    #[test]
    fn test_halted_stream_reports_finished_without_its_event() {
        let (mut engine, handle, finished) = open_engine(&[4]);
        engine.set_loop(true);
        engine.start().unwrap();
        for _ in 0..200 {
            handle.pull(3).unwrap();
        }
        engine.set_loop(false);
        while !handle.is_halted() {
            handle.pull(3).unwrap();
        }

        let events = engine.poll_events();

        assert!(!events.contains(&PlaybackEvent::Finished { clip_index: 0 }));
        assert_eq!(engine.transport(), Transport::Finished);
        assert_eq!(finished.get(), 1);
        engine.poll_events();
        assert_eq!(finished.get(), 1);
    }

    #[test]
    fn test_stop_after_finish_allows_a_clean_restart() {
        let (mut engine, handle, _) = open_engine(&[2]);
        engine.start().unwrap();
        handle.pull(4).unwrap();

        engine.stop().unwrap();
        assert_eq!(engine.transport(), Transport::Stopped);
        engine.start().unwrap();
        assert_eq!(left_channel(&handle.pull(2).unwrap()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_start_and_stop_without_stream_are_no_ops() {
        let mut engine = PlaybackEngine::new(stereo_clips(&[4]), NullDeviceManager::new());
        assert_eq!(engine.start(), Ok(()));
        assert_eq!(engine.stop(), Ok(()));
        assert_eq!(engine.transport(), Transport::Closed);
    }

    #[test]
    fn test_set_gain_scales_output_from_decibels() {
        let (mut engine, handle, _) = open_engine(&[4]);
        engine.set_gain(-20.0);
        engine.start().unwrap();

        let buffer = handle.pull(4).unwrap();
        for (frame, sample) in left_channel(&buffer).iter().enumerate() {
            let expected = 0.1 * (frame + 1) as f32;
            assert!((sample - expected).abs() < AUDIO_SAMPLE_EPSILON);
        }
        assert!((engine.gain() + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_gain_is_ignored() {
        let (mut engine, _, _) = open_engine(&[4]);
        engine.set_gain(-6.0);
        let before = engine.gain();

        engine.set_gain(f32::NAN);
        engine.set_gain(f32::INFINITY);

        assert_eq!(engine.gain(), before);
    }

    #[test]
    fn test_failed_open_keeps_the_previous_binding() {
        let manager = NullDeviceManager::new().with_devices(["Speakers"]);
        let mut engine = PlaybackEngine::new(stereo_clips(&[8]), manager.clone());
        engine
            .open_stream(DeviceId::Named("speakers".to_owned()), || {})
            .unwrap();
        engine.start().unwrap();
        let handle = manager.last_stream().unwrap();

        let result = engine.open_stream(DeviceId::Named("headphones".to_owned()), || {});

        assert_eq!(
            result,
            Err(EngineError::Device(DeviceError::DeviceNotFound(
                "headphones".to_owned()
            )))
        );
        assert_eq!(manager.streams_opened(), 1);
        assert_eq!(engine.transport(), Transport::Playing);
        assert_eq!(
            engine.device(),
            Some(&DeviceId::Named("speakers".to_owned()))
        );
        assert!(handle.pull(1).is_some());
    }

    #[test]
    fn test_failed_reopen_leaves_the_playing_stream_running() {
        let (mut engine, handle, _) = open_engine(&[8]);
        engine.start().unwrap();
        engine
            .device_manager()
            .fail_next_open(DeviceError::StreamBuildFailed("device busy".to_owned()));

        let result = engine.open_stream(DeviceId::Named("usb".to_owned()), || {});

        assert!(matches!(
            result,
            Err(EngineError::Device(DeviceError::StreamBuildFailed(_)))
        ));
        assert_eq!(engine.device_manager().streams_opened(), 1);
        assert_eq!(engine.device(), Some(&DeviceId::Default));
        assert_eq!(engine.transport(), Transport::Playing);
        assert!(handle.is_playing());
        assert_eq!(left_channel(&handle.pull(2).unwrap()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_unsupported_format_is_reported_as_device_error() {
        let manager = NullDeviceManager::new().with_supported_configs([StreamConfig {
            sample_rate: 48_000,
            channels: 2,
        }]);
        let mut engine = PlaybackEngine::new(stereo_clips(&[8]), manager);

        let result = engine.open_stream(DeviceId::Default, || {});

        assert_eq!(
            result,
            Err(EngineError::Device(DeviceError::UnsupportedConfig {
                sample_rate: 44_100,
                channels: 2,
            }))
        );
        assert!(!engine.is_open());
    }

    #[test]
    fn test_reopening_releases_the_old_stream() {
        let manager = NullDeviceManager::new();
        let mut engine = PlaybackEngine::new(stereo_clips(&[8]), manager.clone());
        engine.open_stream(DeviceId::Default, || {}).unwrap();
        let old = manager.last_stream().unwrap();
        engine.start().unwrap();

        engine
            .open_stream(DeviceId::Named("usb".to_owned()), || {})
            .unwrap();

        assert!(old.is_closed());
        assert_eq!(manager.streams_opened(), 2);
        assert_eq!(engine.transport(), Transport::Stopped);
    }

    #[test]
    fn test_failed_play_leaves_transport_stopped() {
        let manager = NullDeviceManager::new();
        let mut engine = PlaybackEngine::new(stereo_clips(&[8]), manager.clone());
        engine.open_stream(DeviceId::Default, || {}).unwrap();
        manager.fail_next_play(DeviceError::StreamStartFailed("busy".to_owned()));

        let result = engine.start();

        assert!(matches!(
            result,
            Err(EngineError::Device(DeviceError::StreamStartFailed(_)))
        ));
        assert_eq!(engine.transport(), Transport::Stopped);
        assert_eq!(engine.start(), Ok(()));
        assert_eq!(engine.transport(), Transport::Playing);
    }

    #[test]
    fn test_close_releases_the_device() {
        let (mut engine, handle, _) = open_engine(&[8]);
        engine.start().unwrap();

        engine.close();

        assert!(handle.is_closed());
        assert!(!engine.is_open());
        assert_eq!(engine.transport(), Transport::Closed);
        assert_eq!(engine.start(), Ok(()));
        assert_eq!(engine.transport(), Transport::Closed);
    }

    #[test]
    fn test_dropping_the_engine_closes_the_stream() {
        let (engine, handle, _) = open_engine(&[8]);
        drop(engine);
        assert!(handle.is_closed());
    }

    #[test]
    fn test_reload_closes_stream_and_clamps_armed_index() {
        let (mut engine, handle, _) = open_engine(&[4, 4, 4]);
        engine.bind(2);

        engine.reload(stereo_clips(&[6]));

        assert!(handle.is_closed());
        assert_eq!(engine.transport(), Transport::Closed);
        assert_eq!(engine.armed_index(), 0);
        assert_eq!(engine.clips().frame_count(), 6);
    }
}
