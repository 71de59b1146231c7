use std::{
    io::{self, BufRead, Write},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use clip_store::{normalize, wav::load_all};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use playback_engine::{
    device_manager::{DeviceId, cpal_dm::CpalAudioDeviceManager},
    engine::{PlaybackEngine, Transport},
    error::EngineError,
};

mod cli;

use cli::{Args, Command, HELP};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let manager = CpalAudioDeviceManager::new();

    if args.list_devices {
        let mut out = io::stdout().lock();
        for (i, device) in manager.list_output_devices()?.iter().enumerate() {
            let marker = if device.is_default { " (default)" } else { "" };
            writeln!(
                out,
                "#{i}: {}{marker} [{} ch @ {} Hz]",
                device.name,
                device.default_channels.unwrap_or_default(),
                device.default_sample_rate.unwrap_or_default()
            )?;
        }
        return Ok(());
    }

    let clips = normalize(load_all(&args.clips));
    let mut engine = PlaybackEngine::new(clips, manager);
    engine.set_gain(args.gain_db);
    engine.set_loop(args.looping);

    let device = DeviceId::from(args.device);
    match engine.open_stream(device, on_finished) {
        Ok(()) => {}
        Err(EngineError::NoData) => {
            log::error!("None of the clips could be loaded, playback is disabled");
        }
        Err(e) => log::error!("Failed to open output: {e}"),
    }

    print_clips(&engine)?;
    writeln!(io::stdout(), "{HELP}")?;

    let lines = spawn_stdin_reader();
    loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = apply(&mut engine, command) {
                        log::error!("{e:#}");
                    }
                }
                Err(e) if line.trim().is_empty() => log::trace!("{e}"),
                Err(e) => log::warn!("{e}, type 'help' for a list"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        engine.poll_events();
    }

    log::info!("Bye");
    engine.close();
    Ok(())
}

fn on_finished() {
    log::info!("Clip finished");
}

fn apply(engine: &mut PlaybackEngine<CpalAudioDeviceManager>, command: Command) -> Result<()> {
    match command {
        Command::Arm(index) => {
            engine.bind(index);
            print_clips(engine)?;
        }
        Command::Play => engine.start().context("failed to start playback")?,
        Command::Stop => engine.stop().context("failed to stop playback")?,
        Command::Gain(db) => engine.set_gain(db),
        Command::Loop(enabled) => engine.set_loop(enabled),
        Command::Device(name) => {
            let was_playing = engine.transport() == Transport::Playing;
            engine
                .open_stream(DeviceId::from(name), on_finished)
                .context("failed to open output")?;
            if was_playing {
                engine.start().context("failed to resume playback")?;
            }
        }
        Command::List => print_clips(engine)?,
        Command::Status => print_status(engine)?,
        Command::Help => writeln!(io::stdout(), "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}

fn print_clips(engine: &PlaybackEngine<CpalAudioDeviceManager>) -> io::Result<()> {
    let clips = engine.clips();
    let mut out = io::stdout().lock();
    for index in 0..clips.len() {
        let marker = if index == engine.armed_index() { '*' } else { ' ' };
        let Some(clip) = clips.get(index) else {
            continue;
        };
        writeln!(
            out,
            "{marker} [{index}] {} {:.1}s{}",
            clips.label(index).unwrap_or_default(),
            clip.duration().as_secs_f32(),
            if clip.is_silent() { " (silent)" } else { "" }
        )?;
    }
    Ok(())
}

fn print_status(engine: &PlaybackEngine<CpalAudioDeviceManager>) -> io::Result<()> {
    let device = engine
        .device()
        .map_or_else(|| "none".to_owned(), ToString::to_string);
    writeln!(
        io::stdout(),
        "{:?} on {device}, clip {} at frame {}/{}, gain {:.1} dB, loop {}",
        engine.transport(),
        engine.armed_index(),
        engine.position(),
        engine.clips().frame_count(),
        engine.gain(),
        if engine.loop_enabled() { "on" } else { "off" }
    )
}

/// Stdin blocks, so lines are read on their own thread and the main loop
/// stays free to poll playback events.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
