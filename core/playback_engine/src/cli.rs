//! Command-line and terminal control surface.
//!
//! `Args` is the `clap` configuration read once at startup; `Command` is one
//! line typed at the prompt. Neither knows anything about audio.

use std::{path::PathBuf, str::FromStr};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "soundboard", about = "Play pre-loaded clips through an audio output")]
pub struct Args {
    /// WAV files to load, one soundboard button each
    #[arg(required_unless_present = "list_devices")]
    pub clips: Vec<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Initial output level in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub gain_db: f32,

    /// Loop the armed clip instead of stopping at its end
    #[arg(long = "loop")]
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Arm(usize),
    Play,
    Stop,
    Gain(f32),
    Loop(bool),
    /// `None` selects the default output.
    Device(Option<String>),
    List,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_owned());
        };
        let arg = words.next();

        if let Ok(index) = verb.parse::<usize>() {
            return Ok(Self::Arm(index));
        }

        match (verb.to_lowercase().as_str(), arg) {
            ("arm", Some(index)) => index
                .parse()
                .map(Self::Arm)
                .map_err(|_| format!("not a clip number: {index}")),
            ("play" | "start", None) => Ok(Self::Play),
            ("stop", None) => Ok(Self::Stop),
            ("gain", Some(db)) => db
                .parse()
                .map(Self::Gain)
                .map_err(|_| format!("not a level in dB: {db}")),
            ("loop", Some("on")) => Ok(Self::Loop(true)),
            ("loop", Some("off")) => Ok(Self::Loop(false)),
            ("device", None | Some("default")) => Ok(Self::Device(None)),
            ("device", Some(_)) => {
                let name = line.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
                Ok(Self::Device(Some(name)))
            }
            ("list" | "ls", None) => Ok(Self::List),
            ("status", None) => Ok(Self::Status),
            ("help" | "?", None) => Ok(Self::Help),
            ("quit" | "exit" | "q", None) => Ok(Self::Quit),
            _ => Err(format!("unknown command: {}", line.trim())),
        }
    }
}

pub const HELP: &str = "\
commands:
  <n> | arm <n>       arm clip n (restarts it from the beginning)
  play | stop         start playback / stop and rewind
  gain <db>           set output level in decibels
  loop on|off         loop the armed clip
  device [name]       reopen on another output (default if omitted)
  list | status       show clips / engine state
  quit";
