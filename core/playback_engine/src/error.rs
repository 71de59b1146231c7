use thiserror::Error;

/// Failures of the output device layer. The engine stays in its last good
/// state whenever one of these is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    #[error("device does not support {channels} channel(s) at {sample_rate} Hz")]
    UnsupportedConfig { sample_rate: u32, channels: u16 },

    #[error("failed to enumerate output devices: {0}")]
    Enumeration(String),

    #[error("failed to build output stream: {0}")]
    StreamBuildFailed(String),

    #[error("failed to start output stream: {0}")]
    StreamStartFailed(String),

    #[error("failed to stop output stream: {0}")]
    StreamStopFailed(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Every clip in the set is zero frames long.
    #[error("no clip contains audio; playback is unavailable")]
    NoData,

    #[error(transparent)]
    Device(#[from] DeviceError),
}
