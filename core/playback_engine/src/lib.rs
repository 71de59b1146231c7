pub mod constants;
pub mod device_manager;
pub mod engine;
pub mod error;
pub mod gain;
pub mod render;
pub mod state;

pub use engine::{PlaybackEngine, Transport};
pub use error::{DeviceError, EngineError};
