pub mod clip;
pub mod error;
pub mod normalize;
pub mod slot;
pub mod wav;

pub use clip::Clip;
pub use error::LoadError;
pub use normalize::{ClipSet, ConfigMismatchWarning, DEFAULT_SAMPLE_RATE, normalize};
pub use slot::ClipSlot;
