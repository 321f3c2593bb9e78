pub mod engine;
pub mod playback;

pub use engine::MetronomeEngine;
pub use playback::{AudioOutput, PlaybackConfig, PlaybackResource};
