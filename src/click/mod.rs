pub mod generator;
pub mod waveform;

pub use generator::{ClickGenerator, ClickSink, MAX_VOLUME, MIN_VOLUME};
pub use waveform::{ClickWaveform, WaveformSpec};
