pub mod beat;
pub mod clock;
pub mod state;

pub use beat::{BeatScheduler, DriftCorrection};
pub use clock::{FrameSource, FrameTicker};
pub use state::{clamp_rate, MetronomeState, Side, StateHandle, DEFAULT_RATE, DEFAULT_VOLUME};
