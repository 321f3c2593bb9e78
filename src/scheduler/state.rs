use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub const MIN_RATE: i32 = 40;
pub const MAX_RATE: i32 = 240;
pub const DEFAULT_RATE: i32 = 170;
pub const DEFAULT_VOLUME: i32 = 80;

pub fn clamp_rate(rate: i32) -> i32 {
    rate.clamp(MIN_RATE, MAX_RATE)
}

/// Which foot the most recent beat belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[default]
    A,
    B,
}

impl Side {
    pub fn flipped(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Side of the `n`th fired beat, counting the first beat as 0
    pub fn of_beat(n: u64) -> Self {
        if n % 2 == 0 {
            Side::A
        } else {
            Side::B
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::A => "L",
            Side::B => "R",
        }
    }
}

/// Snapshot published to the presentation layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetronomeState {
    pub is_running: bool,
    pub target_rate: i32,
    pub current_side: Side,
    pub beat_count: u64,
    /// Frame-clock nanoseconds at which the current run started
    pub start_timestamp: Option<i64>,
    /// Beats per minute actually delivered, 0 until first measured
    pub measured_rate: f64,
    pub volume: i32,
    pub audio_ready: bool,
}

impl MetronomeState {
    pub fn new(target_rate: i32, volume: i32) -> Self {
        Self {
            is_running: false,
            target_rate: clamp_rate(target_rate),
            current_side: Side::A,
            beat_count: 0,
            start_timestamp: None,
            measured_rate: 0.0,
            volume,
            audio_ready: false,
        }
    }
}

impl Default for MetronomeState {
    fn default() -> Self {
        Self::new(DEFAULT_RATE, DEFAULT_VOLUME)
    }
}

struct Published {
    revision: u64,
    state: MetronomeState,
}

/// Single-writer cell holding the latest snapshot.
/// Every publish replaces the whole state; readers always clone a
/// consistent copy.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<Published>>,
}

impl StateHandle {
    pub fn new(initial: MetronomeState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Published {
                revision: 0,
                state: initial,
            })),
        }
    }

    pub fn publish(&self, state: MetronomeState) {
        let mut published = self.inner.write();
        published.revision += 1;
        published.state = state;
    }

    pub fn snapshot(&self) -> MetronomeState {
        self.inner.read().state.clone()
    }

    /// Number of publishes so far
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }
}
