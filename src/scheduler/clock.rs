use std::thread;
use std::time::{Duration, Instant};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const MIN_FRAME_RATE: u32 = 30;
pub const MAX_FRAME_RATE: u32 = 240;

/// Periodic tick source standing in for a display frame callback.
/// Timestamps are monotonic nanoseconds.
pub trait FrameSource {
    fn now(&self) -> i64;

    /// Ask for frames to be delivered
    fn register(&mut self);

    /// Stop frame delivery. Safe when not registered.
    fn deregister(&mut self);

    fn is_registered(&self) -> bool;
}

/// Real-time frame source: sleeps to each frame boundary on the calling thread
pub struct FrameTicker {
    origin: Instant,
    period: Duration,
    next_frame: Instant,
    registered: bool,
}

impl FrameTicker {
    pub fn new(frame_rate_hz: u32) -> Self {
        let hz = frame_rate_hz.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        let origin = Instant::now();
        Self {
            origin,
            period: Duration::from_nanos(NANOS_PER_SECOND as u64 / hz as u64),
            next_frame: origin,
            registered: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Block until the next frame boundary and return its timestamp.
    /// Frames missed while the thread was busy are skipped, not replayed.
    pub fn wait_frame(&mut self) -> i64 {
        let now = Instant::now();
        if self.next_frame > now {
            thread::sleep(self.next_frame - now);
        }
        let fired = Instant::now();
        while self.next_frame <= fired {
            self.next_frame += self.period;
        }
        self.now()
    }
}

impl FrameSource for FrameTicker {
    fn now(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }

    fn register(&mut self) {
        if !self.registered {
            self.registered = true;
            self.next_frame = Instant::now() + self.period;
        }
    }

    fn deregister(&mut self) {
        self.registered = false;
    }

    fn is_registered(&self) -> bool {
        self.registered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic frame source: nominal period plus bounded LCG jitter
    pub struct SimulatedFrames {
        now: i64,
        period: i64,
        jitter: i64,
        noise_state: u32,
        registered: bool,
        pub registrations: usize,
    }

    impl SimulatedFrames {
        pub fn new(period: i64, jitter: i64) -> Self {
            Self {
                now: 0,
                period,
                jitter,
                noise_state: 12345,
                registered: false,
                registrations: 0,
            }
        }

        fn next_noise(&mut self) -> f64 {
            self.noise_state = self.noise_state.wrapping_mul(1103515245).wrapping_add(12345);
            (self.noise_state as f64 / u32::MAX as f64) * 2.0 - 1.0
        }

        /// Advance to the next frame and return its timestamp
        pub fn next_frame(&mut self) -> i64 {
            let offset = (self.next_noise() * self.jitter as f64) as i64;
            self.now += self.period + offset;
            self.now
        }

        /// Jump the clock to an absolute timestamp
        pub fn set_now(&mut self, now: i64) {
            self.now = now;
        }
    }

    impl FrameSource for SimulatedFrames {
        fn now(&self) -> i64 {
            self.now
        }

        fn register(&mut self) {
            self.registered = true;
            self.registrations += 1;
        }

        fn deregister(&mut self) {
            self.registered = false;
        }

        fn is_registered(&self) -> bool {
            self.registered
        }
    }

    #[test]
    fn simulated_jitter_stays_bounded() {
        let mut frames = SimulatedFrames::new(16_000_000, 5_000_000);
        let mut previous = frames.now();
        for _ in 0..1000 {
            let now = frames.next_frame();
            let delta = now - previous;
            assert!((11_000_000..=21_000_000).contains(&delta), "delta {}", delta);
            previous = now;
        }
    }

    #[test]
    fn ticker_clamps_frame_rate() {
        assert_eq!(FrameTicker::new(1).period(), Duration::from_nanos(33_333_333));
        assert_eq!(FrameTicker::new(1000).period(), Duration::from_nanos(4_166_666));
    }

    #[test]
    fn ticker_delivers_increasing_timestamps() {
        let mut ticker = FrameTicker::new(240);
        let started = Instant::now();
        ticker.register();
        let mut previous = ticker.wait_frame();
        for _ in 0..4 {
            let now = ticker.wait_frame();
            assert!(now > previous);
            previous = now;
        }
        assert!(started.elapsed() >= ticker.period() * 4, "frames should be paced");
    }

    #[test]
    fn ticker_registration_flag() {
        let mut ticker = FrameTicker::new(60);
        assert!(!ticker.is_registered());
        ticker.register();
        assert!(ticker.is_registered());
        ticker.deregister();
        ticker.deregister();
        assert!(!ticker.is_registered());
    }
}
