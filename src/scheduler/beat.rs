use serde::{Deserialize, Serialize};

use super::clock::{FrameSource, NANOS_PER_SECOND};
use super::state::{clamp_rate, MetronomeState, Side, StateHandle};
use crate::click::{ClickSink, MAX_VOLUME, MIN_VOLUME};

const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;

/// A beat later than this many intervals means the loop was stalled; the
/// schedule restarts from the late beat instead of trying to catch up.
const STALL_INTERVALS: i64 = 4;

/// Tuning of the damped drift corrector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftCorrection {
    /// Each beat folds 1/n of the accumulated error into the next interval
    pub correction_divisor: i64,
    /// Accumulated error is multiplied by numerator/denominator after each beat
    pub decay_numerator: i64,
    pub decay_denominator: i64,
    /// Beats between measured-rate updates
    pub measure_every: u64,
}

impl Default for DriftCorrection {
    fn default() -> Self {
        Self {
            correction_divisor: 8,
            decay_numerator: 7,
            decay_denominator: 8,
            measure_every: 10,
        }
    }
}

impl DriftCorrection {
    /// Replace out-of-range values with something that cannot divide by
    /// zero or amplify the error
    pub fn sanitized(self) -> Self {
        let decay_denominator = self.decay_denominator.max(1);
        Self {
            correction_divisor: self.correction_divisor.max(1),
            decay_numerator: self.decay_numerator.clamp(0, decay_denominator),
            decay_denominator,
            measure_every: self.measure_every.max(1),
        }
    }
}

/// Bookkeeping for one start..stop run
#[derive(Debug)]
struct Run {
    start: i64,
    next_deadline: i64,
    last_beat: i64,
    interval: i64,
    accumulated_error: i64,
    beats: u64,
}

/// Beats per minute over `elapsed` nanoseconds; 0 when no time has passed
pub fn measured_rate(beats: u64, elapsed: i64) -> f64 {
    if elapsed <= 0 {
        return 0.0;
    }
    beats as f64 * NANOS_PER_MINUTE as f64 / elapsed as f64
}

pub fn interval_for_rate(rate: i32) -> i64 {
    NANOS_PER_MINUTE / clamp_rate(rate) as i64
}

/// Drives a click sink at a target rate from coarse frame ticks, folding
/// frame lateness back into the schedule so the long-run rate holds.
pub struct BeatScheduler<C: ClickSink, F: FrameSource> {
    click: C,
    frames: F,
    handle: StateHandle,
    /// Last emitted snapshot
    state: MetronomeState,
    correction: DriftCorrection,
    run: Option<Run>,
}

impl<C: ClickSink, F: FrameSource> BeatScheduler<C, F> {
    pub fn new(click: C, frames: F, handle: StateHandle, correction: DriftCorrection) -> Self {
        let state = handle.snapshot();
        Self {
            click,
            frames,
            handle,
            state,
            correction: correction.sanitized(),
            run: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn state(&self) -> &MetronomeState {
        &self.state
    }

    pub fn interval_nanos(&self) -> Option<i64> {
        self.run.as_ref().map(|r| r.interval)
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.run.as_ref().map(|r| r.next_deadline)
    }

    pub fn click(&self) -> &C {
        &self.click
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    /// Begin clicking at `rate` (clamped). A running metronome is stopped
    /// first. Does nothing at all if the click sink is not ready.
    pub fn start(&mut self, rate: i32) {
        if !self.click.is_ready() {
            log::warn!("Start ignored: audio is not ready");
            return;
        }
        if self.run.is_some() {
            self.stop();
        }

        let rate = clamp_rate(rate);
        let interval = interval_for_rate(rate);
        let now = self.frames.now();

        // First beat lands immediately rather than one interval in
        self.click.trigger_click();
        self.run = Some(Run {
            start: now,
            next_deadline: now + interval,
            last_beat: now,
            interval,
            accumulated_error: 0,
            beats: 1,
        });

        self.emit(MetronomeState {
            is_running: true,
            target_rate: rate,
            current_side: Side::A,
            beat_count: 1,
            start_timestamp: Some(now),
            measured_rate: 0.0,
            ..self.state.clone()
        });
        self.frames.register();

        log::info!("Metronome started at {} bpm ({} ns interval)", rate, interval);
    }

    /// Per-frame deadline check. `now` is the frame timestamp.
    pub fn on_frame(&mut self, now: i64) {
        let correction = &self.correction;
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if now < run.next_deadline {
            return;
        }

        let actual_interval = now - run.last_beat;
        if actual_interval > run.interval * STALL_INTERVALS {
            log::debug!(
                "Frame loop stalled for {} ms, resyncing",
                actual_interval / 1_000_000
            );
            run.accumulated_error = 0;
            run.next_deadline = now + run.interval;
        } else {
            let error = actual_interval - run.interval;
            run.accumulated_error += error;
            run.next_deadline +=
                run.interval - run.accumulated_error / correction.correction_divisor;
            run.accumulated_error =
                run.accumulated_error * correction.decay_numerator / correction.decay_denominator;
        }
        run.last_beat = now;
        run.beats += 1;

        let beats = run.beats;
        let measured = (beats % correction.measure_every == 0)
            .then(|| measured_rate(beats, now - run.start));

        self.click.trigger_click();

        let mut next = self.state.clone();
        next.current_side = next.current_side.flipped();
        next.beat_count = beats;
        if let Some(rate) = measured {
            next.measured_rate = rate;
        }
        self.emit(next);
    }

    /// Stop clicking and publish the final measured rate. No-op when idle.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        self.frames.deregister();

        let now = self.frames.now();
        let final_rate = measured_rate(run.beats, now - run.start);
        let mut next = self.state.clone();
        next.is_running = false;
        next.measured_rate = final_rate;
        self.emit(next);

        log::info!(
            "Metronome stopped after {} beats ({:.2} bpm measured)",
            run.beats,
            final_rate
        );
    }

    /// Change the target rate; a running metronome restarts at the new rate
    pub fn set_target_rate(&mut self, rate: i32) {
        let rate = clamp_rate(rate);
        if self.run.is_some() && self.click.is_ready() {
            self.start(rate);
            return;
        }
        self.stop();
        if self.state.target_rate != rate {
            let mut next = self.state.clone();
            next.target_rate = rate;
            self.emit(next);
        }
    }

    pub fn set_volume(&mut self, volume: i32) {
        let volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self.click.set_volume(volume);
        if self.state.volume != volume {
            let mut next = self.state.clone();
            next.volume = volume;
            self.emit(next);
        }
    }

    /// Re-run click initialization, stopping first if running
    pub fn reinitialize_audio(&mut self) {
        self.stop();
        self.click.initialize();
        self.publish_readiness();
    }

    /// Emit a snapshot if the click sink readiness changed since the last one
    pub fn publish_readiness(&mut self) {
        let ready = self.click.is_ready();
        if self.state.audio_ready != ready {
            let mut next = self.state.clone();
            next.audio_ready = ready;
            self.emit(next);
        }
    }

    /// Stop, deregister and release the click sink
    pub fn dispose(&mut self) {
        self.stop();
        self.frames.deregister();
        self.click.cleanup();
        self.publish_readiness();
    }

    fn emit(&mut self, state: MetronomeState) {
        self.state = state.clone();
        self.handle.publish(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::clock::tests::SimulatedFrames;

    const FRAME: i64 = 16_000_000;
    const JITTER: i64 = 5_000_000;

    #[derive(Default)]
    struct CountingClick {
        ready: bool,
        clicks: u64,
        volume: i32,
        initializations: usize,
        cleanups: usize,
    }

    impl ClickSink for CountingClick {
        fn initialize(&mut self) {
            self.initializations += 1;
            self.ready = true;
        }

        fn cleanup(&mut self) {
            self.cleanups += 1;
            self.ready = false;
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn trigger_click(&mut self) {
            if self.ready {
                self.clicks += 1;
            }
        }

        fn set_volume(&mut self, volume: i32) {
            self.volume = volume.clamp(0, 100);
        }
    }

    type TestScheduler = BeatScheduler<CountingClick, SimulatedFrames>;

    fn scheduler_with(ready: bool, jitter: i64) -> (TestScheduler, StateHandle) {
        let handle = StateHandle::new(MetronomeState::default());
        let click = CountingClick {
            ready,
            ..CountingClick::default()
        };
        let frames = SimulatedFrames::new(FRAME, jitter);
        let scheduler = BeatScheduler::new(click, frames, handle.clone(), DriftCorrection::default());
        (scheduler, handle)
    }

    fn scheduler() -> (TestScheduler, StateHandle) {
        scheduler_with(true, JITTER)
    }

    /// Run frames until `until` nanoseconds, returning every snapshot emitted
    fn run_until(scheduler: &mut TestScheduler, handle: &StateHandle, until: i64) -> Vec<MetronomeState> {
        let mut seen = Vec::new();
        let mut revision = handle.revision();
        loop {
            let now = scheduler.frames_mut().next_frame();
            if now > until {
                break;
            }
            scheduler.on_frame(now);
            if handle.revision() != revision {
                revision = handle.revision();
                seen.push(handle.snapshot());
            }
        }
        seen
    }

    #[test]
    fn start_fires_first_beat_immediately() {
        let (mut scheduler, handle) = scheduler();

        scheduler.start(180);

        let state = handle.snapshot();
        assert!(state.is_running);
        assert_eq!(state.target_rate, 180);
        assert_eq!(state.beat_count, 1);
        assert_eq!(state.current_side, Side::A);
        assert_eq!(state.measured_rate, 0.0);
        assert_eq!(state.start_timestamp, Some(0));
        assert_eq!(handle.revision(), 1);
        assert_eq!(scheduler.click().clicks, 1);
        assert!(scheduler.frames().is_registered());
        assert_eq!(scheduler.next_deadline(), Some(333_333_333));
    }

    #[test]
    fn start_clamps_rate() {
        let (mut scheduler, handle) = scheduler();

        scheduler.start(10);
        assert_eq!(handle.snapshot().target_rate, 40);
        assert_eq!(scheduler.interval_nanos(), Some(1_500_000_000));

        scheduler.start(1000);
        assert_eq!(handle.snapshot().target_rate, 240);
        assert_eq!(scheduler.interval_nanos(), Some(250_000_000));
    }

    #[test]
    fn frames_before_deadline_do_nothing() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(120);
        let revision = handle.revision();

        scheduler.on_frame(499_999_999);

        assert_eq!(handle.revision(), revision);
        assert_eq!(scheduler.click().clicks, 1);
    }

    #[test]
    fn beat_count_and_side_advance_once_per_beat() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(200);

        let seen = run_until(&mut scheduler, &handle, 10 * NANOS_PER_SECOND);

        assert!(seen.len() > 30);
        let mut expected = 1;
        for state in &seen {
            expected += 1;
            assert_eq!(state.beat_count, expected);
            assert_eq!(state.current_side, Side::of_beat(state.beat_count - 1));
            assert!(state.is_running);
        }
        assert_eq!(scheduler.click().clicks, expected);
    }

    #[test]
    fn measured_rate_waits_for_first_window() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(180);

        let seen = run_until(&mut scheduler, &handle, 5 * NANOS_PER_SECOND);

        for state in &seen {
            if state.beat_count < 10 {
                assert_eq!(state.measured_rate, 0.0);
            }
        }
        let tenth = seen.iter().find(|s| s.beat_count == 10).unwrap();
        assert!(tenth.measured_rate > 0.0);
        let eleventh = seen.iter().find(|s| s.beat_count == 11).unwrap();
        assert_eq!(eleventh.measured_rate, tenth.measured_rate);
    }

    #[test]
    fn converges_to_target_rate_under_jitter() {
        for rate in [120, 180, 240] {
            let (mut scheduler, handle) = scheduler();
            scheduler.start(rate);

            run_until(&mut scheduler, &handle, 60 * NANOS_PER_SECOND);
            scheduler.frames_mut().set_now(60 * NANOS_PER_SECOND);
            scheduler.stop();

            let measured = handle.snapshot().measured_rate;
            approx::assert_relative_eq!(measured, rate as f64, max_relative = 0.02);
        }
    }

    #[test]
    fn aligned_frames_keep_exact_intervals() {
        // 500 ms interval on a 10 ms grid never accrues error
        let handle = StateHandle::new(MetronomeState::default());
        let click = CountingClick {
            ready: true,
            ..CountingClick::default()
        };
        let frames = SimulatedFrames::new(10_000_000, 0);
        let mut scheduler = BeatScheduler::new(click, frames, handle.clone(), DriftCorrection::default());
        scheduler.start(120);

        let mut beat_times = vec![0];
        let mut revision = handle.revision();
        for _ in 0..500 {
            let now = scheduler.frames_mut().next_frame();
            scheduler.on_frame(now);
            if handle.revision() != revision {
                revision = handle.revision();
                beat_times.push(now);
            }
        }

        assert_eq!(beat_times.len(), 11);
        for pair in beat_times.windows(2) {
            assert_eq!(pair[1] - pair[0], 500_000_000);
        }
    }

    #[test]
    fn lateness_pulls_next_deadline_earlier() {
        let (mut scheduler, _handle) = scheduler();
        scheduler.start(120);

        // 8 ms late: error 8 ms, next deadline 1 ms early, 7 ms carried
        scheduler.on_frame(508_000_000);

        assert_eq!(scheduler.next_deadline(), Some(999_000_000));
        let run = scheduler.run.as_ref().unwrap();
        assert_eq!(run.accumulated_error, 7_000_000);
    }

    #[test]
    fn stall_resyncs_instead_of_bursting() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(120);

        scheduler.on_frame(5 * NANOS_PER_SECOND);
        assert_eq!(handle.snapshot().beat_count, 2);
        assert_eq!(scheduler.next_deadline(), Some(5_500_000_000));

        let revision = handle.revision();
        scheduler.on_frame(5 * NANOS_PER_SECOND + FRAME);
        assert_eq!(handle.revision(), revision);
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(180);
        run_until(&mut scheduler, &handle, 3 * NANOS_PER_SECOND);

        scheduler.stop();
        let once = handle.snapshot();
        let revision = handle.revision();
        scheduler.stop();

        assert_eq!(handle.snapshot(), once);
        assert_eq!(handle.revision(), revision);
        assert!(!once.is_running);
        assert!(once.measured_rate > 0.0);
        assert!(!scheduler.frames().is_registered());
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let (mut scheduler, handle) = scheduler();
        scheduler.stop();
        assert_eq!(handle.revision(), 0);
    }

    #[test]
    fn no_clicks_after_stop() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(240);
        scheduler.stop();
        let revision = handle.revision();

        scheduler.on_frame(10 * NANOS_PER_SECOND);

        assert_eq!(handle.revision(), revision);
        assert_eq!(scheduler.click().clicks, 1);
    }

    #[test]
    fn refuses_to_start_when_not_ready() {
        let (mut scheduler, handle) = scheduler_with(false, JITTER);

        scheduler.start(180);

        assert!(!scheduler.is_running());
        assert!(!handle.snapshot().is_running);
        assert_eq!(handle.revision(), 0);
        assert_eq!(scheduler.frames().registrations, 0);
        assert!(!scheduler.frames().is_registered());
    }

    #[test]
    fn rate_change_restarts_running_metronome() {
        let (mut scheduler, handle) = scheduler();
        scheduler.start(100);
        run_until(&mut scheduler, &handle, 4 * NANOS_PER_SECOND);
        assert!(handle.snapshot().beat_count > 1);

        scheduler.set_target_rate(200);

        let state = handle.snapshot();
        assert!(state.is_running);
        assert_eq!(state.target_rate, 200);
        assert_eq!(state.beat_count, 1);
        assert_eq!(state.current_side, Side::A);
        assert_eq!(scheduler.interval_nanos(), Some(300_000_000));
    }

    #[test]
    fn rate_change_while_idle_only_updates_target() {
        let (mut scheduler, handle) = scheduler();

        scheduler.set_target_rate(500);

        let state = handle.snapshot();
        assert_eq!(state.target_rate, 240);
        assert!(!state.is_running);
        assert_eq!(scheduler.click().clicks, 0);
        assert!(!scheduler.frames().is_registered());
    }

    #[test]
    fn volume_is_clamped() {
        let (mut scheduler, handle) = scheduler();

        scheduler.set_volume(-10);
        assert_eq!(handle.snapshot().volume, 0);
        assert_eq!(scheduler.click().volume, 0);

        scheduler.set_volume(150);
        assert_eq!(handle.snapshot().volume, 100);
        assert_eq!(scheduler.click().volume, 100);
    }

    #[test]
    fn reinitialize_publishes_readiness() {
        let (mut scheduler, handle) = scheduler_with(false, JITTER);

        scheduler.reinitialize_audio();

        assert!(handle.snapshot().audio_ready);
        assert_eq!(scheduler.click().initializations, 1);

        scheduler.start(150);
        scheduler.dispose();
        let state = handle.snapshot();
        assert!(!state.is_running);
        assert!(!state.audio_ready);
        assert_eq!(scheduler.click().cleanups, 1);
    }

    #[test]
    fn sanitized_correction_never_divides_by_zero() {
        let correction = DriftCorrection {
            correction_divisor: 0,
            decay_numerator: 9,
            decay_denominator: 0,
            measure_every: 0,
        }
        .sanitized();
        assert_eq!(correction.correction_divisor, 1);
        assert_eq!(correction.decay_denominator, 1);
        assert_eq!(correction.decay_numerator, 1);
        assert_eq!(correction.measure_every, 1);
    }

    #[test]
    fn measured_rate_formula() {
        approx::assert_relative_eq!(measured_rate(180, 60 * NANOS_PER_SECOND), 180.0);
        approx::assert_relative_eq!(measured_rate(10, 3 * NANOS_PER_SECOND), 200.0);
        assert_eq!(measured_rate(5, 0), 0.0);
    }
}
