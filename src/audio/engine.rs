use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;

use super::playback::{AudioOutput, CpalOutput};
use crate::click::{ClickGenerator, ClickSink};
use crate::command::{Command, CommandBus, CommandReceiver, CommandSender, CommandSource, Received};
use crate::scheduler::{BeatScheduler, FrameSource, FrameTicker, MetronomeState, StateHandle};
use crate::settings::Settings;

/// How long the idle engine waits on the command bus before re-checking shutdown
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Owns the engine thread that runs the click generator and beat scheduler
pub struct MetronomeEngine {
    pub state: StateHandle,
    sender: CommandSender,
    source: CommandSource,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    audio_ready: bool,
}

impl MetronomeEngine {
    /// Start the engine on the default output device
    pub fn new(settings: &Settings, bus: &CommandBus, source: CommandSource) -> Result<Self> {
        Self::spawn(settings, bus, source, || {
            Box::new(CpalOutput::new()) as Box<dyn AudioOutput>
        })
    }

    /// Start the engine with a custom audio output. The output is built on
    /// the engine thread since device streams may not cross threads.
    pub fn spawn<O>(
        settings: &Settings,
        bus: &CommandBus,
        source: CommandSource,
        make_output: O,
    ) -> Result<Self>
    where
        O: FnOnce() -> Box<dyn AudioOutput> + Send + 'static,
    {
        let state = StateHandle::new(MetronomeState::new(settings.bpm, settings.volume));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);

        let handle = state.clone();
        let receiver = bus.receiver();
        let spec = settings.click.clone();
        let correction = settings.correction.clone();
        let frame_rate = settings.frame_rate_hz;
        let volume = settings.volume;
        let stop_flag = shutdown.clone();

        let thread = thread::Builder::new()
            .name("cadence-engine".to_string())
            .spawn(move || {
                let mut click = ClickGenerator::new(make_output(), spec);
                click.set_volume(volume);
                click.initialize();

                let frames = FrameTicker::new(frame_rate);
                let mut scheduler = BeatScheduler::new(click, frames, handle, correction);
                scheduler.publish_readiness();
                // Receiver may already be gone if spawn bailed
                let _ = ready_tx.send(scheduler.click().is_ready());

                log::debug!("Engine thread running at {} Hz frame rate", frame_rate);
                run_loop(&mut scheduler, &receiver, &stop_flag);

                scheduler.dispose();
                log::debug!("Engine thread exiting");
            })
            .context("Failed to spawn engine thread")?;

        let audio_ready = ready_rx
            .recv()
            .context("Engine thread exited during initialization")?;

        Ok(Self {
            state,
            sender: bus.sender(),
            source,
            shutdown,
            thread: Some(thread),
            audio_ready,
        })
    }

    /// Whether the click generator came up on spawn
    pub fn audio_ready(&self) -> bool {
        self.audio_ready
    }

    /// Stop the engine thread and wait for it to release the audio device
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Relaxed);
        self.sender.send(Command::Shutdown, self.source);
        if thread.join().is_err() {
            log::warn!("Engine thread panicked");
        }
    }
}

impl Drop for MetronomeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<C: ClickSink>(
    scheduler: &mut BeatScheduler<C, FrameTicker>,
    receiver: &CommandReceiver,
    shutdown: &AtomicBool,
) {
    loop {
        while let Some((cmd, source)) = receiver.try_recv() {
            if !apply_command(scheduler, cmd, source) {
                return;
            }
        }
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        if scheduler.frames().is_registered() {
            let now = scheduler.frames_mut().wait_frame();
            scheduler.on_frame(now);
        } else {
            match receiver.recv_timeout(IDLE_POLL) {
                Received::Command(cmd, source) => {
                    if !apply_command(scheduler, cmd, source) {
                        return;
                    }
                }
                Received::TimedOut => {}
                Received::Closed => return,
            }
        }
    }
}

/// Apply one command. Returns false when the engine should exit.
fn apply_command<C: ClickSink, F: FrameSource>(
    scheduler: &mut BeatScheduler<C, F>,
    cmd: Command,
    source: CommandSource,
) -> bool {
    log::debug!("{:?}: {}", source, cmd.description());

    match cmd {
        Command::Start(rate) => scheduler.start(rate),
        Command::Stop => scheduler.stop(),
        Command::Toggle => {
            if scheduler.is_running() {
                scheduler.stop();
            } else {
                let rate = scheduler.state().target_rate;
                scheduler.start(rate);
            }
        }
        Command::SetRate(rate) => scheduler.set_target_rate(rate),
        Command::NudgeRate(delta) => {
            let rate = scheduler.state().target_rate.saturating_add(delta);
            scheduler.set_target_rate(rate);
        }
        Command::SetVolume(volume) => scheduler.set_volume(volume),
        Command::NudgeVolume(delta) => {
            let volume = scheduler.state().volume.saturating_add(delta);
            scheduler.set_volume(volume);
        }
        Command::ReinitAudio => scheduler.reinitialize_audio(),
        Command::Shutdown => return false,
    }
    true
}
