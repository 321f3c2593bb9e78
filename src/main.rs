mod app;
mod audio;
mod click;
mod command;
mod scheduler;
mod settings;
mod ui;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use app::App;
use audio::MetronomeEngine;
use click::ClickWaveform;
use command::{Command, CommandBus, CommandSource};
use scheduler::{MetronomeState, StateHandle};
use settings::{default_settings_path, load_settings, Settings};
use ui::Theme;

/// Cadence - terminal running-cadence metronome
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target rate in beats per minute (40-240)
    #[arg(long)]
    bpm: Option<i32>,

    /// Click volume (0-100)
    #[arg(long)]
    volume: Option<i32>,

    /// Theme to use for the interface
    #[arg(long)]
    theme: Option<String>,

    /// List available themes and exit
    #[arg(long)]
    list_themes: bool,

    /// Settings file (defaults to ~/.cadence/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Click buffer length in milliseconds
    #[arg(long)]
    click_ms: Option<u32>,

    /// Scheduler frame rate in Hz
    #[arg(long)]
    frame_rate: Option<u32>,

    /// Run without the TUI for this many seconds, then report
    #[arg(long, value_name = "SECONDS")]
    headless: Option<u64>,

    /// Print the headless report as JSON
    #[arg(long, requires = "headless")]
    json: bool,

    /// Write the click waveform to a WAV file and exit
    #[arg(long, value_name = "PATH")]
    export_click: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.headless.is_some() { "info" } else { "off" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Handle --list-themes
    if args.list_themes {
        println!("Available themes:");
        for theme in Theme::available_themes() {
            println!("  {}", theme);
        }
        return Ok(());
    }

    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let settings = apply_overrides(load_settings(&settings_path)?, &args);

    if let Some(path) = &args.export_click {
        return export_click(&settings, path);
    }

    if let Some(seconds) = args.headless {
        return run_headless(&settings, seconds, args.json);
    }

    // Load theme
    let theme = Theme::from_name(&settings.theme).unwrap_or_else(|| {
        eprintln!(
            "Warning: Unknown theme '{}', using default. Use --list-themes to see available themes.",
            settings.theme
        );
        Theme::default()
    });

    // Run the TUI application
    let mut app = App::new(theme, settings, settings_path)?;
    app.run()
}

/// Layer command line flags over the loaded settings
fn apply_overrides(mut settings: Settings, args: &Args) -> Settings {
    if let Some(bpm) = args.bpm {
        settings.bpm = bpm;
    }
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }
    if let Some(theme) = &args.theme {
        settings.theme = theme.clone();
    }
    if let Some(ms) = args.click_ms {
        settings.click.duration_ms = ms;
    }
    if let Some(hz) = args.frame_rate {
        settings.frame_rate_hz = hz;
    }
    settings.normalized()
}

fn export_click(settings: &Settings, path: &Path) -> Result<()> {
    let waveform = ClickWaveform::synthesize(&settings.click)?;
    let result = waveform
        .export_wav(path)
        .with_context(|| format!("Failed to export click to {}", path.display()))?;
    println!(
        "Exported {} samples ({:.3}s) to {}",
        result.samples,
        result.duration_secs,
        path.display()
    );
    Ok(())
}

/// Run the metronome for a fixed time without a terminal UI
fn run_headless(settings: &Settings, seconds: u64, json: bool) -> Result<()> {
    let bus = CommandBus::new();
    let sender = bus.sender();
    let mut engine = MetronomeEngine::new(settings, &bus, CommandSource::Headless)?;
    if !engine.audio_ready() {
        bail!("No audio output available");
    }

    log::info!("Running at {} bpm for {}s", settings.bpm, seconds);
    sender.send(Command::Start(settings.bpm), CommandSource::Headless);

    let started = Instant::now();
    let total = Duration::from_secs(seconds);
    while started.elapsed() < total {
        let remaining = total.saturating_sub(started.elapsed());
        thread::sleep(remaining.min(Duration::from_secs(1)));
        let state = engine.state.snapshot();
        log::info!(
            "beats={} side={} measured={:.1}",
            state.beat_count,
            state.current_side.label(),
            state.measured_rate
        );
    }

    sender.send(Command::Stop, CommandSource::Headless);
    let report = wait_for_stop(&engine.state);
    engine.shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} beats, target {} bpm, measured {:.1} bpm",
            report.beat_count, report.target_rate, report.measured_rate
        );
    }
    Ok(())
}

/// Wait briefly for the engine to publish the stopped state
fn wait_for_stop(state: &StateHandle) -> MetronomeState {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        let snapshot = state.snapshot();
        if !snapshot.is_running || Instant::now() >= deadline {
            return snapshot;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
