use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    Tui,
    Headless,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // Transport
    Start(i32),
    Stop,
    /// Start at the current target rate, or stop if running
    Toggle,

    // Rate
    SetRate(i32),
    NudgeRate(i32),

    // Volume
    SetVolume(i32),
    NudgeVolume(i32),

    // Lifecycle
    ReinitAudio,
    Shutdown,
}

impl Command {
    /// Human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::Start(rate) => format!("Start at {} bpm", rate),
            Command::Stop => "Stop".to_string(),
            Command::Toggle => "Toggle start/stop".to_string(),
            Command::SetRate(rate) => format!("Set rate to {} bpm", rate),
            Command::NudgeRate(delta) => format!("Nudge rate by {:+}", delta),
            Command::SetVolume(volume) => format!("Set volume to {}", volume),
            Command::NudgeVolume(delta) => format!("Nudge volume by {:+}", delta),
            Command::ReinitAudio => "Re-initialize audio".to_string(),
            Command::Shutdown => "Shutdown".to_string(),
        }
    }
}
