use anyhow::{Context, Result};

use super::waveform::{ClickWaveform, WaveformSpec};
use crate::audio::{AudioOutput, PlaybackConfig, PlaybackResource};

pub const MIN_VOLUME: i32 = 0;
pub const MAX_VOLUME: i32 = 100;

/// Anything the beat scheduler can fire.
pub trait ClickSink {
    /// Prepare the sound and its output resource. Idempotent; failure is
    /// observable only through `is_ready`.
    fn initialize(&mut self);

    /// Release everything `initialize` acquired. Safe to repeat.
    fn cleanup(&mut self);

    /// True if a trigger will actually produce sound
    fn is_ready(&self) -> bool;

    /// Play one click from its first sample. No-op when not ready.
    fn trigger_click(&mut self);

    /// Volume in 0..=100, clamped
    fn set_volume(&mut self, volume: i32);
}

/// Owns the click waveform and the playback resource it is bound to
pub struct ClickGenerator {
    output: Box<dyn AudioOutput>,
    spec: WaveformSpec,
    waveform: Option<ClickWaveform>,
    resource: Option<Box<dyn PlaybackResource>>,
    volume: i32,
}

impl ClickGenerator {
    pub fn new(output: Box<dyn AudioOutput>, spec: WaveformSpec) -> Self {
        Self {
            output,
            spec,
            waveform: None,
            resource: None,
            volume: MAX_VOLUME,
        }
    }

    fn bind(&mut self) -> Result<(ClickWaveform, Box<dyn PlaybackResource>)> {
        let waveform = ClickWaveform::synthesize(&self.spec)?;
        let bytes = waveform.to_le_bytes();
        let config = PlaybackConfig {
            sample_rate: waveform.sample_rate(),
            channels: 1,
            bits_per_sample: 16,
            buffer_bytes: bytes.len(),
        };

        let mut resource = self
            .output
            .allocate(&config)
            .context("Failed to allocate playback resource")?;
        let gain = volume_to_gain(self.volume);
        let loaded = resource
            .write_samples(&bytes)
            .and_then(|()| resource.set_gain(gain));
        if let Err(e) = loaded {
            resource.release();
            return Err(e.context("Failed to load click into playback resource"));
        }

        Ok((waveform, resource))
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn waveform(&self) -> Option<&ClickWaveform> {
        self.waveform.as_ref()
    }

    fn restart(resource: &mut dyn PlaybackResource) -> Result<()> {
        if resource.is_playing() {
            resource.stop()?;
        }
        resource.reload()?;
        resource.play()
    }
}

impl ClickSink for ClickGenerator {
    /// Synthesize the click and bind it to a fresh playback resource.
    /// Any previously bound resource is released first. Failure leaves the
    /// generator not ready and is only reported through the log.
    fn initialize(&mut self) {
        self.cleanup();

        match self.bind() {
            Ok((waveform, resource)) => {
                log::info!(
                    "Click ready: {} samples at {} Hz",
                    waveform.len(),
                    waveform.sample_rate()
                );
                self.waveform = Some(waveform);
                self.resource = Some(resource);
            }
            Err(e) => {
                log::warn!("Click generator unavailable: {:#}", e);
            }
        }
    }

    /// Stop playback, release the resource and drop the waveform.
    /// Safe to call repeatedly or before `initialize`.
    fn cleanup(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            if resource.is_playing() {
                if let Err(e) = resource.stop() {
                    log::debug!("Stopping click on cleanup failed: {:#}", e);
                }
            }
            resource.release();
            log::debug!("Click playback resource released");
        }
        self.waveform = None;
    }

    fn is_ready(&self) -> bool {
        self.resource
            .as_ref()
            .map(|r| r.is_initialized())
            .unwrap_or(false)
    }

    fn trigger_click(&mut self) {
        if !self.is_ready() {
            log::warn!("Click triggered before audio was ready");
            return;
        }
        if let Some(resource) = self.resource.as_deref_mut() {
            if let Err(e) = Self::restart(resource) {
                log::warn!("Click playback failed: {:#}", e);
            }
        }
    }

    fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        if let Some(resource) = self.resource.as_deref_mut() {
            if let Err(e) = resource.set_gain(volume_to_gain(self.volume)) {
                log::warn!("Setting click gain failed: {:#}", e);
            }
        }
    }
}

impl Drop for ClickGenerator {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Linear map from 0..=100 to 0.0..=1.0
pub fn volume_to_gain(volume: i32) -> f32 {
    volume.clamp(MIN_VOLUME, MAX_VOLUME) as f32 / MAX_VOLUME as f32
}
