use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;

/// Parameters for allocating a playback resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    /// 1 = mono
    pub channels: u16,
    pub bits_per_sample: u16,
    pub buffer_bytes: usize,
}

/// The platform audio subsystem: hands out playback resources.
pub trait AudioOutput {
    fn allocate(&mut self, config: &PlaybackConfig) -> Result<Box<dyn PlaybackResource>>;
}

/// A static (replay-from-start) audio output handle bound to one buffer
pub trait PlaybackResource {
    /// Load little-endian PCM16 data into the resource
    fn write_samples(&mut self, bytes: &[u8]) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Rewind the read position to the first sample
    fn reload(&mut self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Normalized gain in [0.0, 1.0]
    fn set_gain(&mut self, gain: f32) -> Result<()>;

    /// True while the resource holds a live device stream and data
    fn is_initialized(&self) -> bool;

    /// Tear down the device stream. Further calls are no-ops.
    fn release(&mut self);
}

/// State shared between the owning thread and the device callback
struct ReplayVoice {
    samples: Vec<f32>,
    /// Fractional read position in source samples
    position: f64,
    playing: bool,
    gain: f32,
}

impl ReplayVoice {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            position: 0.0,
            playing: false,
            gain: 1.0,
        }
    }

    fn next_sample(&mut self, step: f64) -> f32 {
        if !self.playing {
            return 0.0;
        }
        let index = self.position as usize;
        let Some(&sample) = self.samples.get(index) else {
            self.playing = false;
            return 0.0;
        };
        self.position += step;
        sample * self.gain
    }
}

/// cpal-backed audio output using the default output device
pub struct CpalOutput {
    host: cpal::Host,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn allocate(&mut self, config: &PlaybackConfig) -> Result<Box<dyn PlaybackResource>> {
        if config.channels != 1 || config.bits_per_sample != 16 {
            bail!(
                "Unsupported playback layout: {} channel(s), {} bits",
                config.channels,
                config.bits_per_sample
            );
        }

        let device = self
            .host
            .default_output_device()
            .context("No output device available")?;
        let device_config = device.default_output_config()?;
        let voice = Arc::new(Mutex::new(ReplayVoice::new()));
        voice.lock().samples.reserve(config.buffer_bytes / 2);

        let stream = match device_config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &device_config.into(),
                config.sample_rate,
                voice.clone(),
            )?,
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &device_config.into(),
                config.sample_rate,
                voice.clone(),
            )?,
            SampleFormat::U16 => build_stream::<u16>(
                &device,
                &device_config.into(),
                config.sample_rate,
                voice.clone(),
            )?,
            format => bail!("Unsupported sample format: {:?}", format),
        };
        stream.play()?;

        log::debug!(
            "Allocated playback stream ({} Hz source, {} bytes)",
            config.sample_rate,
            config.buffer_bytes
        );

        Ok(Box::new(CpalPlayback {
            stream: Some(stream),
            voice,
        }))
    }
}

/// Build the device stream for a specific sample format
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    source_rate: u32,
    voice: Arc<Mutex<ReplayVoice>>,
) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let step = source_rate as f64 / config.sample_rate.0 as f64;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // Never block the device thread; emit silence if the owner holds the lock
            let Some(mut voice) = voice.try_lock() else {
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0);
                }
                return;
            };
            for frame in data.chunks_mut(channels) {
                let value = T::from_sample(voice.next_sample(step));
                for channel_sample in frame.iter_mut() {
                    *channel_sample = value;
                }
            }
        },
        |err| {
            log::warn!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

/// Playback resource driving a cpal output stream
pub struct CpalPlayback {
    stream: Option<Stream>,
    voice: Arc<Mutex<ReplayVoice>>,
}

impl PlaybackResource for CpalPlayback {
    fn write_samples(&mut self, bytes: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            bail!("Playback resource already released");
        }
        let mut voice = self.voice.lock();
        voice.samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
            .collect();
        voice.position = 0.0;
        voice.playing = false;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.stream.is_none() {
            bail!("Playback resource already released");
        }
        self.voice.lock().playing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.voice.lock().playing = false;
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.voice.lock().position = 0.0;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.voice.lock().playing
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.voice.lock().gain = gain.clamp(0.0, 1.0);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.stream.is_some() && !self.voice.lock().samples.is_empty()
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("Pausing stream on release failed: {}", e);
            }
            drop(stream);
            let mut voice = self.voice.lock();
            voice.playing = false;
            voice.samples = Vec::new();
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.release();
    }
}
