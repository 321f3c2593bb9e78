use std::f64::consts::TAU;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Fixed output rate of every synthesized click
pub const SAMPLE_RATE: u32 = 44_100;

/// Longest click buffer we are willing to synthesize
const MAX_DURATION_MS: u32 = 10_000;

/// Shape of the tick/tock click pattern
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformSpec {
    /// Total buffer length in milliseconds
    pub duration_ms: u32,
    /// Frequency of the leading (high) burst
    pub tick_hz: f32,
    /// Frequency of the trailing (low) burst
    pub tock_hz: f32,
    /// Length of each burst
    pub burst_ms: u32,
    /// Offset from the start of the tick to the start of the tock
    pub tock_delay_ms: u32,
    /// Fraction of full scale used at the envelope peak
    pub headroom: f32,
}

impl Default for WaveformSpec {
    fn default() -> Self {
        Self {
            duration_ms: 180,
            tick_hz: 800.0,
            tock_hz: 600.0,
            burst_ms: 60,
            tock_delay_ms: 120,
            headroom: 0.7,
        }
    }
}

impl WaveformSpec {
    pub fn validate(&self) -> Result<()> {
        if self.duration_ms == 0 || self.duration_ms > MAX_DURATION_MS {
            bail!(
                "Click duration {} ms outside 1..={} ms",
                self.duration_ms,
                MAX_DURATION_MS
            );
        }
        if self.burst_ms == 0 {
            bail!("Click burst length must be non-zero");
        }
        if self.tock_delay_ms < self.burst_ms {
            bail!(
                "Tock delay {} ms is shorter than the {} ms burst",
                self.tock_delay_ms,
                self.burst_ms
            );
        }
        let nyquist = SAMPLE_RATE as f32 / 2.0;
        for freq in [self.tick_hz, self.tock_hz] {
            if !(freq > 0.0 && freq < nyquist) {
                bail!("Click frequency {} Hz outside (0, {}) Hz", freq, nyquist);
            }
        }
        if !(self.headroom > 0.0 && self.headroom <= 1.0) {
            bail!("Click headroom {} outside (0, 1]", self.headroom);
        }
        Ok(())
    }
}

/// Number of whole samples covering `ms` milliseconds at [`SAMPLE_RATE`]
pub fn samples_for_ms(ms: u32) -> usize {
    (SAMPLE_RATE as u64 * ms as u64 / 1000) as usize
}

/// Immutable mono PCM16 click buffer
#[derive(Clone, Debug)]
pub struct ClickWaveform {
    samples: Vec<i16>,
}

/// Result of a WAV export
pub struct ExportResult {
    pub duration_secs: f32,
    pub samples: usize,
}

impl ClickWaveform {
    /// Render the tick / gap / tock group repeatedly, cut exactly at the
    /// requested duration.
    pub fn synthesize(spec: &WaveformSpec) -> Result<Self> {
        spec.validate().context("Invalid click waveform")?;

        let total = samples_for_ms(spec.duration_ms);
        let burst = samples_for_ms(spec.burst_ms);
        let gap = samples_for_ms(spec.tock_delay_ms - spec.burst_ms);
        let peak = i16::MAX as f32 * spec.headroom;

        let mut samples = Vec::with_capacity(total + 2 * burst + gap);
        while samples.len() < total {
            push_burst(&mut samples, spec.tick_hz, burst, peak);
            samples.resize(samples.len() + gap, 0);
            push_burst(&mut samples, spec.tock_hz, burst, peak);
        }
        samples.truncate(total);

        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Little-endian byte image, two bytes per sample
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Write the click as a 16-bit mono WAV file
    pub fn export_wav(&self, path: &Path) -> Result<ExportResult> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer
            .finalize()
            .with_context(|| format!("Failed to finalize WAV file: {}", path.display()))?;

        Ok(ExportResult {
            duration_secs: self.samples.len() as f32 / SAMPLE_RATE as f32,
            samples: self.samples.len(),
        })
    }
}

/// Square burst whose polarity follows a sine at `freq`, under a linear
/// 1.0 -> 0.0 envelope.
fn push_burst(out: &mut Vec<i16>, freq: f32, len: usize, peak: f32) {
    let last = len.saturating_sub(1).max(1) as f32;
    for i in 0..len {
        let phase = TAU * freq as f64 * i as f64 / SAMPLE_RATE as f64;
        let polarity = if phase.sin() > 0.0 { 1.0 } else { -1.0 };
        let envelope = 1.0 - i as f32 / last;
        out.push((polarity * peak * envelope) as i16);
    }
}
