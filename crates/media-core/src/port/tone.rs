//! Sine tone source

use std::f64::consts::PI;

use super::{signature, MediaPort, PortInfo};
use crate::error::{Error, Result};
use crate::format::{AudioFormat, Sample};
use crate::frame::{AudioFrame, FrameType};
use crate::status::{Direction, PortStatus};

/// Port producing a fixed sine tone, optionally for a limited number of samples
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    info: PortInfo,
    frequency_hz: f64,
    amplitude: i16,
    position: u64,
    limit: Option<u64>,
}

impl ToneGenerator {
    /// Port signature
    pub const SIGNATURE: u32 = signature(b"PATG");

    /// Create an endless tone
    pub fn new(
        frequency_hz: f64,
        amplitude: i16,
        format: AudioFormat,
        samples_per_frame: usize,
    ) -> Result<Self> {
        let nyquist = format.sample_rate.as_hz() as f64 / 2.0;
        if !(frequency_hz > 0.0 && frequency_hz < nyquist) {
            return Err(Error::InvalidParameter(format!(
                "tone frequency {frequency_hz} Hz outside (0, {nyquist}) Hz"
            )));
        }
        Ok(Self {
            info: PortInfo::new(
                format!("tone-{frequency_hz}hz"),
                Self::SIGNATURE,
                format,
                samples_per_frame,
            ),
            frequency_hz,
            amplitude,
            position: 0,
            limit: None,
        })
    }

    /// Stop after `samples` samples; silence is produced afterwards
    pub fn with_sample_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    /// Samples produced so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the sample limit was reached
    pub fn is_finished(&self) -> bool {
        self.limit.is_some_and(|limit| self.position >= limit)
    }

    /// Tone samples `start..start + count` at the given rate
    ///
    /// Deterministic, so tests can compute the exact stream a generator
    /// produces.
    pub fn samples(
        frequency_hz: f64,
        amplitude: i16,
        sample_rate: u32,
        start: u64,
        count: usize,
    ) -> Vec<Sample> {
        let step = 2.0 * PI * frequency_hz / sample_rate as f64;
        (0..count as u64)
            .map(|i| {
                let phase = step * (start + i) as f64;
                (phase.sin() * amplitude as f64).round() as Sample
            })
            .collect()
    }
}

impl MediaPort for ToneGenerator {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn get_frame(&mut self, frame: &mut AudioFrame) -> Result<()> {
        if self.is_finished() {
            frame.frame_type = FrameType::None;
            return Ok(());
        }

        let mut count = frame.samples.len();
        if let Some(limit) = self.limit {
            count = count.min((limit - self.position) as usize);
        }
        let tone = Self::samples(
            self.frequency_hz,
            self.amplitude,
            self.info.format.sample_rate.as_hz(),
            self.position,
            count,
        );
        frame.samples[..count].copy_from_slice(&tone);
        frame.samples[count..].iter_mut().for_each(|s| *s = 0);
        frame.frame_type = FrameType::Audio;
        frame.timestamp = self.position;
        self.position += count as u64;
        Ok(())
    }

    fn put_frame(&mut self, _frame: &AudioFrame) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> PortStatus {
        PortStatus::healthy(Direction::ReadOnly)
    }
}
