//! Sample formats and bridge timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Media sample type (signed 16-bit linear PCM)
pub type Sample = i16;

/// PCM sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleRate {
    /// 8kHz (narrowband)
    #[default]
    Rate8000 = 8000,
    /// 16kHz (wideband)
    Rate16000 = 16000,
    /// 32kHz
    Rate32000 = 32000,
    /// 44.1kHz (CD quality)
    Rate44100 = 44100,
    /// 48kHz
    Rate48000 = 48000,
}

impl SampleRate {
    /// Get the sample rate in Hz
    pub fn as_hz(&self) -> u32 {
        *self as u32
    }

    /// Create from a raw Hz value
    pub fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8000 => Some(Self::Rate8000),
            16000 => Some(Self::Rate16000),
            32000 => Some(Self::Rate32000),
            44100 => Some(Self::Rate44100),
            48000 => Some(Self::Rate48000),
            _ => None,
        }
    }
}

/// Audio format (channels, bit depth, sample rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,
    /// Number of channels (1 for mono)
    pub channels: u8,
    /// Bits per sample; only 16 is mixable
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::telephony()
    }
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u8, bits_per_sample: u8) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Create a new mono 16-bit format with the given sample rate
    pub fn mono_16bit(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 1, 16)
    }

    /// Standard narrowband telephony format (mono, 16-bit, 8kHz)
    pub fn telephony() -> Self {
        Self::mono_16bit(SampleRate::Rate8000)
    }

    /// Bytes occupied by one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize) / 8
    }

    /// Samples (all channels) in `ptime_ms` of audio
    pub fn samples_for(&self, ptime_ms: u32) -> usize {
        (self.sample_rate.as_hz() as usize * ptime_ms as usize / 1000) * self.channels as usize
    }

    /// Short human readable description, e.g. `8000Hz/1ch/16bit`
    pub fn description(&self) -> String {
        format!(
            "{}Hz/{}ch/{}bit",
            self.sample_rate.as_hz(),
            self.channels,
            self.bits_per_sample
        )
    }
}

/// Conference bridge configuration
///
/// Mirrors the media settings of the call-control layer: the bridge clock
/// rate, channel count and frame duration determine the frame size every
/// port must produce and consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Clock rate in Hz
    pub clock_rate: u32,
    /// Number of channels
    pub channel_count: u8,
    /// Bits per sample
    pub bits_per_sample: u8,
    /// Frame duration in milliseconds
    pub ptime_ms: u32,
    /// Maximum number of ports the bridge accepts
    pub max_ports: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            clock_rate: 8000,
            channel_count: 1,
            bits_per_sample: 16,
            ptime_ms: 20,
            max_ports: 254,
        }
    }
}

impl BridgeConfig {
    /// Check the configuration and resolve the bridge audio format
    pub fn validate(&self) -> Result<AudioFormat> {
        let sample_rate = SampleRate::from_hz(self.clock_rate).ok_or_else(|| {
            Error::UnsupportedFormat(format!("clock rate {} Hz", self.clock_rate))
        })?;
        if self.channel_count == 0 {
            return Err(Error::InvalidParameter("channel_count must be > 0".to_string()));
        }
        if self.bits_per_sample != 16 {
            return Err(Error::UnsupportedFormat(format!(
                "{} bits per sample, only 16-bit linear PCM is mixable",
                self.bits_per_sample
            )));
        }
        if self.ptime_ms == 0 {
            return Err(Error::InvalidParameter("ptime_ms must be > 0".to_string()));
        }
        if (self.clock_rate as u64 * self.ptime_ms as u64) % 1000 != 0 {
            return Err(Error::InvalidParameter(format!(
                "ptime {}ms is not a whole number of samples at {} Hz",
                self.ptime_ms, self.clock_rate
            )));
        }
        if self.max_ports == 0 {
            return Err(Error::InvalidParameter("max_ports must be > 0".to_string()));
        }

        Ok(AudioFormat::new(sample_rate, self.channel_count, self.bits_per_sample))
    }

    /// Samples (all channels) per frame
    pub fn samples_per_frame(&self) -> usize {
        (self.clock_rate as usize * self.ptime_ms as usize / 1000) * self.channel_count as usize
    }

    /// Bytes per frame of 16-bit PCM
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * (self.bits_per_sample as usize / 8)
    }

    /// Duration of one frame (one bridge tick)
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.ptime_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_telephony() {
        let config = BridgeConfig::default();
        let format = config.validate().unwrap();

        assert_eq!(format, AudioFormat::telephony());
        assert_eq!(config.samples_per_frame(), 160);
        assert_eq!(config.frame_bytes(), 320);
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_ten_ms_wideband_frame() {
        let config = BridgeConfig {
            clock_rate: 16000,
            ptime_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.samples_per_frame(), 160);
    }

    #[test]
    fn test_rejects_unsupported_values() {
        let odd_rate = BridgeConfig { clock_rate: 11025, ..Default::default() };
        assert!(matches!(odd_rate.validate(), Err(Error::UnsupportedFormat(_))));

        let eight_bit = BridgeConfig { bits_per_sample: 8, ..Default::default() };
        assert!(matches!(eight_bit.validate(), Err(Error::UnsupportedFormat(_))));

        let no_ptime = BridgeConfig { ptime_ms: 0, ..Default::default() };
        assert!(matches!(no_ptime.validate(), Err(Error::InvalidParameter(_))));

        // 44.1 kHz does not divide into 15ms frames
        let fractional = BridgeConfig { clock_rate: 44100, ptime_ms: 15, ..Default::default() };
        assert!(matches!(fractional.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_format_description() {
        assert_eq!(AudioFormat::telephony().description(), "8000Hz/1ch/16bit");
        assert_eq!(AudioFormat::telephony().bytes_per_sample(), 2);
        assert_eq!(AudioFormat::telephony().samples_for(20), 160);
    }
}
