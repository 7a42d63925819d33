//! Audio frames exchanged between the bridge and its ports

use bytes::{Buf, BufMut, BytesMut};

use crate::format::Sample;

/// Type of a frame delivered through the mixing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameType {
    /// No audio this tick (source had nothing to deliver)
    #[default]
    None,
    /// Frame carries PCM samples
    Audio,
}

/// One tick worth of interleaved PCM samples
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioFrame {
    /// Whether the frame carries audio
    pub frame_type: FrameType,
    /// Interleaved samples
    pub samples: Vec<Sample>,
    /// Timestamp in samples
    pub timestamp: u64,
}

impl AudioFrame {
    /// Create an audio frame from samples
    pub fn new(samples: Vec<Sample>, timestamp: u64) -> Self {
        Self {
            frame_type: FrameType::Audio,
            samples,
            timestamp,
        }
    }

    /// Create an all-zero audio frame of `samples_per_frame` samples
    pub fn silence(samples_per_frame: usize) -> Self {
        Self::new(vec![0; samples_per_frame], 0)
    }

    /// Empty frame with storage for `samples_per_frame` samples
    pub fn with_capacity(samples_per_frame: usize) -> Self {
        Self {
            frame_type: FrameType::None,
            samples: vec![0; samples_per_frame],
            timestamp: 0,
        }
    }

    /// Zero the samples and mark the frame as carrying no audio
    pub fn clear(&mut self) {
        self.frame_type = FrameType::None;
        self.samples.iter_mut().for_each(|s| *s = 0);
    }

    /// Whether this frame carries audio
    pub fn is_audio(&self) -> bool {
        self.frame_type == FrameType::Audio
    }

    /// True when the frame carries no audio or only zero samples
    pub fn is_silent(&self) -> bool {
        !self.is_audio() || self.samples.iter().all(|&s| s == 0)
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Append samples to `dst` as little-endian 16-bit PCM
pub fn encode_pcm(samples: &[Sample], dst: &mut BytesMut) {
    dst.reserve(samples.len() * 2);
    for &sample in samples {
        dst.put_i16_le(sample);
    }
}

/// Decode little-endian 16-bit PCM from `src` into `dst`
///
/// Returns the number of samples written. A trailing odd byte is left in
/// `src`.
pub fn decode_pcm<B: Buf>(src: &mut B, dst: &mut [Sample]) -> usize {
    let count = (src.remaining() / 2).min(dst.len());
    for slot in dst.iter_mut().take(count) {
        *slot = src.get_i16_le();
    }
    count
}
