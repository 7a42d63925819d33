//! Memory-backed port for tests and simulated call media
//!
//! Captures every audio frame pushed into it and plays back whatever was
//! queued on its shared buffers.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{signature, MediaPort, PortInfo};
use crate::error::Result;
use crate::format::{AudioFormat, Sample};
use crate::frame::{AudioFrame, FrameType};
use crate::status::{Direction, PortStatus};

/// Shared buffers of a [`MemoryPort`]
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffers {
    /// Samples the port will deliver, consumed a frame at a time
    pub playback: Arc<Mutex<VecDeque<Sample>>>,
    /// Samples of every audio frame put into the port
    pub captured: Arc<Mutex<Vec<Sample>>>,
    /// Number of frames put into the port, audio or not
    pub frames_received: Arc<Mutex<u64>>,
}

impl MemoryBuffers {
    /// Create empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue samples for playback
    pub fn queue(&self, samples: &[Sample]) {
        self.playback.lock().extend(samples.iter().copied());
    }

    /// Copy of everything captured so far
    pub fn captured(&self) -> Vec<Sample> {
        self.captured.lock().clone()
    }

    /// Take everything captured so far
    pub fn take_captured(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.captured.lock())
    }

    /// Number of frames put into the port
    pub fn frames_received(&self) -> u64 {
        *self.frames_received.lock()
    }
}

/// Port backed by [`MemoryBuffers`]
#[derive(Debug)]
pub struct MemoryPort {
    info: PortInfo,
    buffers: MemoryBuffers,
    timestamp: u64,
}

impl MemoryPort {
    /// Port signature
    pub const SIGNATURE: u32 = signature(b"PAMM");

    /// Create a memory port and return it with its shared buffers
    pub fn new(
        name: impl Into<String>,
        format: AudioFormat,
        samples_per_frame: usize,
    ) -> (Self, MemoryBuffers) {
        let buffers = MemoryBuffers::new();
        let port = Self {
            info: PortInfo::new(name, Self::SIGNATURE, format, samples_per_frame),
            buffers: buffers.clone(),
            timestamp: 0,
        };
        (port, buffers)
    }
}

impl MediaPort for MemoryPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn get_frame(&mut self, frame: &mut AudioFrame) -> Result<()> {
        let mut playback = self.buffers.playback.lock();
        if playback.is_empty() {
            frame.frame_type = FrameType::None;
            return Ok(());
        }

        let count = playback.len().min(frame.samples.len());
        for (slot, sample) in frame.samples.iter_mut().zip(playback.drain(..count)) {
            *slot = sample;
        }
        frame.samples[count..].iter_mut().for_each(|s| *s = 0);
        frame.frame_type = FrameType::Audio;
        frame.timestamp = self.timestamp;
        self.timestamp += self.info.samples_per_frame as u64;
        Ok(())
    }

    fn put_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        *self.buffers.frames_received.lock() += 1;
        if frame.is_audio() {
            self.buffers.captured.lock().extend_from_slice(&frame.samples);
        }
        Ok(())
    }

    fn status(&self) -> PortStatus {
        PortStatus::healthy(Direction::ReadWrite)
    }
}
