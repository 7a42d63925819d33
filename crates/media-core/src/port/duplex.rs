//! Port pairing an independent source and sink

use super::{signature, MediaPort, PortInfo};
use crate::error::{Error, Result};
use crate::frame::AudioFrame;
use crate::status::{Direction, PortStatus};

/// Presents a source port and a sink port as one bidirectional port
///
/// Frames pulled from it come from the source; frames pushed into it go to
/// the sink. Used to stand in for the media of a call.
pub struct DuplexPort {
    info: PortInfo,
    source: Box<dyn MediaPort>,
    sink: Box<dyn MediaPort>,
}

impl DuplexPort {
    /// Port signature
    pub const SIGNATURE: u32 = signature(b"PADX");

    /// Pair two ports with identical format and frame size
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn MediaPort>,
        sink: Box<dyn MediaPort>,
    ) -> Result<Self> {
        let (src, dst) = (source.info(), sink.info());
        if src.format != dst.format || src.samples_per_frame != dst.samples_per_frame {
            return Err(Error::UnsupportedFormat(format!(
                "cannot pair {} ({}, {} spf) with {} ({}, {} spf)",
                src.name,
                src.format.description(),
                src.samples_per_frame,
                dst.name,
                dst.format.description(),
                dst.samples_per_frame
            )));
        }
        let info = PortInfo::new(name, Self::SIGNATURE, src.format, src.samples_per_frame);
        Ok(Self { info, source, sink })
    }
}

impl std::fmt::Debug for DuplexPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexPort")
            .field("name", &self.info.name)
            .field("source", &self.source.info().name)
            .field("sink", &self.sink.info().name)
            .finish()
    }
}

impl MediaPort for DuplexPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn get_frame(&mut self, frame: &mut AudioFrame) -> Result<()> {
        self.source.get_frame(frame)
    }

    fn put_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        self.sink.put_frame(frame)
    }

    fn status(&self) -> PortStatus {
        let source = self.source.status();
        let sink = self.sink.status();
        let mut io = source.io;
        io.frames_written = sink.io.frames_written;
        io.frames_dropped = sink.io.frames_dropped;
        io.output_closed = sink.io.output_closed;
        for warning in sink.io.warnings {
            io.raise(warning);
        }
        PortStatus {
            direction: Direction::from_halves(
                source.direction.is_readable(),
                sink.direction.is_writable(),
            ),
            io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AudioFormat, SampleRate};
    use crate::port::{MemoryPort, ToneGenerator};

    #[test]
    fn test_routes_each_direction() {
        let tone = ToneGenerator::new(440.0, 1000, AudioFormat::telephony(), 160).unwrap();
        let (sink, buffers) = MemoryPort::new("sink", AudioFormat::telephony(), 160);
        let mut duplex = DuplexPort::new("call", Box::new(tone), Box::new(sink)).unwrap();

        let mut frame = AudioFrame::with_capacity(160);
        duplex.get_frame(&mut frame).unwrap();
        assert_eq!(frame.samples, ToneGenerator::samples(440.0, 1000, 8000, 0, 160));

        duplex.put_frame(&AudioFrame::new(vec![3; 160], 0)).unwrap();
        assert_eq!(buffers.captured(), vec![3; 160]);
        assert_eq!(duplex.status().direction, Direction::ReadWrite);
    }

    #[test]
    fn test_rejects_mismatched_halves() {
        let tone = ToneGenerator::new(440.0, 1000, AudioFormat::telephony(), 160).unwrap();
        let (sink, _) = MemoryPort::new("sink", AudioFormat::mono_16bit(SampleRate::Rate16000), 160);
        assert!(DuplexPort::new("call", Box::new(tone), Box::new(sink)).is_err());
    }
}
