//! File-descriptor audio port

use tracing::debug;

use super::{signature, MediaPort, PortInfo};
use crate::endpoint::{FdPortFlags, PcmStreamEndpoint, StreamHandle};
use crate::error::{Error, Result};
use crate::format::AudioFormat;
use crate::frame::{AudioFrame, FrameType};
use crate::status::PortStatus;

/// Options for creating a file-descriptor port
#[derive(Debug, Default)]
pub struct FdPortOptions {
    /// Source of PCM read into the bridge
    pub input: StreamHandle,
    /// Sink for PCM mixed by the bridge
    pub output: StreamHandle,
    /// Creation flags
    pub flags: FdPortFlags,
    /// Format of the streams; the bridge format when unset
    pub format: Option<AudioFormat>,
}

impl FdPortOptions {
    /// Options with the given input and output
    pub fn new(input: impl Into<StreamHandle>, output: impl Into<StreamHandle>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Set the creation flags
    pub fn with_flags(mut self, flags: FdPortFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Declare the stream format
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Presents a [`PcmStreamEndpoint`] as a node of the mixing graph
#[derive(Debug)]
pub struct FdPort {
    info: PortInfo,
    endpoint: PcmStreamEndpoint,
    timestamp: u64,
}

impl FdPort {
    /// Port name
    pub const NAME: &'static str = "fd-port";
    /// Port signature
    pub const SIGNATURE: u32 = signature(b"PAFD");

    /// Create a port clocked at the bridge format and frame size
    ///
    /// Fails with [`Error::UnsupportedFormat`] when the streams' declared
    /// format differs from the bridge format (there is no resampling), and
    /// with [`Error::InvalidHandle`] when neither stream is usable.
    pub fn new(
        options: FdPortOptions,
        bridge_format: AudioFormat,
        samples_per_frame: usize,
    ) -> Result<Self> {
        let format = options.format.unwrap_or(bridge_format);
        if format != bridge_format {
            return Err(Error::UnsupportedFormat(format!(
                "stream format {} does not match bridge format {}",
                format.description(),
                bridge_format.description()
            )));
        }
        if samples_per_frame == 0 {
            return Err(Error::InvalidParameter("samples_per_frame must be > 0".to_string()));
        }

        let endpoint =
            PcmStreamEndpoint::open(options.input, options.output, options.flags, format)?;
        debug!(
            "Created {} ({:?}, {} samples per frame)",
            Self::NAME,
            endpoint.direction(),
            samples_per_frame
        );

        Ok(Self {
            info: PortInfo::new(Self::NAME, Self::SIGNATURE, format, samples_per_frame),
            endpoint,
            timestamp: 0,
        })
    }

    /// The wrapped endpoint
    pub fn endpoint(&self) -> &PcmStreamEndpoint {
        &self.endpoint
    }
}

impl MediaPort for FdPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn get_frame(&mut self, frame: &mut AudioFrame) -> Result<()> {
        if self.endpoint.read_frame(&mut frame.samples) > 0 {
            frame.frame_type = FrameType::Audio;
            frame.timestamp = self.timestamp;
            self.timestamp += self.info.samples_per_frame as u64;
        } else {
            frame.frame_type = FrameType::None;
        }
        Ok(())
    }

    fn put_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.is_audio() {
            self.endpoint.write_frame(&frame.samples);
        }
        Ok(())
    }

    fn status(&self) -> PortStatus {
        PortStatus {
            direction: self.endpoint.direction(),
            io: self.endpoint.status().clone(),
        }
    }
}
