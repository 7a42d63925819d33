//! Degraded-I/O reporting for ports and stream endpoints
//!
//! Stream trouble on the tick path never fails a tick. It is recorded here
//! and can be queried through [`ConferenceBridge::port_status`](crate::ConferenceBridge::port_status).

use std::fmt;

/// Which halves of a stream endpoint are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Neither input nor output
    #[default]
    None,
    /// Input only
    ReadOnly,
    /// Output only
    WriteOnly,
    /// Input and output
    ReadWrite,
}

impl Direction {
    /// Derive the direction from the presence of each half
    pub fn from_halves(readable: bool, writable: bool) -> Self {
        match (readable, writable) {
            (true, true) => Self::ReadWrite,
            (true, false) => Self::ReadOnly,
            (false, true) => Self::WriteOnly,
            (false, false) => Self::None,
        }
    }

    /// Whether frames can be read
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Whether frames can be written
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Non-fatal I/O conditions observed on a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoWarning {
    /// Input reached end of stream; the port now sources silence
    InputExhausted,
    /// Reading the input failed; the port now sources silence
    InputFailed,
    /// Output sink is closed or failing; frames are discarded
    OutputClosed,
    /// Output buffer was full and at least one frame was dropped
    OutputOverflow,
}

impl fmt::Display for IoWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InputExhausted => "input exhausted",
            Self::InputFailed => "input failed",
            Self::OutputClosed => "output closed",
            Self::OutputOverflow => "output overflow",
        };
        f.write_str(text)
    }
}

/// Counters and flags of a PCM stream endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointStatus {
    /// Frames delivered with audio read from the input
    pub frames_read: u64,
    /// Frames fully handed to the output
    pub frames_written: u64,
    /// Frames discarded because the output was full or closed
    pub frames_dropped: u64,
    /// Ticks where the input could not supply a whole frame
    pub underruns: u64,
    /// Input reached end of stream
    pub input_eos: bool,
    /// Output is closed
    pub output_closed: bool,
    /// Distinct warnings raised so far, in order of first occurrence
    pub warnings: Vec<IoWarning>,
}

impl EndpointStatus {
    /// Record a warning once
    pub(crate) fn raise(&mut self, warning: IoWarning) -> bool {
        if self.warnings.contains(&warning) {
            return false;
        }
        self.warnings.push(warning);
        true
    }

    /// Whether any degradation was recorded
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Status of a port registered with the bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortStatus {
    /// Which halves the port can serve
    pub direction: Direction,
    /// I/O counters; all zero for ports without a stream endpoint
    pub io: EndpointStatus,
}

impl PortStatus {
    /// Status of a healthy port
    pub fn healthy(direction: Direction) -> Self {
        Self {
            direction,
            io: EndpointStatus::default(),
        }
    }

    /// Whether any degradation was recorded
    pub fn is_degraded(&self) -> bool {
        self.io.is_degraded()
    }

    /// Whether the given warning was raised
    pub fn has_warning(&self, warning: IoWarning) -> bool {
        self.io.warnings.contains(&warning)
    }
}
