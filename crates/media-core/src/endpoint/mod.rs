//! PCM stream endpoint
//!
//! Wraps an optional input and an optional output byte stream carrying
//! headerless little-endian 16-bit PCM. Reads and writes are sized in whole
//! frames and never fail: trouble on either half degrades that half to
//! silence (input) or discard (output) and is recorded in the
//! [`EndpointStatus`].
//!
//! In non-blocking mode both halves are switched to `O_NONBLOCK` and I/O goes
//! through per-direction buffers of [`FD_BUF_SIZE`] bytes, so a slow reader
//! or writer on the other side never stalls the bridge clock.

mod handle;

pub use handle::{FdPortFlags, RawDescriptor, RawNativeHandle, StreamHandle};

use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::format::{AudioFormat, Sample};
use crate::frame::{decode_pcm, encode_pcm};
use crate::status::{Direction, EndpointStatus, IoWarning};

use handle::{open_stream, Half, Stream};

/// Size of each non-blocking I/O buffer in bytes
pub const FD_BUF_SIZE: usize = 131072;

/// Read chunk used when topping up the input buffer
const READ_CHUNK: usize = 4096;

#[derive(Debug)]
struct Input {
    stream: Stream,
    buf: BytesMut,
    /// Peer reached end of stream; buffered bytes may remain
    eof: bool,
}

#[derive(Debug)]
struct Output {
    stream: Stream,
    pending: BytesMut,
}

/// Endpoint over an input and/or output PCM byte stream
#[derive(Debug)]
pub struct PcmStreamEndpoint {
    input: Option<Input>,
    output: Option<Output>,
    direction: Direction,
    format: AudioFormat,
    nonblocking: bool,
    scratch: BytesMut,
    status: EndpointStatus,
}

impl PcmStreamEndpoint {
    /// Open an endpoint over the given handles
    ///
    /// A handle that is given but unusable is logged and treated as absent.
    /// Fails with [`Error::InvalidHandle`] when neither half is usable.
    pub fn open(
        input: StreamHandle,
        output: StreamHandle,
        flags: FdPortFlags,
        format: AudioFormat,
    ) -> Result<Self> {
        if format.bits_per_sample != 16 {
            return Err(Error::UnsupportedFormat(format!(
                "{} bits per sample",
                format.bits_per_sample
            )));
        }
        if cfg!(not(unix)) && flags.nonblocking {
            return Err(Error::NotSupported(
                "non-blocking descriptors on this platform".to_string(),
            ));
        }
        if input.is_none() && output.is_none() {
            return Err(Error::InvalidHandle(
                "neither input nor output handle given".to_string(),
            ));
        }

        let input = Self::open_half(input, Half::Input, flags).map(|stream| Input {
            stream,
            buf: BytesMut::with_capacity(if flags.nonblocking { FD_BUF_SIZE } else { 0 }),
            eof: false,
        });
        let output = Self::open_half(output, Half::Output, flags).map(|stream| Output {
            stream,
            pending: BytesMut::new(),
        });

        if input.is_none() && output.is_none() {
            return Err(Error::InvalidHandle(
                "neither input nor output handle is usable".to_string(),
            ));
        }

        let direction = Direction::from_halves(input.is_some(), output.is_some());
        debug!(
            "Opened PCM endpoint: direction={:?}, format={}, nonblocking={}",
            direction,
            format.description(),
            flags.nonblocking
        );

        Ok(Self {
            input,
            output,
            direction,
            format,
            nonblocking: flags.nonblocking,
            scratch: BytesMut::new(),
            status: EndpointStatus::default(),
        })
    }

    fn open_half(handle: StreamHandle, half: Half, flags: FdPortFlags) -> Option<Stream> {
        match open_stream(handle, half, flags) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot use {:?} stream, treating it as absent: {}", half, e);
                None
            }
        }
    }

    /// Which halves were usable at open time
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sample format of the streams
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Whether I/O is buffered and non-blocking
    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// I/O counters and degradation flags
    pub fn status(&self) -> &EndpointStatus {
        &self.status
    }

    /// Bytes waiting in the output buffer
    pub fn pending_output(&self) -> usize {
        self.output.as_ref().map_or(0, |o| o.pending.len())
    }

    /// Fill `dst` with the next frame from the input
    ///
    /// Returns the number of samples read from the stream; the rest of `dst`
    /// is zeroed. Zero means no audio this tick: the input is absent, at end
    /// of stream, failed, or (non-blocking) has less than a frame buffered.
    pub fn read_frame(&mut self, dst: &mut [Sample]) -> usize {
        let read = if self.nonblocking {
            self.read_nonblocking(dst)
        } else {
            self.read_blocking(dst)
        };

        dst[read..].iter_mut().for_each(|s| *s = 0);
        if read > 0 {
            self.status.frames_read += 1;
        }
        read
    }

    fn read_blocking(&mut self, dst: &mut [Sample]) -> usize {
        if self.status.input_eos {
            return 0;
        }
        let Some(input) = self.input.as_mut() else {
            return 0;
        };

        let want = dst.len() * 2;
        let have = input.buf.len();
        if have < want {
            input.buf.resize(want, 0);
            let result = loop {
                match input.stream.read(&mut input.buf[have..]) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            };
            match result {
                Ok(n) => input.buf.truncate(have + n),
                Err(e) => {
                    input.buf.truncate(have);
                    return self.fail_input(e);
                }
            }
        }

        if input.buf.len() < 2 {
            // A zero-length read is end of stream
            return self.exhaust_input();
        }
        let read = decode_pcm(&mut input.buf, dst);
        if read < dst.len() {
            self.status.underruns += 1;
        }
        read
    }

    fn read_nonblocking(&mut self, dst: &mut [Sample]) -> usize {
        if self.status.input_eos {
            return 0;
        }
        let Some(input) = self.input.as_mut() else {
            return 0;
        };

        let mut chunk = [0u8; READ_CHUNK];
        while !input.eof && input.buf.len() < FD_BUF_SIZE {
            let room = (FD_BUF_SIZE - input.buf.len()).min(READ_CHUNK);
            match input.stream.read(&mut chunk[..room]) {
                Ok(0) => input.eof = true,
                Ok(n) => input.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return self.fail_input(e),
            }
        }

        let want = dst.len() * 2;
        if input.buf.len() >= want {
            return decode_pcm(&mut input.buf, dst);
        }
        if !input.eof {
            self.status.underruns += 1;
            return 0;
        }
        if input.buf.len() >= 2 {
            // Tail of the stream, padded with silence
            self.status.underruns += 1;
            return decode_pcm(&mut input.buf, dst);
        }
        self.exhaust_input()
    }

    fn exhaust_input(&mut self) -> usize {
        self.status.input_eos = true;
        if self.status.raise(IoWarning::InputExhausted) {
            debug!("PCM input reached end of stream, sourcing silence");
        }
        0
    }

    fn fail_input(&mut self, e: io::Error) -> usize {
        self.status.input_eos = true;
        if self.status.raise(IoWarning::InputFailed) {
            warn!("PCM input failed, sourcing silence: {}", e);
        }
        0
    }

    /// Hand one frame to the output
    ///
    /// Always reports the whole frame as written. Frames the sink cannot take
    /// are dropped and counted instead of blocking or failing the caller.
    pub fn write_frame(&mut self, src: &[Sample]) -> usize {
        if self.output.is_none() || self.status.output_closed {
            return src.len();
        }

        self.scratch.clear();
        encode_pcm(src, &mut self.scratch);

        let outcome = if self.nonblocking {
            self.write_nonblocking()
        } else {
            self.write_blocking()
        };

        match outcome {
            Ok(true) => self.status.frames_written += 1,
            Ok(false) => {
                self.status.frames_dropped += 1;
                if self.status.raise(IoWarning::OutputOverflow) {
                    warn!("PCM output buffer full, dropping frames");
                }
            }
            Err(e) => {
                self.status.frames_dropped += 1;
                self.status.output_closed = true;
                if self.status.raise(IoWarning::OutputClosed) {
                    warn!("PCM output closed, discarding frames: {}", e);
                }
            }
        }
        src.len()
    }

    /// `Ok(false)` when the frame was dropped for lack of room
    ///
    /// A descriptor handed over already in non-blocking mode can stop part
    /// way through a frame; the unwritten tail is buffered so the stream
    /// stays sample aligned, and later frames go through the buffered path.
    fn write_blocking(&mut self) -> io::Result<bool> {
        let Some(output) = self.output.as_mut() else {
            return Ok(true);
        };
        if !output.pending.is_empty() {
            return self.write_nonblocking();
        }

        let mut frame = &self.scratch[..];
        while !frame.is_empty() {
            match output.stream.write(frame) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => frame = &frame[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if frame.len() == self.scratch.len() {
                        return Ok(false);
                    }
                    trace!("Short write, buffering {} bytes", frame.len());
                    output.pending.extend_from_slice(frame);
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    fn write_nonblocking(&mut self) -> io::Result<bool> {
        let Some(output) = self.output.as_mut() else {
            return Ok(true);
        };

        flush_pending(output)?;

        let mut frame = &self.scratch[..];
        if output.pending.is_empty() {
            let written = loop {
                match output.stream.write(frame) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break 0,
                    Err(e) => return Err(e),
                }
            };
            frame = &frame[written..];
        }
        if frame.is_empty() {
            return Ok(true);
        }
        if output.pending.len() + frame.len() > FD_BUF_SIZE {
            return Ok(false);
        }
        output.pending.extend_from_slice(frame);
        Ok(true)
    }
}

/// Write out buffered bytes until the sink stops accepting them
fn flush_pending(output: &mut Output) -> io::Result<()> {
    while !output.pending.is_empty() {
        match output.stream.write(&output.pending) {
            Ok(0) => break,
            Ok(n) => output.pending.advance(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl Drop for PcmStreamEndpoint {
    fn drop(&mut self) {
        if self.status.output_closed {
            return;
        }
        if let Some(output) = self.output.as_mut() {
            let _ = flush_pending(output);
            if !output.pending.is_empty() {
                debug!(
                    "Discarding {} buffered output bytes on close",
                    output.pending.len()
                );
            }
            let _ = output.stream.flush();
        }
    }
}
