//! Stream handles and their translation into a canonical OS stream

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::path::PathBuf;

/// Raw file descriptor number as handed out by the C runtime
pub type RawDescriptor = i32;

/// Raw OS handle value (identical to a descriptor on Unix)
pub type RawNativeHandle = isize;

/// Source or sink of raw PCM bytes for one half of an endpoint
#[derive(Debug, Default)]
pub enum StreamHandle {
    /// Half is absent
    #[default]
    None,
    /// Borrowed descriptor; never closed by the endpoint
    Descriptor(RawDescriptor),
    /// Borrowed native OS handle; never closed by the endpoint
    NativeHandle(RawNativeHandle),
    /// Open file, owned and closed by the endpoint
    File(File),
    /// Path opened (and owned) by the endpoint
    Path(PathBuf),
}

impl StreamHandle {
    /// Whether the handle names a stream at all
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Build a handle from a raw integer, `-1` meaning absent
    ///
    /// With [`FdPortFlags::native_handles`] set the value is taken as an OS
    /// handle, otherwise as a descriptor.
    pub fn from_raw(value: i64, flags: FdPortFlags) -> Self {
        if value < 0 {
            return Self::None;
        }
        if flags.native_handles {
            match RawNativeHandle::try_from(value) {
                Ok(handle) => Self::NativeHandle(handle),
                Err(_) => Self::None,
            }
        } else {
            match RawDescriptor::try_from(value) {
                Ok(fd) => Self::Descriptor(fd),
                Err(_) => Self::None,
            }
        }
    }
}

impl From<File> for StreamHandle {
    fn from(file: File) -> Self {
        Self::File(file)
    }
}

impl From<PathBuf> for StreamHandle {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for StreamHandle {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// Port creation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FdPortFlags {
    /// Put the streams in non-blocking mode and buffer I/O internally
    pub nonblocking: bool,
    /// Raw values are native OS handles rather than descriptors
    pub native_handles: bool,
}

impl FdPortFlags {
    /// Non-blocking bit
    pub const NONBLOCK: u32 = 1;
    /// Native handle bit
    pub const HANDLES: u32 = 2;

    /// Decode from a bit set; unknown bits are ignored
    pub fn from_bits(bits: u32) -> Self {
        Self {
            nonblocking: bits & Self::NONBLOCK != 0,
            native_handles: bits & Self::HANDLES != 0,
        }
    }

    /// Encode as a bit set
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.nonblocking {
            bits |= Self::NONBLOCK;
        }
        if self.native_handles {
            bits |= Self::HANDLES;
        }
        bits
    }

    /// Flags with non-blocking I/O enabled
    pub fn nonblocking() -> Self {
        Self {
            nonblocking: true,
            ..Default::default()
        }
    }
}

/// Which half a stream is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Half {
    Input,
    Output,
}

/// Canonical stream: every handle flavour ends up as a `File`
#[derive(Debug)]
pub(crate) enum Stream {
    Owned(File),
    /// Wraps a descriptor the caller still owns; never dropped
    Borrowed(ManuallyDrop<File>),
}

impl Stream {
    fn file(&mut self) -> &mut File {
        match self {
            Self::Owned(file) => file,
            Self::Borrowed(file) => file,
        }
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        match self {
            Self::Owned(file) => file.as_raw_fd(),
            Self::Borrowed(file) => file.as_raw_fd(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file().read(buf)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file().flush()
    }
}

/// Turn a handle into a canonical stream
///
/// `Ok(None)` means the half is absent. An `Err` means the handle was given
/// but is unusable; the caller degrades that half.
pub(crate) fn open_stream(
    handle: StreamHandle,
    half: Half,
    flags: FdPortFlags,
) -> io::Result<Option<Stream>> {
    let stream = match handle {
        StreamHandle::None => return Ok(None),
        StreamHandle::File(file) => Stream::Owned(file),
        StreamHandle::Path(path) => {
            let file = match half {
                Half::Input => File::open(&path)?,
                Half::Output => OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)?,
            };
            Stream::Owned(file)
        }
        StreamHandle::Descriptor(fd) => borrow_descriptor(fd, flags.native_handles)?,
        StreamHandle::NativeHandle(handle) => borrow_native(handle)?,
    };

    if flags.nonblocking {
        set_nonblocking(&stream)?;
    }
    Ok(Some(stream))
}

#[cfg(unix)]
fn borrow_descriptor(fd: RawDescriptor, _native: bool) -> io::Result<Stream> {
    use nix::fcntl::{fcntl, FcntlArg};
    use std::os::unix::io::FromRawFd;

    if fd < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("negative descriptor {fd}"),
        ));
    }
    // EBADF when the descriptor is not open
    fcntl(fd, FcntlArg::F_GETFL)?;

    // SAFETY: the descriptor was just checked to be open and the File is
    // wrapped in ManuallyDrop, so it is never closed here.
    let file = unsafe { File::from_raw_fd(fd) };
    Ok(Stream::Borrowed(ManuallyDrop::new(file)))
}

#[cfg(unix)]
fn borrow_native(handle: RawNativeHandle) -> io::Result<Stream> {
    let fd = RawDescriptor::try_from(handle).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("handle {handle} is not a descriptor"),
        )
    })?;
    borrow_descriptor(fd, true)
}

#[cfg(unix)]
fn set_nonblocking(stream: &Stream) -> io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};

    let fd = stream.raw_fd();
    let bits = fcntl(fd, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(bits);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

#[cfg(windows)]
fn borrow_descriptor(fd: RawDescriptor, native: bool) -> io::Result<Stream> {
    if fd < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("negative descriptor {fd}"),
        ));
    }
    if native {
        return borrow_native(fd as RawNativeHandle);
    }
    // SAFETY: _get_osfhandle validates the descriptor and returns -1 when
    // it is not open.
    let handle = unsafe { libc::get_osfhandle(fd) };
    borrow_native(handle as RawNativeHandle)
}

#[cfg(windows)]
fn borrow_native(handle: RawNativeHandle) -> io::Result<Stream> {
    use std::os::windows::io::{FromRawHandle, RawHandle};

    if handle == -1 || handle == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid handle {handle}"),
        ));
    }
    // SAFETY: the handle stays owned by the caller; ManuallyDrop keeps the
    // File from closing it.
    let file = unsafe { File::from_raw_handle(handle as RawHandle) };
    Ok(Stream::Borrowed(ManuallyDrop::new(file)))
}

#[cfg(windows)]
fn set_nonblocking(_stream: &Stream) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "non-blocking streams are not available on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(FdPortFlags::from_bits(0), FdPortFlags::default());
        assert_eq!(FdPortFlags::from_bits(3).bits(), 3);
        assert!(FdPortFlags::from_bits(1).nonblocking);
        assert!(!FdPortFlags::from_bits(1).native_handles);
        assert!(FdPortFlags::from_bits(2).native_handles);
        // Unknown bits are dropped
        assert_eq!(FdPortFlags::from_bits(0xf0).bits(), 0);
    }

    #[test]
    fn test_from_raw() {
        let flags = FdPortFlags::default();
        assert!(StreamHandle::from_raw(-1, flags).is_none());
        assert!(matches!(StreamHandle::from_raw(3, flags), StreamHandle::Descriptor(3)));

        let native = FdPortFlags::from_bits(FdPortFlags::HANDLES);
        assert!(matches!(StreamHandle::from_raw(3, native), StreamHandle::NativeHandle(3)));
    }

    #[test]
    fn test_absent_handle_opens_nothing() {
        let stream = open_stream(StreamHandle::None, Half::Input, FdPortFlags::default()).unwrap();
        assert!(stream.is_none());
    }

    #[test]
    fn test_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pcm");
        let result = open_stream(StreamHandle::Path(missing), Half::Input, FdPortFlags::default());
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unopened_descriptor_is_rejected() {
        // Far above any descriptor the test process holds
        let result = open_stream(StreamHandle::Descriptor(999_999), Half::Output, FdPortFlags::default());
        assert!(result.is_err());

        let result = open_stream(StreamHandle::Descriptor(-5), Half::Input, FdPortFlags::default());
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_borrowed_descriptor_stays_open() {
        use std::os::unix::io::AsRawFd;

        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        {
            let stream = open_stream(StreamHandle::Descriptor(fd), Half::Output, FdPortFlags::default())
                .unwrap()
                .unwrap();
            assert!(stream.is_borrowed());
        }
        assert!(nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_GETFL).is_ok());
    }
}
