//! Error types shared by every operation in the crate.

use std::fmt;
use std::io::Error as IOError;

use nix::errno::Errno;

pub type Result<T> = std::result::Result<T, Error>;

/// The kernel call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlKind {
    ChipInfo,
    LineInfo,
    LineHandle,
    LineEvent,
    GetValues,
    SetValues,
    SetConfig,
}

impl fmt::Display for IoctlKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IoctlKind::ChipInfo => write!(f, "get chip info"),
            IoctlKind::LineInfo => write!(f, "get line info"),
            IoctlKind::LineHandle => write!(f, "get line handle"),
            IoctlKind::LineEvent => write!(f, "get line event"),
            IoctlKind::GetValues => write!(f, "get line values"),
            IoctlKind::SetValues => write!(f, "set line values"),
            IoctlKind::SetConfig => write!(f, "set line config"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("GPIO device not found")]
    NotFound,
    #[error("Permission denied opening GPIO device")]
    PermissionDenied,
    #[error("Not a GPIO character device")]
    NotAGpioChip,
    #[error("Offset {offset} is out of range for a chip with {num_lines} lines")]
    OffsetOutOfRange { offset: u32, num_lines: u32 },
    #[error("Index {index} is out of range for a line bulk of {len} lines")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Line bulk exceeded maximum number of lines: {}", crate::line::MAX_LINES)]
    CapacityExceeded,
    #[error("Line bulk cannot hold lines from different chips")]
    ChipMismatch,
    #[error("Line {0} is already requested")]
    AlreadyRequested(u32),
    #[error("Line {0} is not requested")]
    NotRequested(u32),
    #[error("Line {0} appears more than once in the request")]
    DuplicateOffset(u32),
    #[error("Invalid request: {actual} values supplied for {expected} lines")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Invalid request type: {0}")]
    InvalidRequestType(i32),
    #[error("Invalid request flags: {0}")]
    InvalidFlags(&'static str),
    #[error("Lines were not requested together")]
    HandleMismatch,
    #[error("Line bulk not holding any GPIO lines")]
    EmptySet,
    #[error("Interrupted while waiting on a GPIO line")]
    Interrupted,
    #[error("Ioctl to {kind} failed: {source}")]
    Ioctl { kind: IoctlKind, source: nix::Error },
    #[error(transparent)]
    Io(#[from] IOError),
}

impl Error {
    /// The platform error code behind this error, if there is one.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Ioctl { source, .. } => Some(*source as i32),
            Error::Io(err) => err.raw_os_error(),
            Error::Interrupted => Some(Errno::EINTR as i32),
            _ => None,
        }
    }
}

pub(crate) fn ioctl_err(kind: IoctlKind, cause: nix::Error) -> Error {
    Error::Ioctl {
        kind,
        source: cause,
    }
}

pub(crate) fn errno_err(errno: Errno) -> Error {
    match errno {
        Errno::EINTR => Error::Interrupted,
        other => Error::Io(IOError::from(other)),
    }
}

pub(crate) fn io_err(err: IOError) -> Error {
    match err.kind() {
        std::io::ErrorKind::Interrupted => Error::Interrupted,
        _ => Error::Io(err),
    }
}

/// Translate a failure to open a chip device into the crate taxonomy.
pub(crate) fn open_err(err: IOError) -> Error {
    match err.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => Error::NotFound,
        Some(libc::EACCES) | Some(libc::EPERM) => Error::PermissionDenied,
        Some(libc::ENOTTY) => Error::NotAGpioChip,
        _ => io_err(err),
    }
}
