//! The error type shared by capture, the stream codec, and replay.

use std::{fmt, io};

/// Everything that can go wrong while capturing, storing, or replaying a trace.
#[derive(Debug)]
pub enum Error {
    /// The byte stream is not what we expected: a checkpoint didn't match, a
    /// packet id was skipped, an opcode was unknown, or the data ended early.
    /// Our position in the stream is now meaningless, so this is always fatal.
    StreamCorruption(String),

    /// The other end of the capture channel went away. The capture loop treats
    /// this as a request to shut down cleanly.
    NetworkDisconnect,

    /// Some entry point or parameter isn't handled yet. Usually this is only
    /// logged, once, and capture continues with reduced fidelity.
    UnimplementedCoverage(&'static str),

    /// The caller asked for something that makes no sense in the current state.
    InvalidUsage(&'static str),

    /// Any other I/O error from the underlying file or socket.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn corruption<S: Into<String>>(what: S) -> Error {
        Error::StreamCorruption(what.into())
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::NetworkDisconnect)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::StreamCorruption("trace stream ended unexpectedly".to_string())
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Error::NetworkDisconnect,
            _ => Error::Io(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::StreamCorruption(what) => write!(fmt, "gl-trace stream corrupted: {}", what),
            Error::NetworkDisconnect => fmt.write_str("gl-trace peer disconnected"),
            Error::UnimplementedCoverage(what) => {
                write!(fmt, "gl-trace does not implement {}", what)
            }
            Error::InvalidUsage(what) => write!(fmt, "gl-trace invalid usage: {}", what),
            Error::Io(err) => write!(fmt, "gl-trace I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

#[test]
fn test_io_error_kinds() {
    fn check(kind: io::ErrorKind) -> Error {
        Error::from(io::Error::new(kind, "test"))
    }

    assert!(matches!(check(io::ErrorKind::UnexpectedEof), Error::StreamCorruption(_)));
    assert!(check(io::ErrorKind::ConnectionReset).is_disconnect());
    assert!(check(io::ErrorKind::BrokenPipe).is_disconnect());
    assert!(matches!(check(io::ErrorKind::PermissionDenied), Error::Io(_)));
}
