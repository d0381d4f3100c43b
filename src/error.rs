use std::fmt::{self, Display, Formatter};

/// A `raftlog` result.
pub type Result<T> = std::result::Result<T, Error>;

/// All error conditions the replicated-log core can surface: format errors
/// are fatal to [`crate::store::LogStore::load`], I/O and protocol errors are
/// rejected back to the caller, and safety violations mean the node must
/// halt rather than continue with a possibly-corrupt log.
#[derive(Debug)]
pub enum Error {
    /// The on-disk frame stream is corrupt: a bad header byte, length, or
    /// numeric field.
    InvalidFormat(String),
    /// A frame began but the file ended before it finished. Distinct from
    /// [`Error::InvalidFormat`] so callers can tell "corrupt" from
    /// "truncated by a crash" apart.
    UnexpectedEof,
    /// A command name exceeded the fixed bound on encoded command names.
    CommandNameTooLong(String),
    /// An I/O error occurred against the log file.
    Io(std::io::Error),
    /// A `write` persisted fewer bytes than requested.
    ShortWrite { expected: usize, actual: usize },
    /// `fsync` failed.
    SyncFailed(std::io::Error),
    /// Another process already holds the log file open.
    LockHeld,
    /// The leader's `prevLogIndex`/`prevLogTerm` claim doesn't match our log.
    LogMismatch { prev_index: u64, prev_term: u64 },
    /// A batch attempted to truncate the log at or below the commit index —
    /// the safety-violation case; the node must halt rather than proceed.
    TruncationBelowCommit(u64),
    /// `apply` found no command registered under this name.
    UnknownCommand(String),
    /// `apply` found the wrong number of arguments for a registered command.
    BadArity { command: String, argc: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidFormat(msg) => write!(f, "invalid log format: {msg}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file reading the log"),
            Error::CommandNameTooLong(name) => {
                write!(f, "command name {name:?} exceeds the fixed bound")
            }
            Error::Io(err) => write!(f, "log I/O error: {err}"),
            Error::ShortWrite { expected, actual } => {
                write!(f, "short write: expected {expected} bytes, wrote {actual}")
            }
            Error::SyncFailed(err) => write!(f, "fsync failed: {err}"),
            Error::LockHeld => write!(f, "log file is already locked by another process"),
            Error::LogMismatch { prev_index, prev_term } => {
                write!(f, "log mismatch at prev_index={prev_index} prev_term={prev_term}")
            }
            Error::TruncationBelowCommit(index) => {
                write!(f, "refused to truncate at index {index} at or below the commit index")
            }
            Error::UnknownCommand(name) => write!(f, "unknown command {name:?}"),
            Error::BadArity { command, argc } => {
                write!(f, "wrong number of arguments ({argc}) for command {command:?}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) | Error::SyncFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
