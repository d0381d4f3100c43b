//! The replicated log's data model: entries, and in-memory records.

/// A log index. Starts at 1. 0 indicates no index (empty log).
pub type Index = u64;

/// A Raft term. 0 indicates no term has been seen.
pub type Term = u64;

/// Upper bound on the encoded length of a command name, in bytes.
pub const MAX_COMMAND_NAME_LEN: usize = 16;

/// A single entry in the replicated log: `(index, term, command_name, command)`.
///
/// Indexes are dense and start at 1. Terms are non-decreasing with index. The
/// command is an opaque byte string in the whitespace/quoting-aware textual
/// format the state machine dispatcher parses (see [`crate::command`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub index: Index,
    pub term: Term,
    pub command_name: String,
    pub command: Vec<u8>,
}

impl Entry {
    pub fn new(index: Index, term: Term, command_name: impl Into<String>, command: impl Into<Vec<u8>>) -> Self {
        Self { index, term, command_name: command_name.into(), command: command.into() }
    }
}

/// An entry augmented with the byte offset in the log file at which its
/// encoded frame begins. Used exclusively by truncation to compute the new
/// file length.
#[derive(Debug)]
pub(crate) struct Record {
    pub entry: Entry,
    pub position: u64,
}
