//! The replicated-log core of a Raft-style consensus node.
//!
//! This crate owns:
//! - durably persisting an ordered sequence of replicated log entries to a
//!   single append-only file ([`store`]),
//! - a length-prefixed on-disk frame format for one entry ([`codec`]),
//! - the Raft log-matching and conflict-truncation rules applied to
//!   leader-pushed batches ([`enforcer`]),
//! - a monotone commit index and an exactly-once apply pipeline into a
//!   user-supplied state machine ([`commit`], [`command`]).
//!
//! Cluster membership, leader election, RPC framing, client admission, and
//! the top-level server loop are out of scope: they are external
//! collaborators that drive [`core::LogCore`] through its public methods.

pub mod codec;
pub mod command;
pub mod commit;
pub mod config;
pub mod entry;
pub mod enforcer;
pub mod error;
pub mod store;

mod core;

pub use command::{CommandOutcome, CommandRegistry};
pub use core::{LogCore, Role};
pub use entry::{Entry, Index, Term};
pub use error::{Error, Result};
