//! `LogCore`: the explicit, owned handle for a node's replicated log. Bundles
//! the Log Store, the Consistency Enforcer, and the Commit & Apply Engine
//! behind the external interface the cluster layer is expected to drive.

use std::collections::HashMap;
use std::path::Path;

use crossbeam::channel::Sender;
use log::{debug, info};

use crate::command::{CommandOutcome, CommandRegistry};
use crate::commit::{self, CommitState, PendingClient};
use crate::entry::{Entry, Index, Term, MAX_COMMAND_NAME_LEN};
use crate::enforcer;
use crate::error::{Error, Result};
use crate::store::LogStore;

/// The node's role, as tracked by the (out-of-scope) cluster layer and
/// reflected into the core via [`LogCore::set_role`]. Only the `Leader`
/// variant changes apply-time behavior (it consults `pending_clients`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// The replicated-log core: the log file and in-memory index (via
/// [`LogStore`]), the commit/apply state, the command registry, and the
/// leader's pending client continuations.
pub struct LogCore {
    store: LogStore,
    commit: CommitState,
    registry: CommandRegistry,
    pending_clients: HashMap<Index, PendingClient>,
    term: Term,
    role: Role,
}

impl LogCore {
    /// Opens (creating if absent) the log file at `path`, replays it, and
    /// returns a core ready to serve `propose`/`ingest_batch`. Starts as a
    /// `Follower` at term 0; the cluster layer is expected to call
    /// [`LogCore::set_term`] and [`LogCore::set_role`] once it has
    /// established them.
    pub fn open(path: impl AsRef<Path>, registry: CommandRegistry) -> Result<Self> {
        let store = LogStore::load(path)?;
        info!(
            "LogCore opened: last_index={} last_term={} entries={}",
            store.last_index(),
            store.last_term(),
            store.len()
        );
        Ok(Self {
            store,
            commit: CommitState::new(),
            registry,
            pending_clients: HashMap::new(),
            term: 0,
            role: Role::Follower,
        })
    }

    /// Records the current term, as established by the election layer.
    /// `propose` stamps new entries with this term.
    pub fn set_term(&mut self, term: Term) {
        assert!(term >= self.term, "term regression {} -> {term}", self.term);
        self.term = term;
    }

    /// Records the node's current role, as established by the election
    /// layer. Only `Leader` changes apply-time behavior.
    pub fn set_role(&mut self, role: Role) {
        debug!("LogCore: role {:?} -> {role:?}", self.role);
        self.role = role;
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn term(&self) -> Term {
        self.term
    }

    /// Read-only snapshot for AppendEntries construction and election term
    /// checks: `(last_index, last_term, commit_index)`.
    pub fn snapshot_state(&self) -> (Index, Term, Index) {
        (self.store.last_index(), self.store.last_term(), self.commit.commit_index())
    }

    /// Forces an fsync, for external callers that need durability before
    /// replying to a peer.
    pub fn sync_now(&mut self) -> Result<()> {
        self.store.sync()
    }

    pub fn last_index(&self) -> Index {
        self.store.last_index()
    }

    pub fn last_term(&self) -> Term {
        self.store.last_term()
    }

    pub fn term_at(&self, index: Index) -> Term {
        self.store.term_at(index)
    }

    pub fn commit_index(&self) -> Index {
        self.commit.commit_index()
    }

    pub fn last_applied(&self) -> Index {
        self.commit.last_applied()
    }

    pub fn get(&self, index: Index) -> Option<&Entry> {
        self.store.lookup(index)
    }

    /// Leader-only: allocates the next index at the current term, appends
    /// the command, registers a pending client continuation keyed by that
    /// index, and returns the allocated index. Does not sync or commit —
    /// callers that need durability before replying should call
    /// [`LogCore::sync_now`].
    pub fn propose(&mut self, command_name: impl Into<String>, command: Vec<u8>, responder: Sender<CommandOutcome>) -> Result<Index> {
        assert_eq!(self.role, Role::Leader, "propose called on a non-leader core");
        assert!(self.term > 0, "can't propose in term 0");

        let command_name = command_name.into();
        if command_name.len() > MAX_COMMAND_NAME_LEN {
            return Err(Error::CommandNameTooLong(command_name));
        }
        let mut args = crate::command::split_args(&command)?;
        args.insert(0, command_name.clone());

        let index = self.store.last_index() + 1;
        let entry = Entry { index, term: self.term, command_name, command };
        self.store.append(entry)?;
        self.pending_clients.insert(index, PendingClient { args, responder });
        debug!("propose: allocated index {index} at term {}", self.term);
        Ok(index)
    }

    /// Follower path: the full Enforcer + commit pipeline. Verifies
    /// `(prev_index, prev_term)`, applies conflict-truncate-or-append for
    /// each entry, syncs, advances the commit index from `leader_commit`,
    /// and runs the apply loop.
    pub fn ingest_batch(&mut self, prev_index: Index, prev_term: Term, leader_commit: Index, entries: Vec<Entry>) -> Result<()> {
        enforcer::ingest_batch(&mut self.store, self.commit.commit_index(), prev_index, prev_term, entries)?;
        self.commit.advance(leader_commit, self.store.last_index());
        self.apply_ready();
        Ok(())
    }

    /// Advances the commit index from a quorum acknowledgement (leader) or a
    /// leader's advertised commit index (follower heartbeat with no
    /// entries), then runs the apply loop.
    pub fn advance_commit_index(&mut self, leader_commit: Index) {
        self.commit.advance(leader_commit, self.store.last_index());
        self.apply_ready();
    }

    fn apply_ready(&mut self) {
        commit::run_apply_loop(
            &mut self.commit,
            &self.store,
            &self.registry,
            &mut self.pending_clients,
            self.role == Role::Leader,
        );
    }
}
