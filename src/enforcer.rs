//! Consistency Enforcer: Raft's `prevLogIndex`/`prevLogTerm` verification and
//! conflict-driven truncation when ingesting a leader-pushed batch.

use log::{debug, error, warn};

use crate::entry::{Entry, Index, Term};
use crate::error::{Error, Result};
use crate::store::LogStore;

/// Verifies that `store`'s log agrees with the leader's claim about the
/// entry immediately preceding a batch. `prev_index == 0` always succeeds
/// (the batch starts at the beginning of the log).
pub fn verify_append(store: &LogStore, prev_index: Index, prev_term: Term) -> Result<()> {
    if prev_index == 0 {
        return Ok(());
    }
    if prev_index > store.last_index() {
        warn!("verify_append: missing entries, have last_index={} want prev_index={prev_index}", store.last_index());
        return Err(Error::LogMismatch { prev_index, prev_term });
    }
    if store.term_at(prev_index) != prev_term {
        warn!(
            "verify_append: term mismatch at prev_index={prev_index}: have {}, leader claims {prev_term}",
            store.term_at(prev_index)
        );
        return Err(Error::LogMismatch { prev_index, prev_term });
    }
    Ok(())
}

/// Ingests a complete, already-verified batch: for each entry, append it if
/// absent, skip it if an identical (index, term) pair already exists
/// (idempotent replay), or truncate-and-replace if an existing entry at the
/// same index has a different term. The truncation point and the entries to
/// append are computed up front, before any mutation, so that a crash never
/// leaves a partially-applied batch observable: either the whole batch
/// becomes durable after the trailing `sync`, or none of it does.
///
/// Fails with [`Error::TruncationBelowCommit`] — a fatal safety violation —
/// if the computed truncation point would discard an already-committed
/// entry.
pub fn ingest_batch(store: &mut LogStore, commit_index: Index, prev_index: Index, prev_term: Term, entries: Vec<Entry>) -> Result<()> {
    verify_append(store, prev_index, prev_term)?;

    let mut truncate_at: Option<Index> = None;
    let mut to_append: Vec<Entry> = Vec::with_capacity(entries.len());

    for e in entries {
        if truncate_at.is_some() {
            // Everything from the first conflict onward no longer exists
            // once we truncate, regardless of what used to be on disk there.
            to_append.push(e);
            continue;
        }
        match store.lookup(e.index) {
            None => to_append.push(e),
            Some(existing) if existing.term == e.term => {
                debug!("ingest_batch: entry {} already present with matching term, skipping", e.index);
            }
            Some(existing) => {
                debug!(
                    "ingest_batch: conflict at index {}: have term {}, leader sends term {}",
                    e.index, existing.term, e.term
                );
                truncate_at = Some(e.index);
                to_append.push(e);
            }
        }
    }

    if let Some(index) = truncate_at {
        if index <= commit_index {
            error!("ingest_batch: refusing to truncate at {index}, at or below commit index {commit_index}");
            return Err(Error::TruncationBelowCommit(index));
        }
        store.truncate(index)?;
    }

    for entry in to_append {
        store.append(entry)?;
    }

    store.sync()?;
    Ok(())
}
