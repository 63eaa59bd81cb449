/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Lock Entry Registry
//!
//! Owns the two ordered collections every lock entry moves through:
//! - the *wait queue*, ordered by request (entry id), together with the wakers of pending `async` acquires
//! - the *granted list*, ordered by the time of the grant
//!
//! Each collection is guarded by its own mutex so a release (granted list only) never has to wait for an enqueue
//! (wait queue only). Whoever needs both locks them in the order wait queue → granted list, [Registry::lock_lists]
//! is the only place doing so.
//!
//! Blocking acquirers sleep on a condition variable paired with the wait queue mutex. The state of an entry only
//! changes while the wait queue lock is held (a granted entry is released under the granted list lock, but nobody
//! waits for that), so a sleeper can never miss its grant.
//!
//! Wakers of `async` acquires are never called while a registry lock is held, a waker may well poll its task inline
//! and come back into the lock. Removing an entry from the queue only parks its waker, the caller takes the parked
//! wakers with [WaitQueue::take_woken] and wakes them after unlocking.

use super::entry::{EntryId, EntrySnapshot, EntryState, LockEntry, LockKind};
use crate::config::ReleasePolicy;
use crate::error::{OrientLockError, Result};
use crate::orientation::OrientationRange;
use crate::owner::OwnerId;
use core::sync::atomic::{AtomicU64, Ordering};
use core::task::{Poll, Waker};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    entries: BTreeMap<EntryId, Arc<LockEntry>>,
    /// wakers of `async` acquires that could not be granted yet, keyed like the entries they belong to
    wakers: BTreeMap<EntryId, Waker>,
    /// wakers of entries that left the queue, to be woken once the locks are gone
    woken: Vec<Waker>,
}

impl WaitQueue {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// The waiting entries in request order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<LockEntry>> {
        self.entries.values()
    }

    /// Take an entry out of the queue for good. The waker of its `async` requester, if any, is parked in
    /// [WaitQueue::take_woken].
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<Arc<LockEntry>> {
        let entry = self.entries.remove(&id)?;
        if let Some(waker) = self.wakers.remove(&id) {
            self.woken.push(waker);
        }
        Some(entry)
    }

    /// The wakers of every entry removed since the last call. Wake them only after the registry locks are dropped.
    pub(crate) fn take_woken(&mut self) -> Vec<Waker> {
        core::mem::take(&mut self.woken)
    }
}

#[derive(Debug, Default)]
pub(crate) struct GrantedList {
    entries: Vec<Arc<LockEntry>>,
}

impl GrantedList {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<LockEntry>> {
        self.entries.iter()
    }

    pub(crate) fn push(&mut self, entry: Arc<LockEntry>) {
        self.entries.push(entry);
    }

    /// Keep only the entries the predicate agrees to. Removed entries are handed to `removed` in list order.
    pub(crate) fn retain_or_else<P, R>(&mut self, mut keep: P, mut removed: R)
    where
        P: FnMut(&LockEntry) -> bool,
        R: FnMut(Arc<LockEntry>),
    {
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if keep(&entry) {
                kept.push(entry);
            } else {
                removed(entry);
            }
        }
        self.entries = kept;
    }

    /// `true` if any granted entry of `kind` has exactly this range.
    pub(crate) fn holds(&self, range: &OrientationRange, kind: Option<LockKind>) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.range == *range && kind.map_or(true, |kind| entry.kind == kind))
    }
}

/// Both lists, locked in the fixed order.
pub(crate) struct Lists<'a> {
    pub(crate) waiting: MutexGuard<'a, WaitQueue>,
    pub(crate) granted: MutexGuard<'a, GrantedList>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    waiting: Mutex<WaitQueue>,
    granted: Mutex<GrantedList>,
    wakeup: Condvar,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a new entry to the tail of the wait queue.
    pub(crate) fn enqueue(
        &self,
        owner: OwnerId,
        range: OrientationRange,
        kind: LockKind,
        max_entries: Option<usize>,
    ) -> Result<Arc<LockEntry>> {
        let mut waiting = self.waiting.lock();
        if let Some(limit) = max_entries {
            // wait queue → granted list, same order as everywhere else
            let live = waiting.len() + self.granted.lock().len();
            if live >= limit {
                return Err(OrientLockError::ResourceExhausted { limit });
            }
        }

        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = Arc::new(LockEntry::new(id, range, kind, owner));
        waiting.entries.insert(id, Arc::clone(&entry));
        debug!(%id, %owner, %kind, %range, "lock request queued");
        Ok(entry)
    }

    /// Block the current thread until the entry leaves the wait queue. Wake-ups for other entries are simply slept
    /// through again.
    pub(crate) fn wait_granted(&self, entry: &LockEntry) -> Result<()> {
        let mut waiting = self.waiting.lock();
        loop {
            match entry.state() {
                EntryState::Waiting => self.wakeup.wait(&mut waiting),
                state => return outcome(entry, state),
            }
        }
    }

    /// Non blocking version of [Registry::wait_granted] for `async` acquires. If the entry is still waiting the
    /// waker is stored to be woken once the entry leaves the queue.
    pub(crate) fn poll_granted(&self, entry: &LockEntry, waker: &Waker) -> Poll<Result<()>> {
        let mut waiting = self.waiting.lock();
        match entry.state() {
            EntryState::Waiting => {
                waiting.wakers.insert(entry.id, waker.clone());
                Poll::Pending
            }
            state => Poll::Ready(outcome(entry, state)),
        }
    }

    /// The requester lost interest in the entry. A waiting entry is dropped from the queue, an entry that got
    /// granted in the meantime is released again.
    pub(crate) fn withdraw(&self, entry: &LockEntry) {
        let mut lists = self.lock_lists();
        match entry.state() {
            EntryState::Waiting => {
                lists.waiting.wakers.remove(&entry.id);
                if lists.waiting.entries.remove(&entry.id).is_some() {
                    entry.transition(EntryState::Abandoned);
                    debug!(id = %entry.id, "lock request withdrawn");
                }
            }
            EntryState::Granted => {
                lists.granted.retain_or_else(
                    |held| held.id != entry.id,
                    |dropped| {
                        dropped.transition(EntryState::Released);
                        debug!(id = %dropped.id, "unclaimed grant released");
                    },
                );
            }
            _ => {}
        }
    }

    /// Remove the first granted entry matching range and kind that `owner` is allowed to release.
    pub(crate) fn release(
        &self,
        owner: OwnerId,
        range: &OrientationRange,
        kind: LockKind,
        policy: ReleasePolicy,
    ) -> Result<()> {
        let owner_must_match = match (policy, kind) {
            (ReleasePolicy::OwnerOnly, _) => true,
            (ReleasePolicy::ReaderOwnerOnly, LockKind::Reader) => true,
            (ReleasePolicy::ReaderOwnerOnly, LockKind::Writer) => false,
        };

        let mut granted = self.granted.lock();
        let position = granted.entries.iter().position(|entry| {
            entry.kind == kind && entry.range == *range && (!owner_must_match || entry.owner == owner)
        });
        match position {
            Some(index) => {
                let entry = granted.entries.remove(index);
                entry.transition(EntryState::Released);
                debug!(id = %entry.id, %owner, %kind, "lock released");
                Ok(())
            }
            None => Err(OrientLockError::NoMatchingEntry { kind }),
        }
    }

    pub(crate) fn lock_lists(&self) -> Lists<'_> {
        let waiting = self.waiting.lock();
        let granted = self.granted.lock();
        Lists { waiting, granted }
    }

    /// Broadcast to every blocked acquirer, each re-checks its own entry.
    pub(crate) fn notify_all(&self) {
        self.wakeup.notify_all();
    }

    pub(crate) fn waiting_len(&self) -> usize {
        self.waiting.lock().len()
    }

    pub(crate) fn granted_len(&self) -> usize {
        self.granted.lock().len()
    }

    pub(crate) fn snapshot(&self) -> (Vec<EntrySnapshot>, Vec<EntrySnapshot>) {
        let lists = self.lock_lists();
        (
            lists.waiting.iter().map(|entry| entry.snapshot()).collect(),
            lists.granted.iter().map(|entry| entry.snapshot()).collect(),
        )
    }
}

impl Lists<'_> {
    /// Move a waiting entry into the granted list.
    pub(crate) fn grant(&mut self, id: EntryId) {
        if let Some(entry) = self.waiting.entries.get(&id).cloned() {
            entry.transition(EntryState::Granted);
            self.waiting.remove(id);
            debug!(%id, owner = %entry.owner, kind = %entry.kind, "lock granted");
            self.granted.push(entry);
        }
    }
}

/// What an acquirer learns about its entry once it left the wait queue.
fn outcome(entry: &LockEntry, state: EntryState) -> Result<()> {
    match state {
        EntryState::Granted => Ok(()),
        EntryState::Reclaimed => Err(OrientLockError::OwnerGone { owner: entry.owner }),
        // the grant was taken away before the acquirer got to see it, `Waiting` never gets here
        EntryState::Released | EntryState::Abandoned | EntryState::Waiting => {
            Err(OrientLockError::NoMatchingEntry { kind: entry.kind })
        }
    }
}
