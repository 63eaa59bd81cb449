/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Lock Entry
//!
//! The record tracking one pending or granted lock request. An entry lives in exactly one of the registry lists at a
//! time. The caller that created it keeps a shared reference to observe the moment it gets granted.

use crate::orientation::OrientationRange;
use crate::owner::OwnerId;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Reader,
    Writer,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Reader => f.write_str("reader"),
            LockKind::Writer => f.write_str("writer"),
        }
    }
}

/// Entries are numbered in request order, a smaller id was requested earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Lifecycle of a lock entry. `Waiting` and `Granted` are the live states, the others are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EntryState {
    Waiting = 0,
    Granted = 1,
    Released = 2,
    Reclaimed = 3,
    /// the requester withdrew before the entry got granted
    Abandoned = 4,
}

impl EntryState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => EntryState::Waiting,
            1 => EntryState::Granted,
            2 => EntryState::Released,
            3 => EntryState::Reclaimed,
            _ => EntryState::Abandoned,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LockEntry {
    pub(crate) id: EntryId,
    pub(crate) range: OrientationRange,
    pub(crate) kind: LockKind,
    pub(crate) owner: OwnerId,
    state: AtomicU8,
}

impl LockEntry {
    pub(crate) fn new(id: EntryId, range: OrientationRange, kind: LockKind, owner: OwnerId) -> Self {
        Self {
            id,
            range,
            kind,
            owner,
            state: AtomicU8::new(EntryState::Waiting as u8),
        }
    }

    pub(crate) fn state(&self) -> EntryState {
        EntryState::from_raw(self.state.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn is_granted(&self) -> bool {
        self.state() == EntryState::Granted
    }

    /// Move the entry to its next state. Only `Waiting -> *` and `Granted -> Released | Reclaimed` are legal, an entry
    /// is never granted twice and never becomes `Waiting` again.
    pub(crate) fn transition(&self, next: EntryState) {
        let previous = EntryState::from_raw(self.state.swap(next as u8, Ordering::AcqRel));
        debug_assert!(
            matches!(
                (previous, next),
                (EntryState::Waiting, EntryState::Granted)
                    | (EntryState::Waiting, EntryState::Reclaimed)
                    | (EntryState::Waiting, EntryState::Abandoned)
                    | (EntryState::Granted, EntryState::Released)
                    | (EntryState::Granted, EntryState::Reclaimed)
            ),
            "{} moved from {:?} to {:?}",
            self.id,
            previous,
            next
        );
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            range: self.range,
            kind: self.kind,
            owner: self.owner,
        }
    }
}

/// A point in time copy of a lock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub range: OrientationRange,
    pub kind: LockKind,
    pub owner: OwnerId,
}
