/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Lock Owners
//!
//! Every lock entry remembers who requested it. The owner identity is used to restrict who may release an entry and
//! to find entries whose owner has gone away without releasing them. Whether an owner is still around is a question
//! only the host environment can answer, so it is asked through the [LivenessProbe] capability.
//!
//! Two probes are provided:
//! - [ProcessLiveness] treats owner ids as OS thread or process ids and inspects `/proc`. Threads identify themselves
//!   with [OwnerId::current_thread].
//! - [OwnerTable] hands out [OwnerHandle]s. An owner is alive for as long as its handle exists, dropping the handle
//!   is the "release on exit" hook.
//!
//! # Example
//! ```
//! use orient_lock::{LivenessProbe, OwnerTable};
//!
//! let table = OwnerTable::new();
//! let handle = table.register();
//! let id = handle.id();
//! assert!(table.is_alive(id));
//! drop(handle);
//! assert!(!table.is_alive(id));
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Identity of the caller that requested a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// The identity of the current OS process. Every thread of the process shares it.
    pub fn current_process() -> Self {
        OwnerId(std::process::id() as u64)
    }

    /// The identity of the calling OS thread, its kernel task id. This is the identity to use with
    /// [ProcessLiveness], a thread that exits while holding a lock is then reclaimed.
    #[cfg(target_os = "linux")]
    pub fn current_thread() -> Self {
        // SAFETY: gettid takes no arguments and cannot fail
        let tid = unsafe { libc::syscall(libc::SYS_gettid) };
        OwnerId(tid as u64)
    }

    /// Without kernel task ids the thread falls back to the identity of its process.
    #[cfg(not(target_os = "linux"))]
    pub fn current_thread() -> Self {
        Self::current_process()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Answers whether a lock owner still exists.
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, owner: OwnerId) -> bool;
}

/// Owner ids are OS thread or process ids. A task counts as alive while `/proc/<id>/stat` exists and it is neither a
/// zombie nor dead. Thread ids are not listed in `/proc` but can still be looked up there.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLiveness;

impl LivenessProbe for ProcessLiveness {
    #[cfg(target_os = "linux")]
    fn is_alive(&self, owner: OwnerId) -> bool {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", owner.0)) else {
            return false;
        };
        // the state is the first field after the parenthesized command name, which may contain blanks itself
        match stat.rfind(')').and_then(|pos| stat[pos + 1..].split_whitespace().next()) {
            Some(state) => !matches!(state, "Z" | "X" | "x"),
            None => false,
        }
    }

    // without procfs there is no portable way to ask, so nobody is ever considered dead
    #[cfg(not(target_os = "linux"))]
    fn is_alive(&self, _owner: OwnerId) -> bool {
        true
    }
}

/// Registration based liveness. Owners register themselves and stay alive until their [OwnerHandle] is dropped.
#[derive(Debug, Clone, Default)]
pub struct OwnerTable {
    inner: Arc<OwnerTableInner>,
}

#[derive(Debug, Default)]
struct OwnerTableInner {
    alive: Mutex<HashSet<OwnerId>>,
    next_id: AtomicU64,
}

impl OwnerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new owner. The returned handle keeps it alive.
    pub fn register(&self) -> OwnerHandle {
        let id = OwnerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.alive.lock().insert(id);
        OwnerHandle {
            id,
            table: Arc::clone(&self.inner),
        }
    }

    /// Number of currently registered owners.
    pub fn len(&self) -> usize {
        self.inner.alive.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LivenessProbe for OwnerTable {
    fn is_alive(&self, owner: OwnerId) -> bool {
        self.inner.alive.lock().contains(&owner)
    }
}

/// Proof of a registered, living owner. Dropping it marks the owner as gone.
#[derive(Debug)]
pub struct OwnerHandle {
    id: OwnerId,
    table: Arc<OwnerTableInner>,
}

impl OwnerHandle {
    pub fn id(&self) -> OwnerId {
        self.id
    }
}

impl Drop for OwnerHandle {
    fn drop(&mut self) {
        self.table.alive.lock().remove(&self.id);
    }
}
