/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Sync Locking
//!
//! The blocking orientation lock and the machinery behind it.

mod entry;
pub use entry::{EntryId, EntrySnapshot, LockKind};
#[cfg(any(feature = "async_locks", doc))]
pub(crate) use entry::LockEntry;

mod registry;

mod admission;

mod reclaim;

// re-export the orientation read/write lock
mod orientlock;
pub use orientlock::*;
