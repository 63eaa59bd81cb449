/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Admission Engine
//!
//! Walks the wait queue after every orientation update and grants whatever is legal under the new orientation:
//! - the entry's range has to contain the current orientation
//! - a reader is only granted if no writer holds the same range and, with writer preference, no writer for the same
//!   range is still waiting ahead of it
//! - a writer is only granted if nobody holds the same range at all
//!
//! Two ranges only conflict if they are equal in all fields, overlapping ranges are independent locks.

use super::entry::{EntryId, LockEntry, LockKind};
use super::registry::{GrantedList, Lists};
use crate::matcher::{in_range, AzimuthPolicy};
use crate::orientation::{Orientation, OrientationRange};
use std::collections::HashSet;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub(crate) struct AdmissionPolicy {
    pub(crate) azimuth: AzimuthPolicy,
    pub(crate) writer_preference: bool,
}

/// Grant every admissible waiter in request order and return the ids granted.
///
/// Every waiter is checked against the granted list, so a pass costs O(waiters × granted). Waiter counts are
/// expected to be small.
pub(crate) fn evaluate_waiters(
    lists: &mut Lists<'_>,
    current: &Orientation,
    policy: AdmissionPolicy,
) -> Vec<EntryId> {
    let mut granted_ids = Vec::new();
    // ranges of writers that were looked at in this pass but stay in the queue
    let mut blocked_writers: HashSet<OrientationRange> = HashSet::new();

    let candidates: Vec<_> = lists.waiting.iter().cloned().collect();
    for entry in candidates {
        let admitted = in_range(&entry.range, current, policy.azimuth)
            && admissible(&entry, &lists.granted, &blocked_writers, policy.writer_preference);
        trace!(id = %entry.id, kind = %entry.kind, admitted, "evaluated waiter");

        if admitted {
            lists.grant(entry.id);
            granted_ids.push(entry.id);
        } else if entry.kind == LockKind::Writer {
            blocked_writers.insert(entry.range);
        }
    }
    granted_ids
}

fn admissible(
    entry: &LockEntry,
    granted: &GrantedList,
    blocked_writers: &HashSet<OrientationRange>,
    writer_preference: bool,
) -> bool {
    match entry.kind {
        LockKind::Reader => {
            !granted.holds(&entry.range, Some(LockKind::Writer))
                && !(writer_preference && blocked_writers.contains(&entry.range))
        }
        LockKind::Writer => !granted.holds(&entry.range, None),
    }
}
