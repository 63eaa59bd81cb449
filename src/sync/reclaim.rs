/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Reclamation Sweep
//!
//! Removes entries whose owner terminated without releasing them. There is nobody to notify about a reclaimed grant,
//! the owner is gone. The sweep has to complete before the admission of new waiters so that a dead holder never
//! blocks a grant.

use super::entry::EntryState;
use super::registry::{GrantedList, WaitQueue};
use crate::owner::LivenessProbe;
use tracing::info;

/// Drop every granted entry whose owner is no longer alive. Returns the number of entries removed.
pub(crate) fn reclaim_dead_owners(granted: &mut GrantedList, probe: &dyn LivenessProbe) -> usize {
    let mut reclaimed = 0;
    granted.retain_or_else(
        |entry| probe.is_alive(entry.owner),
        |entry| {
            entry.transition(EntryState::Reclaimed);
            info!(id = %entry.id, owner = %entry.owner, kind = %entry.kind, "reclaimed grant of dead owner");
            reclaimed += 1;
        },
    );
    reclaimed
}

/// Drop every waiting entry whose owner is no longer alive. Returns the number of entries removed.
pub(crate) fn reclaim_dead_waiters(waiting: &mut WaitQueue, probe: &dyn LivenessProbe) -> usize {
    let dead: Vec<_> = waiting
        .iter()
        .filter(|entry| !probe.is_alive(entry.owner))
        .map(|entry| entry.id)
        .collect();

    for id in &dead {
        if let Some(entry) = waiting.remove(*id) {
            entry.transition(EntryState::Reclaimed);
            info!(id = %entry.id, owner = %entry.owner, kind = %entry.kind, "reclaimed request of dead owner");
        }
    }
    dead.len()
}
