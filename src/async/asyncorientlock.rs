/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Async Orientation Lock
//!
//! `async` flavour of the blocking acquire calls of [OrientationLock]. The request is queued the moment the future is
//! created, exactly like the blocking call would do. When polled while the request still waits, the future registers
//! its [Waker] with the wait queue and gets woken by the orientation update that grants the request.
//!
//! Dropping a future before it resolved withdraws the request. If the grant already happened but was never observed
//! it is released again, so an abandoned future never leaves a lock behind.

use crate::error::{OrientLockError, Result};
use crate::orientation::OrientationRange;
use crate::owner::OwnerId;
use crate::sync::{LockEntry, LockKind, OrientationLock, OrientationReadGuard, OrientationWriteGuard};
use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use std::sync::Arc;

impl OrientationLock {
    /// Queue a read request, the returned future resolves once it is granted.
    pub fn lock_read_async(&self, owner: OwnerId, range: &OrientationRange) -> AcquireFuture<'_> {
        self.acquire_async(owner, range, LockKind::Reader)
    }

    /// Queue a write request, the returned future resolves once it is granted.
    pub fn lock_write_async(&self, owner: OwnerId, range: &OrientationRange) -> AcquireFuture<'_> {
        self.acquire_async(owner, range, LockKind::Writer)
    }

    pub fn acquire_async(&self, owner: OwnerId, range: &OrientationRange, kind: LockKind) -> AcquireFuture<'_> {
        let state = match self.enqueue(owner, range, kind) {
            Ok(entry) => AcquireState::Queued(entry),
            Err(error) => AcquireState::Failed(error),
        };
        AcquireFuture { lock: self, state }
    }

    /// Acquire read access and hand out a guard releasing it on drop.
    pub async fn read_async(&self, owner: OwnerId, range: &OrientationRange) -> Result<OrientationReadGuard<'_>> {
        self.lock_read_async(owner, range).await?;
        Ok(OrientationReadGuard::new(self, owner, *range))
    }

    /// Acquire write access and hand out a guard releasing it on drop.
    pub async fn write_async(&self, owner: OwnerId, range: &OrientationRange) -> Result<OrientationWriteGuard<'_>> {
        self.lock_write_async(owner, range).await?;
        Ok(OrientationWriteGuard::new(self, owner, *range))
    }
}

/// The `Future` that represents an `await`able lock request to an [OrientationLock] and can only be created from the
/// functions of [OrientationLock].
#[must_use = "the request is withdrawn when the future is dropped"]
pub struct AcquireFuture<'a> {
    lock: &'a OrientationLock,
    state: AcquireState,
}

enum AcquireState {
    Queued(Arc<LockEntry>),
    /// the request never made it into the queue, report it on the first poll
    Failed(OrientLockError),
    Done,
}

impl Future for AcquireFuture<'_> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match core::mem::replace(&mut this.state, AcquireState::Done) {
            AcquireState::Queued(entry) => match this.lock.registry.poll_granted(&entry, cx.waker()) {
                Poll::Ready(result) => Poll::Ready(result),
                Poll::Pending => {
                    // still waiting, keep the entry to check again when woken
                    this.state = AcquireState::Queued(entry);
                    Poll::Pending
                }
            },
            AcquireState::Failed(error) => Poll::Ready(Err(error)),
            AcquireState::Done => panic!("AcquireFuture polled after completion"),
        }
    }
}

impl Drop for AcquireFuture<'_> {
    fn drop(&mut self) {
        if let AcquireState::Queued(entry) = &self.state {
            self.lock.registry.withdraw(entry);
        }
    }
}
