/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Orientation Lock
//!
//! A reader/writer lock that is only handed out while the device is held in a requested orientation range. Lock
//! requests queue up and are admitted whenever a new orientation is pushed with [OrientationLock::set_orientation].
//! Holders are never pre-empted by an orientation change, the orientation only gates new grants.
//!
//! # Example
//! ```
//! use orient_lock::{OrientLockConfig, OrientationLock, Orientation, OrientationRange, OwnerTable};
//! use std::sync::Arc;
//!
//! let owners = OwnerTable::new();
//! let lock = Arc::new(OrientationLock::new(OrientLockConfig::default(), owners.clone()).unwrap());
//! let face_down = OrientationRange::new(Orientation::new(0, 180, 0), 180, 10, 10);
//!
//! let writer = std::thread::spawn({
//!     let lock = Arc::clone(&lock);
//!     let me = owners.register();
//!     move || {
//!         // blocks until the device lies face down
//!         let _guard = lock.write(me.id(), &face_down).unwrap();
//!         // exclusive access for this orientation range
//!     }
//! });
//!
//! // the sensor side keeps pushing orientations until the writer is done
//! while !writer.is_finished() {
//!     lock.set_orientation(Orientation::new(10, 179, 2)).unwrap();
//!     std::thread::yield_now();
//! }
//! writer.join().unwrap();
//! ```

use super::admission::{evaluate_waiters, AdmissionPolicy};
use super::entry::{EntrySnapshot, LockEntry, LockKind};
use super::reclaim::{reclaim_dead_owners, reclaim_dead_waiters};
use super::registry::Registry;
use crate::config::OrientLockConfig;
use crate::error::Result;
use crate::orientation::{Orientation, OrientationRange};
use crate::owner::{LivenessProbe, OwnerId, ProcessLiveness};
use core::fmt;
use core::task::Waker;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A reader/writer lock per orientation range, granting requests only while the last published orientation lies in
/// the requested range. Share it between threads through an `Arc`.
pub struct OrientationLock {
    pub(crate) config: OrientLockConfig,
    probe: Box<dyn LivenessProbe>,
    pub(crate) registry: Registry,
    /// The last orientation reported. The mutex also serializes the update passes.
    current: Mutex<Orientation>,
}

/// What a single orientation update did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub orientation: Orientation,
    /// granted entries removed because their owner is gone
    pub reclaimed_granted: usize,
    /// waiting entries removed because their owner is gone
    pub reclaimed_waiting: usize,
    /// entries granted in this pass
    pub granted: usize,
    pub still_waiting: usize,
    pub held: usize,
}

/// The content of both registry lists at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// waiting entries in request order
    pub waiting: Vec<EntrySnapshot>,
    /// granted entries in grant order
    pub granted: Vec<EntrySnapshot>,
}

impl RegistrySnapshot {
    /// `true` if no granted writer shares its range with any other granted entry.
    pub fn writers_exclusive(&self) -> bool {
        let mut per_range: HashMap<OrientationRange, (usize, usize)> = HashMap::new();
        for entry in &self.granted {
            let counter = per_range.entry(entry.range).or_default();
            match entry.kind {
                LockKind::Reader => counter.0 += 1,
                LockKind::Writer => counter.1 += 1,
            }
        }
        per_range
            .values()
            .all(|&(readers, writers)| writers == 0 || (writers == 1 && readers == 0))
    }
}

impl OrientationLock {
    /// Create the lock with the given policies. Dead owners are detected with `probe`.
    pub fn new<P: LivenessProbe + 'static>(config: OrientLockConfig, probe: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: Mutex::new(config.initial_orientation),
            config,
            probe: Box::new(probe),
            registry: Registry::new(),
        })
    }

    /// Create the lock for owners that are OS threads, see [ProcessLiveness]. Callers identify themselves with
    /// [OwnerId::current_thread] so a thread that exits while holding a grant is reclaimed on the next update.
    pub fn with_process_liveness(config: OrientLockConfig) -> Result<Self> {
        Self::new(config, ProcessLiveness)
    }

    pub fn config(&self) -> &OrientLockConfig {
        &self.config
    }

    /// Block until a read lock for `range` is granted to `owner`.
    pub fn lock_read(&self, owner: OwnerId, range: &OrientationRange) -> Result<()> {
        self.acquire(owner, range, LockKind::Reader)
    }

    /// Block until a write lock for `range` is granted to `owner`.
    pub fn lock_write(&self, owner: OwnerId, range: &OrientationRange) -> Result<()> {
        self.acquire(owner, range, LockKind::Writer)
    }

    /// Release a read lock `owner` holds for `range`.
    pub fn unlock_read(&self, owner: OwnerId, range: &OrientationRange) -> Result<()> {
        self.release(owner, range, LockKind::Reader)
    }

    /// Release a write lock for `range`. Depending on the [crate::ReleasePolicy] only its owner may do so.
    pub fn unlock_write(&self, owner: OwnerId, range: &OrientationRange) -> Result<()> {
        self.release(owner, range, LockKind::Writer)
    }

    /// Queue a lock request and block the calling thread until it is granted. Requests are only ever granted by
    /// an orientation update, even if the current orientation already matches.
    pub fn acquire(&self, owner: OwnerId, range: &OrientationRange, kind: LockKind) -> Result<()> {
        let entry = self.enqueue(owner, range, kind)?;
        self.registry.wait_granted(&entry)
    }

    /// Release the first granted entry with this range and kind the owner is allowed to release. Nothing changes if
    /// there is none.
    pub fn release(&self, owner: OwnerId, range: &OrientationRange, kind: LockKind) -> Result<()> {
        range.validate()?;
        self.registry
            .release(owner, range, kind, self.config.release_policy)
    }

    /// Like [OrientationLock::lock_read] but the lock is released when the returned guard is dropped.
    pub fn read(&self, owner: OwnerId, range: &OrientationRange) -> Result<OrientationReadGuard<'_>> {
        self.lock_read(owner, range)?;
        Ok(OrientationReadGuard::new(self, owner, *range))
    }

    /// Like [OrientationLock::lock_write] but the lock is released when the returned guard is dropped.
    pub fn write(&self, owner: OwnerId, range: &OrientationRange) -> Result<OrientationWriteGuard<'_>> {
        self.lock_write(owner, range)?;
        Ok(OrientationWriteGuard::new(self, owner, *range))
    }

    /// Publish a new device orientation. Granted entries of dead owners are reclaimed first, then every waiting
    /// request whose range contains the new orientation is granted in request order as far as the reader/writer rules
    /// allow. Concurrent updates are serialized.
    #[instrument(skip_all, level = "debug", fields(orientation = %orientation))]
    pub fn set_orientation(&self, orientation: Orientation) -> Result<PassReport> {
        orientation.validate()?;

        let mut current = self.current.lock();
        *current = orientation;

        let mut lists = self.registry.lock_lists();
        let reclaimed_granted = reclaim_dead_owners(&mut lists.granted, self.probe.as_ref());
        let reclaimed_waiting = if self.config.reclaim_waiters {
            reclaim_dead_waiters(&mut lists.waiting, self.probe.as_ref())
        } else {
            0
        };
        let granted = evaluate_waiters(&mut lists, &orientation, self.admission_policy()).len();
        let report = PassReport {
            orientation,
            reclaimed_granted,
            reclaimed_waiting,
            granted,
            still_waiting: lists.waiting.len(),
            held: lists.granted.len(),
        };
        let woken = lists.waiting.take_woken();
        drop(lists);
        drop(current);

        if granted > 0 || reclaimed_waiting > 0 {
            self.registry.notify_all();
        }
        woken.into_iter().for_each(Waker::wake);
        debug!(
            granted,
            reclaimed = reclaimed_granted + reclaimed_waiting,
            waiting = report.still_waiting,
            "orientation pass done"
        );
        Ok(report)
    }

    /// The orientation published last, or the configured initial one.
    pub fn current_orientation(&self) -> Orientation {
        *self.current.lock()
    }

    pub fn waiting_len(&self) -> usize {
        self.registry.waiting_len()
    }

    pub fn granted_len(&self) -> usize {
        self.registry.granted_len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let (waiting, granted) = self.registry.snapshot();
        RegistrySnapshot { waiting, granted }
    }

    pub(crate) fn enqueue(
        &self,
        owner: OwnerId,
        range: &OrientationRange,
        kind: LockKind,
    ) -> Result<Arc<LockEntry>> {
        range.validate()?;
        self.registry
            .enqueue(owner, *range, kind, self.config.max_entries)
    }

    fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            azimuth: self.config.azimuth_policy,
            writer_preference: self.config.writer_preference,
        }
    }
}

impl fmt::Debug for OrientationLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrientationLock")
            .field("Orientation", &self.current_orientation())
            .field("Waiting", &self.waiting_len())
            .field("Granted", &self.granted_len())
            .finish_non_exhaustive()
    }
}

// shared part of the read and write guards
struct Held<'a> {
    lock: &'a OrientationLock,
    owner: OwnerId,
    range: OrientationRange,
    kind: LockKind,
    released: bool,
}

impl<'a> Held<'a> {
    fn new(lock: &'a OrientationLock, owner: OwnerId, range: OrientationRange, kind: LockKind) -> Self {
        Self {
            lock,
            owner,
            range,
            kind,
            released: false,
        }
    }

    fn unlock(&mut self) -> Result<()> {
        self.released = true;
        self.lock.release(self.owner, &self.range, self.kind)
    }
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // the entry might have been reclaimed or released by someone else meanwhile
        if let Err(error) = self.unlock() {
            warn!(owner = %self.owner, range = %self.range, %error, "lock guard could not release");
        }
    }
}

/// Result of acquiring a read lock with [OrientationLock::read]. If the guard goes out of scope the read lock is
/// released.
pub struct OrientationReadGuard<'a> {
    held: Held<'a>,
}

/// Result of acquiring a write lock with [OrientationLock::write]. If the guard goes out of scope the write lock is
/// released.
pub struct OrientationWriteGuard<'a> {
    held: Held<'a>,
}

macro_rules! guard_accessors {
    ($guard:ident, $kind:expr) => {
        impl<'a> $guard<'a> {
            pub(crate) fn new(lock: &'a OrientationLock, owner: OwnerId, range: OrientationRange) -> Self {
                Self {
                    held: Held::new(lock, owner, range, $kind),
                }
            }

            pub fn owner(&self) -> OwnerId {
                self.held.owner
            }

            pub fn range(&self) -> &OrientationRange {
                &self.held.range
            }

            /// Release right away and learn whether it worked, dropping the guard swallows the result.
            pub fn unlock(mut self) -> Result<()> {
                self.held.unlock()
            }
        }

        impl fmt::Debug for $guard<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($guard))
                    .field("Owner", &self.held.owner)
                    .field("Range", &self.held.range)
                    .finish()
            }
        }
    };
}

guard_accessors!(OrientationReadGuard, LockKind::Reader);
guard_accessors!(OrientationWriteGuard, LockKind::Writer);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleasePolicy;
    use crate::error::OrientLockError;
    use crate::owner::{OwnerHandle, OwnerTable};
    use crate::tests::setup_tracing;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    const FACE_UP: Orientation = Orientation::new(90, 0, 0);
    const FACE_DOWN: Orientation = Orientation::new(10, 179, 2);

    fn face_down() -> OrientationRange {
        OrientationRange::new(Orientation::new(0, 180, 0), 180, 10, 10)
    }

    fn setup(config: OrientLockConfig) -> (Arc<OrientationLock>, OwnerTable) {
        setup_tracing();
        let owners = OwnerTable::new();
        let lock = OrientationLock::new(config, owners.clone()).unwrap();
        (Arc::new(lock), owners)
    }

    fn spawn_acquire(
        lock: &Arc<OrientationLock>,
        owner: &OwnerHandle,
        kind: LockKind,
    ) -> JoinHandle<Result<()>> {
        let lock = Arc::clone(lock);
        let owner = owner.id();
        thread::spawn(move || lock.acquire(owner, &face_down(), kind))
    }

    // lock requests are queued from other threads, wait until the registry has seen them
    fn wait_for_waiting(lock: &OrientationLock, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while lock.waiting_len() != count {
            assert!(Instant::now() < deadline, "expected {} waiting entries", count);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn face_down_writer() {
        let (lock, owners) = setup(OrientLockConfig::default().with_initial_orientation(FACE_UP));
        let a = owners.register();

        let writer = spawn_acquire(&lock, &a, LockKind::Writer);
        wait_for_waiting(&lock, 1);

        // face up, no grant
        let report = lock.set_orientation(FACE_UP).unwrap();
        assert_eq!(report.granted, 0);
        assert_eq!(report.still_waiting, 1);
        thread::sleep(Duration::from_millis(20));
        assert!(!writer.is_finished());

        let report = lock.set_orientation(FACE_DOWN).unwrap();
        assert_eq!(report.granted, 1);
        assert!(writer.join().unwrap().is_ok());
        assert_eq!(lock.current_orientation(), FACE_DOWN);

        assert!(lock.unlock_write(a.id(), &face_down()).is_ok());
        assert_eq!(lock.granted_len(), 0);
        assert_eq!(lock.waiting_len(), 0);
    }

    #[test]
    fn matching_orientation_still_needs_an_update() {
        let (lock, owners) = setup(OrientLockConfig::default().with_initial_orientation(FACE_DOWN));
        let a = owners.register();

        let writer = spawn_acquire(&lock, &a, LockKind::Writer);
        wait_for_waiting(&lock, 1);
        thread::sleep(Duration::from_millis(20));
        assert!(!writer.is_finished());
        assert_eq!(lock.granted_len(), 0);

        let report = lock.set_orientation(FACE_DOWN).unwrap();
        assert_eq!(report.granted, 1);
        assert!(writer.join().unwrap().is_ok());
    }

    // a waker looking at the lock from within `wake`, like an executor polling inline
    struct ReentrantWaker {
        lock: Arc<OrientationLock>,
        seen_waiting: AtomicUsize,
    }

    impl Wake for ReentrantWaker {
        fn wake(self: Arc<Self>) {
            self.seen_waiting
                .store(self.lock.waiting_len() + 1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wakers_may_use_the_lock() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();
        let entry = lock.enqueue(owner.id(), &face_down(), LockKind::Reader).unwrap();
        let waker = Arc::new(ReentrantWaker {
            lock: Arc::clone(&lock),
            seen_waiting: AtomicUsize::new(0),
        });
        assert!(lock
            .registry
            .poll_granted(&entry, &Waker::from(Arc::clone(&waker)))
            .is_pending());

        let pass = thread::spawn({
            let lock = Arc::clone(&lock);
            move || lock.set_orientation(FACE_DOWN)
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pass.is_finished() {
            assert!(Instant::now() < deadline, "orientation update stuck in the waker");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pass.join().unwrap().unwrap().granted, 1);
        // woken once, after the entry had left the queue
        assert_eq!(waker.seen_waiting.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reader_holds_off_writer() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let b = owners.register();
        let c = owners.register();

        let reader = spawn_acquire(&lock, &b, LockKind::Reader);
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        assert!(reader.join().unwrap().is_ok());

        let writer = spawn_acquire(&lock, &c, LockKind::Writer);
        wait_for_waiting(&lock, 1);
        for _ in 0..3 {
            let report = lock.set_orientation(FACE_DOWN).unwrap();
            assert_eq!(report.granted, 0);
        }
        let snapshot = lock.snapshot();
        assert_eq!(snapshot.waiting.len(), 1);
        assert_eq!(snapshot.waiting[0].owner, c.id());
        assert!(!writer.is_finished());

        lock.unlock_read(b.id(), &face_down()).unwrap();
        lock.set_orientation(FACE_DOWN).unwrap();
        assert!(writer.join().unwrap().is_ok());
        assert!(lock.snapshot().writers_exclusive());
    }

    #[test]
    fn dead_holder_is_reclaimed_before_admission() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let d = owners.register();
        let e = owners.register();

        let holder = spawn_acquire(&lock, &d, LockKind::Writer);
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        assert!(holder.join().unwrap().is_ok());

        let next = spawn_acquire(&lock, &e, LockKind::Writer);
        wait_for_waiting(&lock, 1);

        // D terminates without releasing
        drop(d);
        let report = lock.set_orientation(FACE_DOWN).unwrap();
        assert_eq!(report.reclaimed_granted, 1);
        assert_eq!(report.granted, 1);
        assert!(next.join().unwrap().is_ok());

        let snapshot = lock.snapshot();
        assert_eq!(snapshot.granted.len(), 1);
        assert_eq!(snapshot.granted[0].owner, e.id());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_thread_grant_is_reclaimed() {
        setup_tracing();
        let lock = Arc::new(OrientationLock::with_process_liveness(OrientLockConfig::default()).unwrap());

        let holder = thread::spawn({
            let lock = Arc::clone(&lock);
            move || {
                let me = OwnerId::current_thread();
                lock.lock_write(me, &face_down()).map(|_| me)
            }
        });
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        // the thread exits still holding the write lock
        let gone = holder.join().unwrap().unwrap();
        assert_ne!(gone, OwnerId::current_process());

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(Instant::now() < deadline, "grant of exited thread never reclaimed");
            if lock.set_orientation(FACE_DOWN).unwrap().reclaimed_granted == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(lock.granted_len(), 0);
    }

    #[test]
    fn dead_waiter_is_reclaimed() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let gone = owners.register();

        let waiter = spawn_acquire(&lock, &gone, LockKind::Reader);
        wait_for_waiting(&lock, 1);
        let owner = gone.id();
        drop(gone);

        // not even in range, the sweep runs anyway
        let report = lock.set_orientation(FACE_UP).unwrap();
        assert_eq!(report.reclaimed_waiting, 1);
        assert_eq!(waiter.join().unwrap(), Err(OrientLockError::OwnerGone { owner }));
        assert_eq!(lock.waiting_len(), 0);
    }

    #[test]
    fn dead_waiter_kept_when_disabled() {
        let (lock, owners) = setup(OrientLockConfig::default().with_reclaim_waiters(false));
        let gone = owners.register();

        let _waiter = spawn_acquire(&lock, &gone, LockKind::Reader);
        wait_for_waiting(&lock, 1);
        drop(gone);

        let report = lock.set_orientation(FACE_UP).unwrap();
        assert_eq!(report.reclaimed_waiting, 0);
        assert_eq!(lock.waiting_len(), 1);
    }

    #[test]
    fn acquire_release_round_trip() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();
        let before = lock.snapshot();

        let reader = spawn_acquire(&lock, &owner, LockKind::Reader);
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        reader.join().unwrap().unwrap();

        lock.unlock_read(owner.id(), &face_down()).unwrap();
        assert_eq!(lock.snapshot(), before);
    }

    #[test]
    fn failed_release_changes_nothing() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();
        let stranger = owners.register();

        let reader = spawn_acquire(&lock, &owner, LockKind::Reader);
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        reader.join().unwrap().unwrap();
        let before = lock.snapshot();

        assert_eq!(
            lock.unlock_write(owner.id(), &face_down()),
            Err(OrientLockError::NoMatchingEntry { kind: LockKind::Writer })
        );
        assert!(lock.unlock_read(stranger.id(), &face_down()).is_err());
        let other = OrientationRange::new(Orientation::new(0, 180, 0), 180, 10, 9);
        assert!(lock.unlock_read(owner.id(), &other).is_err());
        assert_eq!(lock.snapshot(), before);
    }

    #[test]
    fn release_policy_for_writers() {
        let (lock, owners) =
            setup(OrientLockConfig::default().with_release_policy(ReleasePolicy::ReaderOwnerOnly));
        let owner = owners.register();
        let stranger = owners.register();

        let writer = spawn_acquire(&lock, &owner, LockKind::Writer);
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        writer.join().unwrap().unwrap();

        assert!(lock.unlock_write(stranger.id(), &face_down()).is_ok());
        assert_eq!(lock.granted_len(), 0);
    }

    #[test]
    fn invalid_arguments_are_rejected_early() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();
        let broken = OrientationRange::new(Orientation::new(0, 200, 0), 10, 10, 10);

        assert!(matches!(
            lock.lock_read(owner.id(), &broken),
            Err(OrientLockError::InvalidOrientation { .. })
        ));
        assert!(matches!(
            lock.set_orientation(Orientation::new(360, 0, 0)),
            Err(OrientLockError::InvalidOrientation { .. })
        ));
        assert_eq!(lock.current_orientation(), Orientation::default());
        assert_eq!(lock.waiting_len(), 0);
    }

    #[test]
    fn full_registry_fails_immediately() {
        let (lock, owners) = setup(OrientLockConfig::default().with_max_entries(1));
        let first = owners.register();
        let second = owners.register();

        let _waiter = spawn_acquire(&lock, &first, LockKind::Writer);
        wait_for_waiting(&lock, 1);

        assert_eq!(
            lock.lock_write(second.id(), &face_down()),
            Err(OrientLockError::ResourceExhausted { limit: 1 })
        );
        assert_eq!(lock.waiting_len(), 1);
    }

    #[test]
    fn guards_release_on_drop() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();

        let worker = thread::spawn({
            let lock = Arc::clone(&lock);
            let owner = owner.id();
            move || {
                let guard = lock.write(owner, &face_down()).unwrap();
                assert_eq!(guard.owner(), owner);
                assert_eq!(guard.range(), &face_down());
            }
        });
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        worker.join().unwrap();
        assert_eq!(lock.granted_len(), 0);
    }

    #[test]
    fn explicit_guard_unlock_reports_result() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let owner = owners.register();

        let worker = thread::spawn({
            let lock = Arc::clone(&lock);
            let owner = owner.id();
            move || {
                let guard = lock.read(owner, &face_down()).unwrap();
                // someone else already released it, the guard learns about that
                lock.unlock_read(owner, &face_down()).unwrap();
                guard.unlock()
            }
        });
        wait_for_waiting(&lock, 1);
        lock.set_orientation(FACE_DOWN).unwrap();
        assert!(matches!(
            worker.join().unwrap(),
            Err(OrientLockError::NoMatchingEntry { kind: LockKind::Reader })
        ));
    }

    #[test]
    fn many_readers_one_writer_stay_exclusive() {
        let (lock, owners) = setup(OrientLockConfig::default());
        let handles: Vec<_> = (0..6).map(|_| owners.register()).collect();

        let workers: Vec<_> = handles
            .iter()
            .enumerate()
            .map(|(n, owner)| {
                let kind = if n == 2 { LockKind::Writer } else { LockKind::Reader };
                spawn_acquire(&lock, owner, kind)
            })
            .collect();
        wait_for_waiting(&lock, handles.len());

        // keep pushing orientations and releasing whatever got granted until everybody was served
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut served = 0;
        while served < handles.len() {
            assert!(Instant::now() < deadline);
            lock.set_orientation(FACE_DOWN).unwrap();
            let snapshot = lock.snapshot();
            assert!(snapshot.writers_exclusive());
            for entry in snapshot.granted {
                lock.release(entry.owner, &entry.range, entry.kind).unwrap();
                served += 1;
            }
        }
        for worker in workers {
            assert!(worker.join().unwrap().is_ok());
        }
    }
}
