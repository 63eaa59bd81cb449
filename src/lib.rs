/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/
#![doc(html_root_url = "https://docs.rs/orient-lock/0.1.0")]

//! # Orientation gated read/write locks
//!
//! This crate provides a reader/writer lock whose grants do not only depend on mutual exclusion but also on the
//! physical orientation of the device. A lock is requested for an *orientation range*, a basis attitude plus a
//! tolerance per axis, and is only granted while the last reported orientation lies within that range.
//!
//! - Any number of readers may hold the same range, a writer holds it exclusively.
//! - New orientations are pushed with [OrientationLock::set_orientation], typically by a daemon polling the sensor.
//!   Each push admits all waiting requests that became legal. Holders are never pre-empted.
//! - Grants of owners that terminated without releasing are reclaimed on the next push.
//!
//! ## Features
//!
//! Feature | Usage
//! --------|--------
//! async_locks | allows usage of the `async` acquire functions.
//!
//! To share the lock across threads it should be wrapped in an `Arc`.
//!
//! # Usage
//!
//! ```
//! use orient_lock::{OrientLockConfig, OrientationLock, Orientation, OrientationRange, OwnerTable};
//! use std::sync::Arc;
//!
//! let owners = OwnerTable::new();
//! let lock = Arc::new(OrientationLock::new(OrientLockConfig::default(), owners.clone()).unwrap());
//! let face_up = OrientationRange::new(Orientation::new(0, 0, 0), 180, 10, 10);
//!
//! let reader = owners.register();
//! let id = reader.id();
//! let worker = std::thread::spawn({
//!     let lock = Arc::clone(&lock);
//!     move || lock.lock_read(id, &face_up)
//! });
//!
//! while lock.waiting_len() == 0 {
//!     std::thread::yield_now();
//! }
//! // the device is lying on its back
//! let report = lock.set_orientation(Orientation::new(42, 3, -1)).unwrap();
//! assert_eq!(report.granted, 1);
//! worker.join().unwrap().unwrap();
//!
//! lock.unlock_read(id, &face_up).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod orientation;
pub mod owner;

pub use config::{OrientLockConfig, ReleasePolicy};
pub use error::{Axis, OrientLockError, Result};
pub use matcher::{in_range, AzimuthPolicy};
pub use orientation::{Orientation, OrientationRange};
pub use owner::{LivenessProbe, OwnerHandle, OwnerId, OwnerTable, ProcessLiveness};

// re-export the sync lock types, always at root level and within the sync module
pub mod sync;
pub use sync::*;

#[cfg(any(feature = "async_locks", doc))]
pub mod r#async;
#[cfg(any(feature = "async_locks", doc))]
pub use r#async::*;
