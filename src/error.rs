/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Errors
//!
//! Every failure is reported synchronously to the caller of the operation that failed. A failed call leaves the lock
//! registry untouched so the caller is free to retry. Owners that died while holding a grant are not an error, their
//! entries are reclaimed silently.

use crate::owner::OwnerId;
use crate::sync::LockKind;
use core::fmt;
use thiserror::Error;

/// The axis a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Azimuth,
    Pitch,
    Roll,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Azimuth => "azimuth",
            Axis::Pitch => "pitch",
            Axis::Roll => "roll",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong when using an [crate::OrientationLock].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrientLockError {
    /// An orientation value is outside of its axis domain.
    #[error("{axis} value {value} is out of bounds")]
    InvalidOrientation { axis: Axis, value: i32 },

    /// A range tolerance exceeds the span of its axis.
    #[error("{axis} tolerance {tolerance} exceeds the axis span")]
    InvalidRange { axis: Axis, tolerance: u32 },

    /// The registry already tracks the configured maximum of lock entries.
    #[error("lock registry is full ({limit} entries)")]
    ResourceExhausted { limit: usize },

    /// Release was requested for a range that the caller does not hold, or an acquirer's grant was released by
    /// someone else before the acquirer returned.
    #[error("no granted {kind} lock matches the given range")]
    NoMatchingEntry { kind: LockKind },

    /// The liveness probe reported the owner of a still waiting request as gone and the request was reclaimed.
    #[error("{owner} is no longer alive, its pending request was reclaimed")]
    OwnerGone { owner: OwnerId },

    /// The configuration could not be parsed or contains invalid values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for all fallible lock operations.
pub type Result<T> = core::result::Result<T, OrientLockError>;
