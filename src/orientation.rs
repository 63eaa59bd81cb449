/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Orientation
//!
//! The attitude of the device at one instant and the envelope of attitudes a lock request is willing to operate
//! under. Both are plain fixed-size records so they could be copied 1:1 across a process boundary.
//!
//! # Example
//! ```
//! use orient_lock::{Orientation, OrientationRange};
//!
//! // lying face down, azimuth does not matter
//! let face_down = OrientationRange::new(Orientation::new(0, 180, 0), 180, 10, 10);
//! assert!(face_down.validate().is_ok());
//! ```

use crate::error::{Axis, OrientLockError, Result};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Azimuth is measured in degrees from magnetic north, `0 <= azimuth < 360`.
pub const AZIMUTH_MAX: i32 = 360;
/// Rotation around the X-axis, `-180 <= pitch <= 180`.
pub const PITCH_MIN: i32 = -180;
pub const PITCH_MAX: i32 = 180;
/// Rotation around the Y-axis, `-90 <= roll <= 90`.
pub const ROLL_MIN: i32 = -90;
pub const ROLL_MAX: i32 = 90;

/// The device attitude.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Orientation {
    /// angle between magnetic north and the Y axis around the Z axis, 0=North, 90=East, 180=South, 270=West
    pub azimuth: i32,
    /// rotation around the X-axis
    pub pitch: i32,
    /// rotation around the Y-axis, +Y == -roll
    pub roll: i32,
}

impl Orientation {
    pub const fn new(azimuth: i32, pitch: i32, roll: i32) -> Self {
        Self {
            azimuth,
            pitch,
            roll,
        }
    }

    /// Check every axis against its domain. Values coming from outside of the crate shall pass this before they are
    /// used for any lock decision.
    pub fn validate(&self) -> Result<()> {
        if !(0..AZIMUTH_MAX).contains(&self.azimuth) {
            return Err(OrientLockError::InvalidOrientation {
                axis: Axis::Azimuth,
                value: self.azimuth,
            });
        }
        if !(PITCH_MIN..=PITCH_MAX).contains(&self.pitch) {
            return Err(OrientLockError::InvalidOrientation {
                axis: Axis::Pitch,
                value: self.pitch,
            });
        }
        if !(ROLL_MIN..=ROLL_MAX).contains(&self.roll) {
            return Err(OrientLockError::InvalidOrientation {
                axis: Axis::Roll,
                value: self.roll,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.azimuth, self.pitch, self.roll)
    }
}

/// A basis orientation plus a `+/-` tolerance in degrees for each axis.
///
/// Two ranges are considered the same lock target only if they compare equal field by field. Overlapping but
/// different ranges never conflict with each other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct OrientationRange {
    pub orient: Orientation,
    pub azimuth_range: u32,
    pub pitch_range: u32,
    pub roll_range: u32,
}

impl OrientationRange {
    pub const fn new(orient: Orientation, azimuth_range: u32, pitch_range: u32, roll_range: u32) -> Self {
        Self {
            orient,
            azimuth_range,
            pitch_range,
            roll_range,
        }
    }

    /// The basis has to be a valid [Orientation] and no tolerance may exceed the full span of its axis. A tolerance
    /// equal to the span acts as a wildcard for that axis.
    pub fn validate(&self) -> Result<()> {
        self.orient.validate()?;
        let spans = [
            (Axis::Azimuth, self.azimuth_range, AZIMUTH_MAX as u32),
            (Axis::Pitch, self.pitch_range, (PITCH_MAX - PITCH_MIN) as u32),
            (Axis::Roll, self.roll_range, (ROLL_MAX - ROLL_MIN) as u32),
        ];
        for (axis, tolerance, span) in spans {
            if tolerance > span {
                return Err(OrientLockError::InvalidRange { axis, tolerance });
            }
        }
        Ok(())
    }
}

impl fmt::Display for OrientationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} +/-({}, {}, {})",
            self.orient, self.azimuth_range, self.pitch_range, self.roll_range
        )
    }
}
