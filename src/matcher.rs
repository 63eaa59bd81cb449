/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Range Matcher
//!
//! Decides whether an [Orientation] lies inside the tolerance envelope of an [OrientationRange]. Each axis is
//! checked on its own. Pitch and roll are linear, azimuth is treated according to the configured [AzimuthPolicy].

use crate::orientation::{Orientation, OrientationRange, AZIMUTH_MAX, PITCH_MAX, PITCH_MIN, ROLL_MAX, ROLL_MIN};
use serde::{Deserialize, Serialize};

/// How the distance between two azimuth values is measured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AzimuthPolicy {
    /// Azimuth wraps at 0/360, so 355 and 5 are 10 degrees apart.
    #[default]
    Circular,
    /// Azimuth is compared as a plain number, 355 and 5 are 350 degrees apart.
    Linear,
}

/// `true` if every axis of `orient` is within the tolerance of the range basis.
pub fn in_range(range: &OrientationRange, orient: &Orientation, policy: AzimuthPolicy) -> bool {
    let basis = &range.orient;

    azimuth_distance(basis.azimuth, orient.azimuth, policy) <= range.azimuth_range as i64
        && within_window(basis.pitch, range.pitch_range, orient.pitch, PITCH_MIN, PITCH_MAX)
        && within_window(basis.roll, range.roll_range, orient.roll, ROLL_MIN, ROLL_MAX)
}

/// Distance in degrees between two azimuth values.
pub fn azimuth_distance(a: i32, b: i32, policy: AzimuthPolicy) -> i64 {
    let direct = (a as i64 - b as i64).abs();
    match policy {
        AzimuthPolicy::Linear => direct,
        AzimuthPolicy::Circular => {
            let span = AZIMUTH_MAX as i64;
            let direct = direct % span;
            direct.min(span - direct)
        }
    }
}

// the admissible window [basis - tolerance, basis + tolerance] is clamped to the axis domain before comparing
fn within_window(basis: i32, tolerance: u32, value: i32, min: i32, max: i32) -> bool {
    let low = (basis as i64 - tolerance as i64).max(min as i64);
    let high = (basis as i64 + tolerance as i64).min(max as i64);
    (low..=high).contains(&(value as i64))
}
