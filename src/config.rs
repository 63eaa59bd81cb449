/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Configuration
//!
//! The policies an [OrientationLock](crate::OrientationLock) applies. The defaults are what most users want, the
//! alternatives reproduce the behaviour of older revisions of the lock.
//!
//! # Example
//! ```
//! use orient_lock::{AzimuthPolicy, OrientLockConfig};
//!
//! let config = OrientLockConfig::from_json_str(r#"{ "azimuth_policy": "linear", "max_entries": 64 }"#).unwrap();
//! assert_eq!(config.azimuth_policy, AzimuthPolicy::Linear);
//! assert!(config.writer_preference);
//! ```

use crate::error::{OrientLockError, Result};
use crate::matcher::AzimuthPolicy;
use crate::orientation::Orientation;
use serde::{Deserialize, Serialize};

/// Who is allowed to release a granted entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Readers and writers can only be released by the owner that acquired them.
    #[default]
    OwnerOnly,
    /// Only reader releases check the owner, any caller may release a writer entry with a matching range.
    ReaderOwnerOnly,
}

/// Policies of an [crate::OrientationLock]. Every field has a default, a JSON document only needs to name the ones
/// it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrientLockConfig {
    pub azimuth_policy: AzimuthPolicy,
    /// Hold back readers while a writer for the same range waits ahead of them.
    pub writer_preference: bool,
    pub release_policy: ReleasePolicy,
    /// Let the reclamation sweep also drop waiting entries of dead owners.
    pub reclaim_waiters: bool,
    /// Upper bound of waiting plus granted entries, `None` for unbounded.
    pub max_entries: Option<usize>,
    /// The orientation assumed until the first update arrives.
    pub initial_orientation: Orientation,
}

impl Default for OrientLockConfig {
    fn default() -> Self {
        Self {
            azimuth_policy: AzimuthPolicy::Circular,
            writer_preference: true,
            release_policy: ReleasePolicy::OwnerOnly,
            reclaim_waiters: true,
            max_entries: None,
            initial_orientation: Orientation::default(),
        }
    }
}

impl OrientLockConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| OrientLockError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entries == Some(0) {
            return Err(OrientLockError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        self.initial_orientation
            .validate()
            .map_err(|e| OrientLockError::InvalidConfig(format!("initial_orientation: {}", e)))
    }

    pub fn with_azimuth_policy(mut self, policy: AzimuthPolicy) -> Self {
        self.azimuth_policy = policy;
        self
    }

    pub fn with_writer_preference(mut self, enabled: bool) -> Self {
        self.writer_preference = enabled;
        self
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    pub fn with_reclaim_waiters(mut self, enabled: bool) -> Self {
        self.reclaim_waiters = enabled;
        self
    }

    pub fn with_max_entries(mut self, limit: usize) -> Self {
        self.max_entries = Some(limit);
        self
    }

    pub fn with_initial_orientation(mut self, orientation: Orientation) -> Self {
        self.initial_orientation = orientation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = OrientLockConfig::from_json_str("{}").unwrap();
        assert_eq!(config, OrientLockConfig::default());
    }

    #[test]
    fn full_json() {
        let config = OrientLockConfig::from_json_str(
            r#"{
                "azimuth_policy": "linear",
                "writer_preference": false,
                "release_policy": "reader_owner_only",
                "reclaim_waiters": false,
                "max_entries": 8,
                "initial_orientation": { "azimuth": 90, "pitch": 0, "roll": 0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.azimuth_policy, AzimuthPolicy::Linear);
        assert!(!config.writer_preference);
        assert_eq!(config.release_policy, ReleasePolicy::ReaderOwnerOnly);
        assert!(!config.reclaim_waiters);
        assert_eq!(config.max_entries, Some(8));
        assert_eq!(config.initial_orientation, Orientation::new(90, 0, 0));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            OrientLockConfig::from_json_str(r#"{ "max_entries": 0 }"#),
            Err(OrientLockError::InvalidConfig(_))
        ));
        assert!(matches!(
            OrientLockConfig::from_json_str(r#"{ "initial_orientation": { "azimuth": 400, "pitch": 0, "roll": 0 } }"#),
            Err(OrientLockError::InvalidConfig(_))
        ));
        assert!(matches!(
            OrientLockConfig::from_json_str(r#"{ "unknown_knob": true }"#),
            Err(OrientLockError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_setters() {
        let config = OrientLockConfig::default()
            .with_azimuth_policy(AzimuthPolicy::Linear)
            .with_writer_preference(false)
            .with_release_policy(ReleasePolicy::ReaderOwnerOnly)
            .with_reclaim_waiters(false)
            .with_max_entries(3)
            .with_initial_orientation(Orientation::new(1, 2, 3));
        assert!(config.validate().is_ok());
        assert_eq!(config.max_entries, Some(3));
        assert_eq!(config.initial_orientation, Orientation::new(1, 2, 3));
    }
}
