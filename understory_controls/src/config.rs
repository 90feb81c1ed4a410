// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use serde::{Deserialize, Serialize};
use understory_schema::FolderSettings;

use crate::error::ConfigError;

/// Store-wide settings.
///
/// ```rust
/// use understory_controls::StoreConfig;
///
/// let config = StoreConfig::from_json_str(
///     r#"{ "diagnosticCapacity": 8, "defaultFolder": { "collapsed": true } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.diagnostic_capacity, 8);
/// assert!(config.record_diagnostics);
/// assert!(config.default_folder.collapsed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Keep diagnostics for [`Store::take_diagnostics`](crate::Store::take_diagnostics).
    /// They are logged either way.
    pub record_diagnostics: bool,
    /// Maximum number of kept diagnostics; the oldest are dropped first.
    pub diagnostic_capacity: usize,
    /// Settings of folders no registration declared settings for.
    pub default_folder: FolderSettings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_diagnostics: true,
            diagnostic_capacity: 64,
            default_folder: FolderSettings::default(),
        }
    }
}

impl StoreConfig {
    /// Reads a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
