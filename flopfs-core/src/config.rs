//! Filesystem configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "drive": 0,
//!   "geometry": { "totalSectors": 2880, "tableStart": 1, "tableSectors": 9,
//!                 "mirrorStart": 10, "directoryStart": 19,
//!                 "directorySectors": 14, "dataOffset": 31 },
//!   "growth": "exact",
//!   "validateOnFlush": false
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::layout::Geometry;

/// How `close` extends a file's chain when the file has grown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthPolicy {
    /// Allocate as many clusters as the file size requires.
    #[default]
    Exact,
    /// Allocate at most one cluster per close. Bytes that do not fit in the
    /// committed chain are dropped.
    OneClusterPerClose,
}

/// Mount-time configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FsConfig {
    /// Drive number passed to the block device.
    pub drive: u8,
    pub geometry: Geometry,
    pub growth: GrowthPolicy,
    /// Compare both table copies before every flush and refuse to write
    /// them if they differ.
    pub validate_on_flush: bool,
}

impl FsConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> FsResult<Self> {
        let config: FsConfig = serde_json::from_str(json)?;
        config.geometry.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn from_path(path: impl AsRef<Path>) -> FsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_validate_on_flush(mut self, enabled: bool) -> Self {
        self.validate_on_flush = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;

    #[test]
    fn test_empty_json_is_default() {
        let config = FsConfig::from_json("{}").unwrap();
        assert_eq!(config, FsConfig::default());
        assert_eq!(config.geometry, Geometry::FLOPPY_1440K);
        assert_eq!(config.growth, GrowthPolicy::Exact);
    }

    #[test]
    fn test_parse_growth_policy() {
        let config =
            FsConfig::from_json(r#"{"growth": "one-cluster-per-close", "validateOnFlush": true}"#)
                .unwrap();
        assert_eq!(config.growth, GrowthPolicy::OneClusterPerClose);
        assert!(config.validate_on_flush);
    }

    #[test]
    fn test_partial_geometry_rejected_when_invalid() {
        let json = r#"{"geometry": {"totalSectors": 2880, "tableStart": 1, "tableSectors": 9,
            "mirrorStart": 4, "directoryStart": 19, "directorySectors": 14, "dataOffset": 31}}"#;
        assert!(matches!(
            FsConfig::from_json(json),
            Err(FsError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_geometry_overflow_rejected() {
        let json = r#"{"geometry": {"totalSectors": 2880, "tableStart": 4294967295,
            "tableSectors": 9, "mirrorStart": 10, "directoryStart": 19,
            "directorySectors": 14, "dataOffset": 31}}"#;
        assert!(matches!(
            FsConfig::from_json(json),
            Err(FsError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            FsConfig::from_json("{ not json"),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FsConfig::from_path("/nonexistent/flopfs.json"),
            Err(FsError::ConfigFile(_))
        ));
    }
}
