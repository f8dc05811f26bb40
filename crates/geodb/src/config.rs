//! Lookup-service configuration
//!
//! The service reads the optional `geodb` object out of the application's
//! JSON config document. Wrong types and out-of-range values are reported
//! as [`GeoDbError::Config`] with the offending key named.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::error::{GeoDbError, Result};

/// Default snapshot file name
pub const DEFAULT_GEODB_FILE: &str = "geodb.dat";
/// Default watcher poll interval, seconds
const DEFAULT_CHECK_FOR_UPDATE_TIMEOUT: f64 = 5.0;
/// Shortest allowed poll interval; the quiescence check needs two ticks
const MIN_CHECK_FOR_UPDATE_TIMEOUT: f64 = 2.0;

/// Parsed `geodb` config section
#[derive(Debug, Clone)]
pub struct GeoDbConfig {
    /// Path to the snapshot file
    pub file: PathBuf,
    /// Watcher poll interval
    pub check_for_update_timeout: Duration,
    /// Skip the initial load and the watcher's load work
    pub dont_load: bool,
}

impl Default for GeoDbConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_GEODB_FILE),
            check_for_update_timeout: Duration::from_secs_f64(DEFAULT_CHECK_FOR_UPDATE_TIMEOUT),
            dont_load: false,
        }
    }
}

impl GeoDbConfig {
    /// Read the `geodb` section from a config document
    ///
    /// A missing section (or a document without one) yields the defaults.
    pub fn from_json(doc: &Value) -> Result<Self> {
        let mut config = GeoDbConfig::default();
        let Some(section) = doc.get("geodb") else {
            return Ok(config);
        };
        if !section.is_object() {
            return Err(GeoDbError::Config("geodb must be an object".into()));
        }
        if let Some(v) = section.get("check_for_update_timeout") {
            let timeout = v.as_f64().ok_or_else(|| {
                GeoDbError::Config("geodb.check_for_update_timeout must be a number".into())
            })?;
            if timeout < MIN_CHECK_FOR_UPDATE_TIMEOUT {
                return Err(GeoDbError::Config(format!(
                    "geodb.check_for_update_timeout can't be less than {:.1}",
                    MIN_CHECK_FOR_UPDATE_TIMEOUT
                )));
            }
            config.check_for_update_timeout = Duration::from_secs_f64(timeout);
        }
        if let Some(v) = section.get("file") {
            let file = v
                .as_str()
                .ok_or_else(|| GeoDbError::Config("geodb.file must be a string".into()))?;
            config.file = PathBuf::from(file);
        }
        if let Some(v) = section.get("dont_load") {
            config.dont_load = v
                .as_bool()
                .ok_or_else(|| GeoDbError::Config("geodb.dont_load must be a boolean".into()))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_section_uses_defaults() {
        let config = GeoDbConfig::from_json(&json!({})).unwrap();
        assert_eq!(config.file, PathBuf::from("geodb.dat"));
        assert_eq!(config.check_for_update_timeout, Duration::from_secs(5));
        assert!(!config.dont_load);
    }

    #[test]
    fn full_section() {
        let config = GeoDbConfig::from_json(&json!({
            "geodb": {
                "file": "/var/lib/geo/geodb.dat",
                "check_for_update_timeout": 30.0,
                "dont_load": true,
            }
        }))
        .unwrap();
        assert_eq!(config.file, PathBuf::from("/var/lib/geo/geodb.dat"));
        assert_eq!(config.check_for_update_timeout, Duration::from_secs(30));
        assert!(config.dont_load);
    }

    #[test]
    fn type_errors() {
        for doc in [
            json!({"geodb": 1}),
            json!({"geodb": {"file": 5}}),
            json!({"geodb": {"check_for_update_timeout": "soon"}}),
            json!({"geodb": {"dont_load": "yes"}}),
        ] {
            assert!(matches!(
                GeoDbConfig::from_json(&doc),
                Err(GeoDbError::Config(_))
            ));
        }
    }

    #[test]
    fn timeout_below_minimum_is_rejected() {
        let doc = json!({"geodb": {"check_for_update_timeout": 1.5}});
        assert!(matches!(
            GeoDbConfig::from_json(&doc),
            Err(GeoDbError::Config(_))
        ));
        // Exactly the minimum is fine
        let doc = json!({"geodb": {"check_for_update_timeout": 2.0}});
        assert!(GeoDbConfig::from_json(&doc).is_ok());
    }
}
