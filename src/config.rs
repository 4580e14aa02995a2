//! Node configuration, fixed once the node is constructed.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields the
//! stock `map` <- `base_link` converter publishing on `/pose` at 20 Hz.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// ROS node name.
    pub node_name: String,
    /// World frame the pose is expressed in, also the published `frame_id`.
    pub target_frame: String,
    /// Robot frame whose pose is reported.
    pub source_frame: String,
    pub pose_topic: String,
    /// Publisher history depth.
    pub queue_depth: usize,
    pub timer_period_secs: f64,
    /// How long a tick may wait for the transform to become available.
    pub lookup_timeout_secs: f64,
    /// History kept per tf edge.
    pub cache_duration_secs: f64,
    /// Query the latest available transform instead of the current clock time.
    pub lookup_latest: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            node_name: "map_to_base_link_listener".to_string(),
            target_frame: "map".to_string(),
            source_frame: "base_link".to_string(),
            pose_topic: "/pose".to_string(),
            queue_depth: 10,
            timer_period_secs: 0.05,
            lookup_timeout_secs: 1.0,
            cache_duration_secs: 10.0,
            lookup_latest: true,
        }
    }
}

impl ConverterConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for (name, value) in [
            ("node_name", &self.node_name),
            ("target_frame", &self.target_frame),
            ("source_frame", &self.source_frame),
            ("pose_topic", &self.pose_topic),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("{name} must not be empty"));
            }
        }
        if self.target_frame == self.source_frame {
            return invalid(format!(
                "target_frame and source_frame are both '{}'",
                self.target_frame
            ));
        }
        if self.queue_depth == 0 {
            return invalid("queue_depth must be at least 1".to_string());
        }
        if Duration::try_from_secs_f64(self.timer_period_secs).map_or(true, |d| d.is_zero()) {
            return invalid(format!(
                "timer_period_secs must be positive, got {}",
                self.timer_period_secs
            ));
        }
        if Duration::try_from_secs_f64(self.lookup_timeout_secs).is_err() {
            return invalid(format!(
                "lookup_timeout_secs must be a non-negative number, got {}",
                self.lookup_timeout_secs
            ));
        }
        if Duration::try_from_secs_f64(self.cache_duration_secs).map_or(true, |d| d.is_zero()) {
            return invalid(format!(
                "cache_duration_secs must be positive, got {}",
                self.cache_duration_secs
            ));
        }
        Ok(())
    }

    pub fn timer_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.timer_period_secs).unwrap_or_default()
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.lookup_timeout_secs).unwrap_or_default()
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.cache_duration_secs).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::from_toml_str("").unwrap();

        assert_eq!(config, ConverterConfig::default());
        assert_eq!(config.target_frame, "map");
        assert_eq!(config.source_frame, "base_link");
        assert_eq!(config.pose_topic, "/pose");
        assert_eq!(config.queue_depth, 10);
        assert_eq!(config.timer_period(), Duration::from_millis(50));
        assert_eq!(config.lookup_timeout(), Duration::from_secs(1));
        assert_eq!(config.cache_duration(), Duration::from_secs(10));
        assert!(config.lookup_latest);
    }

    #[test]
    fn test_partial_override() {
        let config = ConverterConfig::from_toml_str(
            r#"
            target_frame = "odom"
            timer_period_secs = 0.1
            lookup_latest = false
            "#,
        )
        .unwrap();

        assert_eq!(config.target_frame, "odom");
        assert_eq!(config.source_frame, "base_link");
        assert_eq!(config.timer_period(), Duration::from_millis(100));
        assert!(!config.lookup_latest);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(matches!(
            ConverterConfig::from_toml_str("frame = \"map\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for toml in [
            "target_frame = \"\"",
            "source_frame = \"map\"",
            "queue_depth = 0",
            "timer_period_secs = 0.0",
            "timer_period_secs = -1.0",
            "lookup_timeout_secs = -0.5",
            "lookup_timeout_secs = nan",
            "cache_duration_secs = 0.0",
        ] {
            assert!(
                matches!(
                    ConverterConfig::from_toml_str(toml),
                    Err(ConfigError::Invalid(_))
                ),
                "{toml} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_timeout_is_allowed() {
        let config = ConverterConfig::from_toml_str("lookup_timeout_secs = 0.0").unwrap();
        assert_eq!(config.lookup_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ConverterConfig::load("/nonexistent/tf_to_pose.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
