use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Rings to stand up, read from a TOML file.
///
/// ```toml
/// log_level = "debug"
///
/// [[rings]]
/// name = "md_bus"
/// max_consumers = 8
/// buffer_size = 1048576
/// ```
#[derive(Deserialize, Debug)]
pub struct ProvisionConfig {
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Overrides the platform base directory when set.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub rings: Vec<RingConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    pub name: String,
    #[serde(default = "defaults::max_consumers")]
    pub max_consumers: u8,
    #[serde(default = "defaults::event_size")]
    pub event_size: u16,
    #[serde(default = "defaults::buffer_size")]
    pub buffer_size: u32,
    #[serde(default)]
    pub hugepage_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn log_level() -> String {
        "info".into()
    }

    pub fn max_consumers() -> u8 {
        4
    }

    pub fn event_size() -> u16 {
        64
    }

    pub fn buffer_size() -> u32 {
        1 << 16 // 65536
    }
}

impl ProvisionConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ProvisionConfig::from_toml(
            r#"
            [[rings]]
            name = "md_bus"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.base_dir, None);
        assert_eq!(
            config.rings,
            vec![RingConfig {
                name: "md_bus".into(),
                max_consumers: 4,
                event_size: 64,
                buffer_size: 65536,
                hugepage_size: 0,
            }]
        );
    }

    #[test]
    fn explicit_fields_win() {
        let config = ProvisionConfig::from_toml(
            r#"
            log_level = "debug"
            base_dir = "/mnt/huge/hft"

            [[rings]]
            name = "orders"
            max_consumers = 1
            event_size = 0
            buffer_size = 4194304
            hugepage_size = 2097152
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.base_dir, Some(PathBuf::from("/mnt/huge/hft")));
        let ring = &config.rings[0];
        assert_eq!(ring.event_size, 0);
        assert_eq!(ring.hugepage_size, 2 * 1024 * 1024);
    }

    #[test]
    fn empty_file_is_valid() {
        let config = ProvisionConfig::from_toml("").unwrap();
        assert!(config.rings.is_empty());
    }

    #[test]
    fn bad_types_are_parse_errors() {
        let err = ProvisionConfig::from_toml("[[rings]]\nname = \"x\"\nmax_consumers = 300\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ProvisionConfig::load("/nonexistent/hftshm.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
