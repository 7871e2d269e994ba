//! Session configuration.
//!
//! ```toml
//! service = "org.bluez"
//! root-path = "/org/bluez"
//! ```
//!
//! Every field is optional. Choosing and addressing the bus is up to the
//! [`Bus`](crate::Bus) implementation handed to the manager.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};
use crate::signature::is_object_path;
use crate::{BLUEZ_ROOT_PATH, BLUEZ_SERVICE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Well-known name of the mirrored service
    pub service: String,
    /// Subtree watched after connecting
    pub root_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: BLUEZ_SERVICE.into(),
            root_path: BLUEZ_ROOT_PATH.into(),
        }
    }
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Config = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.is_empty() {
            return Err(ErrorKind::Config("service must not be empty".into()).into());
        }
        if !is_object_path(&self.root_path) {
            return Err(ErrorKind::Config(format!(
                "root-path '{}' is not an object path",
                self.root_path
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.service, "org.bluez");
        assert_eq!(config.root_path, "/org/bluez");
    }

    #[test]
    fn test_parse() {
        let config = Config::from_toml_str(
            r#"
            service = "org.example.Daemon"
            root-path = "/org/example"
            "#,
        )
        .unwrap();
        assert_eq!(config.service, "org.example.Daemon");
        assert_eq!(config.root_path, "/org/example");
    }

    #[test]
    fn test_invalid() {
        let e = Config::from_toml_str("root-path = \"org/bluez\"").unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Config(_)));

        let e = Config::from_toml_str("service = \"\"").unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Config(_)));

        let e = Config::from_toml_str("bus-address = \"unix:path=/tmp/bus\"").unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Config(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "service = \"org.bluez\"\nroot-path = \"/\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.root_path, "/");

        let e = Config::load("/nonexistent/bluetree.toml").unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::Io(_)));
    }
}
