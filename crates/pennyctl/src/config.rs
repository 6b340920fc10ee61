//! Optional TOML configuration for the REPL host.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub persona: Option<String>,
    pub session_seed: Option<u64>,
    pub workspace: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// No path means no config file, which is fine: everything has a
    /// flag-level default.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(Path::new(p)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let config: Config = toml::from_str("persona = \"deadpan\"").unwrap();
        assert_eq!(config.persona.as_deref(), Some("deadpan"));
        assert_eq!(config.session_seed, None);
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = Config::load_or_default(None).unwrap();
        assert!(config.persona.is_none());
        assert!(config.workspace.is_none());
    }
}
