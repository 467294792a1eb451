use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

/// Fixed at build time in the shipped product; overridable here for staging.
pub const DEFAULT_RELAY_URL: &str = "https://relay.statiflix.net/store";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_relay_url")]
    pub relay_url: Url,
    #[serde(default)]
    pub cookie_store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            cookie_store_path: None,
        }
    }
}

fn default_relay_url() -> Url {
    Url::parse(DEFAULT_RELAY_URL).unwrap()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        toml::from_str(&fs_err::read_to_string(path)?)
            .with_context(|| format!("While trying to parse {path:?} as Config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.relay_url.as_str(), DEFAULT_RELAY_URL);
        assert_eq!(config.cookie_store_path, None);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: Config = toml::from_str(
            r#"
                relay_url = "https://staging.example/store"
                cookie_store_path = "ignore/cookies.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.relay_url.as_str(), "https://staging.example/store");
        assert_eq!(
            config.cookie_store_path,
            Some(PathBuf::from("ignore/cookies.json"))
        );
    }
}
