use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://www.bbc.co.uk";
const DEFAULT_DELAY_SECS: u64 = 2;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("getpids/", env!("CARGO_PKG_VERSION"));

/// Runtime settings. Defaults, then `GETPIDS_*` environment variables, then
/// command-line overrides applied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub delay_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_source(Environment::with_prefix("GETPIDS"))
    }

    fn from_source(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("delay_secs", DEFAULT_DELAY_SECS)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .add_source(env)
            .build()
            .context("Failed to read settings")?;
        settings
            .try_deserialize()
            .context("Invalid GETPIDS_* setting")
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("GETPIDS")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn defaults() {
        let s = Settings::from_source(env(&[])).unwrap();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.delay(), Duration::from_secs(2));
        assert_eq!(s.timeout(), Duration::from_secs(30));
        assert!(s.user_agent.starts_with("getpids/"));
    }

    #[test]
    fn environment_overrides() {
        let s = Settings::from_source(env(&[
            ("GETPIDS_BASE_URL", "http://localhost:8080"),
            ("GETPIDS_DELAY_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(s.base_url, "http://localhost:8080");
        assert_eq!(s.delay_secs, 0);
        assert_eq!(s.timeout_secs, 30);
    }

    #[test]
    fn bad_number_is_rejected() {
        assert!(Settings::from_source(env(&[("GETPIDS_DELAY_SECS", "soon")])).is_err());
    }
}
