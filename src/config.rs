//! Application configuration.
//!
//! Layered: built-in defaults, then an optional config file, then `GAIA_`
//! environment variables. The per-user data root bounds every persistent
//! artifact the host writes.

use std::net::SocketAddr;
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use browser_session::BrowserSessionConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    #[serde(default = "default_evaluate_timeout_ms")]
    pub evaluate_timeout_ms: u64,
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
    #[serde(default = "default_action_seconds")]
    pub max_action_seconds: f64,
}

fn default_evaluate_timeout_ms() -> u64 {
    10_000
}

fn default_max_elements() -> usize {
    2200
}

fn default_action_seconds() -> f64 {
    45.0
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VlmConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding the bearer token; the token itself never
    /// lives in config files.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "GAIA_VLM_TOKEN".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub vlm: VlmConfig,
    /// Root for traces, pdfs, screenshots and downloads.
    pub data_root: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            vlm: VlmConfig::default(),
            data_root: default_data_root(),
        }
    }
}

fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gaia")
}

impl AppConfig {
    /// Load configuration: defaults, optional file, `GAIA_` env overrides
    /// (`GAIA_SERVER__PORT=9000` style nesting).
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = Config::builder()
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("browser.headless", defaults.browser.headless)?
            .set_default(
                "browser.evaluate_timeout_ms",
                defaults.browser.evaluate_timeout_ms as i64,
            )?
            .set_default("browser.max_elements", defaults.browser.max_elements as i64)?
            .set_default("browser.max_action_seconds", defaults.browser.max_action_seconds)?
            .set_default("vlm.token_env", defaults.vlm.token_env.clone())?
            .set_default(
                "data_root",
                defaults.data_root.to_string_lossy().to_string(),
            )?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("GAIA").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.server.host, self.server.port).parse()?)
    }

    /// Session-layer view of the browser settings.
    pub fn session_config(&self) -> BrowserSessionConfig {
        BrowserSessionConfig {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            evaluate_timeout_ms: self.browser.evaluate_timeout_ms,
            data_root: self.data_root.clone(),
            ..BrowserSessionConfig::default()
        }
    }

    /// Bearer token for the vision endpoint, resolved from the environment.
    pub fn vlm_token(&self) -> Option<String> {
        std::env::var(&self.vlm.token_env).ok().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.max_elements, 2200);
        assert!(config.data_root.ends_with("gaia"));
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let config = AppConfig::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn session_config_carries_the_data_root() {
        let config = AppConfig::default();
        let session = config.session_config();
        assert_eq!(session.data_root, config.data_root);
        assert_eq!(session.evaluate_timeout_ms, 10_000);
    }
}
