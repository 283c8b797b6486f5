use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::forms::DEFAULT_OUTPUT_DIR;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub forms: FormsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            forms: FormsConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where templates are read from and where filled forms are written.
#[derive(Debug, Clone)]
pub struct FormsConfig {
    /// Directory holding the fillable PDF template.
    pub template_dir: PathBuf,
    pub template_name: String,
    /// Directory holding the HTML entry pages.
    pub pages_dir: PathBuf,
    /// Filesystem root that logical output paths are resolved under.
    pub storage_root: PathBuf,
    /// Logical directory filled forms are named into.
    pub output_dir: String,
    pub cache_templates: bool,
}

impl FormsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let cache_templates = match var_or("FORM_CACHE_TEMPLATE", "true")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(ConfigError::InvalidFlag {
                    name: "FORM_CACHE_TEMPLATE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            template_dir: PathBuf::from(var_or("FORM_TEMPLATE_DIR", "./assets")),
            template_name: var_or("FORM_TEMPLATE_NAME", "f1040.pdf"),
            pages_dir: PathBuf::from(var_or("FORM_PAGES_DIR", "./services/api/templates")),
            storage_root: PathBuf::from(var_or("FORM_STORAGE_ROOT", "./data")),
            output_dir: var_or("FORM_OUTPUT_DIR", DEFAULT_OUTPUT_DIR),
            cache_templates,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidFlag { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "FORM_TEMPLATE_DIR",
            "FORM_TEMPLATE_NAME",
            "FORM_PAGES_DIR",
            "FORM_STORAGE_ROOT",
            "FORM_OUTPUT_DIR",
            "FORM_CACHE_TEMPLATE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.forms.template_name, "f1040.pdf");
        assert_eq!(config.forms.output_dir, "/content/filled-forms");
        assert!(config.forms.cache_templates);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn form_locations_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FORM_TEMPLATE_DIR", "/srv/forms");
        env::set_var("FORM_TEMPLATE_NAME", "f1040-2023.pdf");
        env::set_var("FORM_OUTPUT_DIR", "/content/out");
        env::set_var("FORM_CACHE_TEMPLATE", "off");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.forms.template_dir, PathBuf::from("/srv/forms"));
        assert_eq!(config.forms.template_name, "f1040-2023.pdf");
        assert_eq!(config.forms.output_dir, "/content/out");
        assert!(!config.forms.cache_templates);
        reset_env();
    }

    #[test]
    fn rejects_unparseable_flags_and_ports() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FORM_CACHE_TEMPLATE", "sometimes");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag { name: "FORM_CACHE_TEMPLATE", .. })
        ));

        reset_env();
        env::set_var("APP_PORT", "not-a-port");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPort)));
        reset_env();
    }
}
