use std::env;

use crate::error::AppError;

/// Default location of the IWC workflow manifest.
pub const DEFAULT_IWC_MANIFEST_URL: &str = "https://iwc.galaxyproject.org/workflow_manifest.json";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub galaxy: GalaxyConfig,
    pub iwc: IwcConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub methods: MethodsConfig,
}

/// Galaxy connection defaults used when connect is issued without explicit values
#[derive(Clone, Default)]
pub struct GalaxyConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for GalaxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalaxyConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// IWC workflow catalog configuration
#[derive(Debug, Clone)]
pub struct IwcConfig {
    pub manifest_url: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Methods generation configuration
#[derive(Debug, Clone, Default)]
pub struct MethodsConfig {
    /// Deadline for a whole methods generation run; no deadline when unset.
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let galaxy = GalaxyConfig {
            url: non_empty_var("GALAXY_URL"),
            api_key: non_empty_var("GALAXY_API_KEY"),
        };

        if let Some(url) = &galaxy.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config {
                    message: format!("GALAXY_URL must be an http(s) URL, got '{}'", url),
                });
            }
        }

        let iwc = IwcConfig {
            manifest_url: env::var("IWC_MANIFEST_URL")
                .unwrap_or_else(|_| DEFAULT_IWC_MANIFEST_URL.to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: parsed_var("REQUEST_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_retries: parsed_var("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay_ms: parsed_var("RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
        };

        let methods = MethodsConfig {
            timeout_ms: parsed_var("METHODS_TIMEOUT_MS"),
        };

        Ok(Config {
            galaxy,
            iwc,
            logging,
            request,
            methods,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for IwcConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_IWC_MANIFEST_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_defaults() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay_ms, 500);
    }

    #[test]
    fn test_galaxy_config_debug_redacts_key() {
        let config = GalaxyConfig {
            url: Some("https://usegalaxy.org".to_string()),
            api_key: Some("secret-key".to_string()),
        };
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("usegalaxy.org"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn test_iwc_default_manifest() {
        assert_eq!(IwcConfig::default().manifest_url, DEFAULT_IWC_MANIFEST_URL);
    }
}
