use anyhow::{Result, anyhow};
use std::env;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Hosted language model configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    /// Fallback preference order; `None` means the provider's default list
    pub models: Option<Vec<String>>,
    pub site_url: String,
    pub app_title: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            llm: LLMConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            llm_provider = ?self.llm.provider,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_models = ?self.llm.models,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let failure = if !self.database.url.starts_with("sqlite:") {
            Some("DATABASE_URL must start with 'sqlite:'")
        } else if self.server.port == 0 {
            Some("Server port must be greater than 0")
        } else if matches!(&self.llm.models, Some(models) if models.is_empty()) {
            Some("LLM_MODELS must list at least one model")
        } else {
            None
        };

        if let Some(message) = failure {
            log_validation!(failure, "configuration", error = message);
            return Err(anyhow!(message));
        }

        // A missing key is survivable: every AI endpoint degrades to its static fallback
        if self.llm.api_key.is_empty() {
            warn!("LLM API key is not set - AI features will use static fallbacks");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
        {
            warn!("Unusual log level '{}', filter may fall back to defaults", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:misspoke.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl LLMConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .unwrap_or_default();

        let base_url = env::var("LLM_BASE_URL").ok().filter(|s| !s.is_empty());

        let provider = LLMProviderType::parse(
            &env::var("LLM_PROVIDER").unwrap_or_else(|_| "openrouter".to_string()),
        );

        let models = env::var("LLM_MODELS").ok().map(|raw| parse_model_list(&raw));

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let app_title = env::var("APP_TITLE").unwrap_or_else(|_| "Language Tutor Bot".to_string());

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            models,
            site_url,
            app_title,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,misspoke=debug".to_string());

        let file_enabled = parse_flag(env::var("LOG_FILE_ENABLED").ok().as_deref(), true);
        let console_enabled = parse_flag(env::var("LOG_CONSOLE_ENABLED").ok().as_deref(), true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Split a comma separated model list, dropping blanks
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: Option<&str>, default: bool) -> bool {
    value.and_then(|v| v.trim().parse::<bool>().ok()).unwrap_or(default)
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 || !data.is_char_boundary(4) || !data.is_char_boundary(data.len() - 4) {
        "*".repeat(data.chars().count())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            llm: LLMConfig {
                api_key: "sk-or-valid-key".to_string(),
                base_url: None,
                provider: LLMProviderType::OpenRouter,
                models: None,
                site_url: "http://localhost:3000".to_string(),
                app_title: "Language Tutor Bot".to_string(),
            },
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        }
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:misspoke.db"), "sqli***e.db");
        assert_eq!(mask_sensitive_data("sk-1234567890abcdef"), "sk-1***cdef");
    }

    #[test]
    fn test_parse_model_list() {
        assert_eq!(
            parse_model_list(" openai/gpt-4o-mini, ,anthropic/claude-3.5-sonnet,"),
            vec!["openai/gpt-4o-mini", "anthropic/claude-3.5-sonnet"]
        );
        assert!(parse_model_list("").is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("false"), true));
        assert!(parse_flag(Some("garbage"), true));
        assert!(!parse_flag(Some(" nope "), false));
    }

    #[test]
    fn test_config_validation() {
        let config = base_config();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.server.port = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.database.url = "postgres://localhost/db".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.llm.models = Some(vec![]);
        assert!(invalid.validate().is_err());

        // Missing key only warns
        let mut keyless = config;
        keyless.llm.api_key.clear();
        assert!(keyless.validate().is_ok());
    }
}
