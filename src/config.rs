//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// Development default values.
pub mod defaults {
    pub const DEV_LOG_LEVEL: &str = "debug";
    pub const PROD_LOG_LEVEL: &str = "info";
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 500;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Tracing filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Page size of error searches when none is requested
    pub default_page_size: u32,
    /// Largest page size a caller may request
    pub max_page_size: u32,
    /// Snapshot used when the command line does not name one
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production, default: development)
    /// - `ARA_LOG_LEVEL`: Tracing filter (default: debug in development, info in production)
    /// - `ARA_DEFAULT_PAGE_SIZE`: Default page size of error searches (default: 10)
    /// - `ARA_MAX_PAGE_SIZE`: Largest accepted page size (default: 500)
    /// - `ARA_SNAPSHOT_PATH`: Default JSON snapshot file
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("RUST_ENV") {
            Ok(value) => Environment::parse(&value).ok_or(ConfigError::InvalidValue(
                "RUST_ENV must be 'development' or 'production'",
            ))?,
            Err(_) => Environment::Development,
        };

        let log_level = env::var("ARA_LOG_LEVEL").unwrap_or_else(|_| {
            if environment.is_development() {
                defaults::DEV_LOG_LEVEL.to_string()
            } else {
                defaults::PROD_LOG_LEVEL.to_string()
            }
        });

        let default_page_size = env::var("ARA_DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| defaults::DEFAULT_PAGE_SIZE.to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue("ARA_DEFAULT_PAGE_SIZE must be a valid number"))?;

        let max_page_size = env::var("ARA_MAX_PAGE_SIZE")
            .unwrap_or_else(|_| defaults::MAX_PAGE_SIZE.to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidValue("ARA_MAX_PAGE_SIZE must be a valid number"))?;

        let snapshot_path = env::var("ARA_SNAPSHOT_PATH").ok().map(PathBuf::from);

        let config = Config {
            environment,
            log_level,
            default_page_size,
            max_page_size,
            snapshot_path,
        };

        config.validate()?;
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue("page sizes must be positive"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(
                "ARA_DEFAULT_PAGE_SIZE must not exceed ARA_MAX_PAGE_SIZE",
            ));
        }
        Ok(())
    }

    /// Reject development-only settings in production.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if matches!(self.log_level.as_str(), "debug" | "trace") {
            errors.push(format!(
                "ARA_LOG_LEVEL is '{}'. Use info or a narrower filter in production.",
                self.log_level
            ));
        }

        if let Some(ref path) = self.snapshot_path
            && path.is_relative()
        {
            errors.push(format!(
                "ARA_SNAPSHOT_PATH '{}' is relative. Use an absolute path in production.",
                path.display()
            ));
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Clamp a requested page size to the configured bounds.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(0) | None => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            environment: Environment::Development,
            log_level: defaults::DEV_LOG_LEVEL.to_string(),
            default_page_size: defaults::DEFAULT_PAGE_SIZE,
            max_page_size: defaults::MAX_PAGE_SIZE,
            snapshot_path: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
