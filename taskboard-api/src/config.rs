/// Configuration management for the API server
///
/// # Environment Variables
///
/// | Variable                   | Default             |
/// |----------------------------|---------------------|
/// | `API_HOST`                 | `0.0.0.0`           |
/// | `API_PORT`                 | `8080`              |
/// | `API_PRODUCTION`           | `false`             |
/// | `CORS_ORIGINS`             | `*` (comma list)    |
/// | `DATABASE_URL`             | required            |
/// | `DATABASE_MAX_CONNECTIONS` | `10`                |
/// | `REDIS_URL`                | required            |
/// | `SESSION_COOKIE_NAME`      | `taskboard_session` |
/// | `SESSION_TTL_SECS`         | `604800` (7 days)   |
/// | `SESSION_KEY_PREFIX`       | `sessions`          |
/// | `USER_CACHE_TTL_SECS`      | `300`               |
///
/// # Example
///
/// ```no_run
/// use taskboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub redis: RedisSettings,
    pub session: SessionConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS and the `Secure` cookie attribute
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_secs: u64,

    /// Redis keys are `{key_prefix}:{digest}`
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a resolved user may be served without re-reading it
    pub user_ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "taskboard_session".to_string(),
            ttl_secs: 7 * 24 * 3600,
            key_prefix: "sessions".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { user_ttl_secs: 300 }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let session_defaults = SessionConfig::default();
        let cache_defaults = CacheConfig::default();

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("API_PORT", 8080)?,
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
                production: parse_var("API_PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            redis: RedisSettings {
                url: required_var("REDIS_URL")?,
            },
            session: SessionConfig {
                cookie_name: env::var("SESSION_COOKIE_NAME").unwrap_or(session_defaults.cookie_name),
                ttl_secs: parse_var("SESSION_TTL_SECS", session_defaults.ttl_secs)?,
                key_prefix: env::var("SESSION_KEY_PREFIX").unwrap_or(session_defaults.key_prefix),
            },
            cache: CacheConfig {
                user_ttl_secs: parse_var("USER_CACHE_TTL_SECS", cache_defaults.user_ttl_secs)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn required_var(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            redis: RedisSettings {
                url: "redis://localhost:6379".to_string(),
            },
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
        };

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(SessionConfig::default().ttl(), Duration::from_secs(604_800));
        assert_eq!(CacheConfig::default().user_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        assert_eq!(parse_var("TASKBOARD_TEST_UNSET_VARIABLE", 42u16).unwrap(), 42);
    }
}
