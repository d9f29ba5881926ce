/// Configuration management
///
/// Loads configuration from environment variables, with `.env` support for
/// development.
///
/// # Environment Variables
///
/// | Variable | Default | Notes |
/// |----------|---------|-------|
/// | `API_HOST` | `0.0.0.0` | |
/// | `API_PORT` | `5000` | |
/// | `CORS_ORIGINS` | `*` | Comma-separated |
/// | `PRODUCTION` | `false` | Enables HSTS |
/// | `DATABASE_URL` | required | |
/// | `DATABASE_MAX_CONNECTIONS` | `10` | |
/// | `RUN_MIGRATIONS` | `true` | Apply migrations at startup |
/// | `JWT_SECRET` | required | At least 32 characters |
/// | `JWT_EXPIRATION_HOURS` | `24` | 1 to 8760 (one year) |
/// | `ADMIN_ONLY_PROJECT_CREATION` | `true` | |
///
/// # Example
///
/// ```no_run
/// use bugtracker_api::config::Config;
///
/// let config = Config::from_env().expect("Failed to load config");
/// println!("Listening on {}", config.bind_address());
/// ```

use serde::{Deserialize, Serialize};

/// Longest accepted token lifetime, one year
pub const MAX_JWT_EXPIRATION_HOURS: i64 = 24 * 365;
use std::env;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub policy: PolicyConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (adds HSTS)
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,

    /// Access token lifetime
    pub expiration_hours: i64,
}

/// Deployment policy switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Only admins may create projects
    pub admin_only_project_creation: bool,
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
    }
}

impl Config {
    /// Loads configuration from the process environment (and `.env`)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("API_PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = match var("PRODUCTION") {
            Some(value) => parse_bool("PRODUCTION", &value)?,
            None => false,
        };

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let run_migrations = match var("RUN_MIGRATIONS") {
            Some(value) => parse_bool("RUN_MIGRATIONS", &value)?,
            None => true,
        };

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let expiration_hours = var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|| "24".to_string())
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("JWT_EXPIRATION_HOURS is invalid: {}", e))?;

        if expiration_hours <= 0 {
            anyhow::bail!("JWT_EXPIRATION_HOURS must be positive");
        }
        if expiration_hours > MAX_JWT_EXPIRATION_HOURS {
            anyhow::bail!(
                "JWT_EXPIRATION_HOURS must be at most {}",
                MAX_JWT_EXPIRATION_HOURS
            );
        }

        let admin_only_project_creation = match var("ADMIN_ONLY_PROJECT_CREATION") {
            Some(value) => parse_bool("ADMIN_ONLY_PROJECT_CREATION", &value)?,
            None => true,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins: if cors_origins.is_empty() {
                    vec!["*".to_string()]
                } else {
                    cors_origins
                },
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expiration_hours,
            },
            policy: PolicyConfig {
                admin_only_project_creation,
            },
        })
    }

    /// Gets the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}
