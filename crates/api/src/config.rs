//! Process configuration.
//!
//! Values come from the environment. If `SERVICE_CONF` names a file, its
//! `KEY=VALUE` lines fill in whatever the environment does not set.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use corpreg_auth::DEFAULT_ALLOWED_COUNTRY;
use corpreg_infra::event_log::DEFAULT_STREAM_KEY;
use corpreg_infra::region::DEFAULT_IPAPI_BASE_URL;
use corpreg_infra::store::PostgresOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("failed to read config file {path}: {message}")]
    File { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub database: String,
    pub max_conns: u32,
    pub max_idle_conn_time: Duration,
    pub conn_max_lifetime: Duration,
}

impl PostgresConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}?sslmode=disable&connect_timeout=10",
            self.user, self.password, self.host, self.database
        )
    }

    pub fn options(&self) -> PostgresOptions {
        PostgresOptions {
            url: self.url(),
            max_connections: self.max_conns,
            idle_timeout: self.max_idle_conn_time,
            max_lifetime: self.conn_max_lifetime,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub redis_url: Option<String>,
    pub stream: String,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub ipapi_base_url: String,
    pub ipapi_request_timeout: Duration,
    pub allowed_country: String,
    pub dev_mode: bool,
    pub jwt_secret: String,
    /// Cancel requests that run longer than this. `None`: no limit.
    pub request_timeout: Option<Duration>,
    pub use_persistent_stores: bool,
    /// Present whenever `use_persistent_stores` is set.
    pub postgres: Option<PostgresConfig>,
    pub events: EventsConfig,
}

impl Config {
    /// Environment plus the optional `SERVICE_CONF` file.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("SERVICE_CONF") {
            Ok(path) if !path.is_empty() => read_dotenv(Path::new(&path))?,
            _ => HashMap::new(),
        };
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let use_persistent_stores = env.bool_or("USE_PERSISTENT_STORES", false)?;

        let postgres = if use_persistent_stores {
            Some(PostgresConfig {
                user: env.required("POSTGRES_USER")?,
                password: env.required("POSTGRES_PASSWORD")?,
                host: env.required("POSTGRES_HOST")?,
                database: env.required("POSTGRES_DATABASE")?,
                max_conns: env.parsed_or("POSTGRES_MAX_CONNS", 20)?,
                max_idle_conn_time: env.duration_or(
                    "POSTGRES_MAX_IDLE_CONN_TIME",
                    Duration::from_secs(5 * 60),
                )?,
                conn_max_lifetime: env.duration_or(
                    "POSTGRES_CONN_MAX_LIFETIME",
                    Duration::from_secs(10 * 60),
                )?,
            })
        } else {
            None
        };

        let redis_url = env.get("EVENTS_REDIS_URL");
        if use_persistent_stores && redis_url.is_none() {
            return Err(ConfigError::Missing("EVENTS_REDIS_URL"));
        }

        Ok(Self {
            listen_addr: parse_listen_addr(&env.string_or("PORT", ":8080"))?,
            ipapi_base_url: env.string_or("IPAPI_BASE_URL", DEFAULT_IPAPI_BASE_URL),
            ipapi_request_timeout: env
                .duration_or("IPAPI_REQUEST_TIMEOUT", Duration::from_secs(2))?,
            allowed_country: env.string_or("ALLOWED_COUNTRY", DEFAULT_ALLOWED_COUNTRY),
            dev_mode: env.bool_or("DEVELOPMENT_MODE", false)?,
            jwt_secret: env.string_or("JWT_SECRET", "test"),
            request_timeout: env
                .get("REQUEST_TIMEOUT")
                .map(|v| parse_duration(&v).map_err(|message| ConfigError::Invalid {
                    var: "REQUEST_TIMEOUT",
                    message,
                }))
                .transpose()?,
            use_persistent_stores,
            postgres,
            events: EventsConfig {
                redis_url,
                stream: env.string_or("EVENTS_STREAM", DEFAULT_STREAM_KEY),
                write_timeout: env.duration_or("EVENTS_WRITE_TIMEOUT", Duration::from_secs(2))?,
            },
        })
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: key,
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                var: key,
                message: format!("expected a boolean, got {v:?}"),
            }),
            None => Ok(default),
        }
    }

    fn duration_or(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.get(key) {
            Some(v) => parse_duration(&v).map_err(|message| ConfigError::Invalid { var: key, message }),
            None => Ok(default),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Some(true),
        "0" | "f" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Go-style durations: `250ms`, `2s`, `5m`, `1h`, and compounds like `1m30s`.
pub fn parse_duration(v: &str) -> Result<Duration, String> {
    let v = v.trim();
    humantime::parse_duration(v).map_err(|e| format!("invalid duration {v:?}: {e}"))
}

/// `:8080` and `8080` listen on all interfaces; `host:port` is taken as is.
pub fn parse_listen_addr(v: &str) -> Result<SocketAddr, ConfigError> {
    let v = v.trim();
    let full = if let Some(port) = v.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if v.chars().all(|c| c.is_ascii_digit()) {
        format!("0.0.0.0:{v}")
    } else {
        v.to_string()
    };
    full.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        var: "PORT",
        message: e.to_string(),
    })
}

/// Parse a dotenv-style file: `KEY=VALUE` per line, `#` comments, optional
/// `export ` prefix and surrounding quotes.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_dotenv(&content))
}

fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
