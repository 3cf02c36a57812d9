use anyhow::{Context, Result};

mod logging;

pub use logging::LoggingConfig;

// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_WS_PORT: u16 = 8081;

// Clients without a live socket poll this often (milliseconds)
const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

// Outbound frames buffered per live connection before it is evicted
const DEFAULT_CONNECTION_BUFFER: usize = 64;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;

const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;

/// Upper bound on message text after trimming, in characters
pub const MAX_MESSAGE_TEXT_CHARS: usize = 4000;

/// Upper bound on a single inbound WebSocket frame
pub const MAX_WEBSOCKET_MESSAGE_SIZE: usize = 64 * 1024;

// ============================================================================
// Configuration Structures
// ============================================================================

/// Which MessageStore / UserDirectory implementation backs the server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" | "mem" => Ok(StorageBackend::Memory),
            other => anyhow::bail!(
                "Unknown STORAGE_BACKEND '{}', expected 'postgres' or 'memory'",
                other
            ),
        }
    }
}

/// Database connection pool configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool (seconds)
    pub acquire_timeout_secs: u64,
}

/// Live subscription settings
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Bounded queue length per connection; a full queue evicts the connection
    pub connection_buffer: usize,
    /// Interval advertised to clients that fall back to polling
    pub poll_interval_ms: u64,
}

/// Push collaborator settings
#[derive(Clone, Debug)]
pub struct PushConfig {
    /// Whether pushes are actually sent (disabled = logged and dropped)
    pub enabled: bool,
    /// HTTP endpoint accepting Expo-style push requests
    pub endpoint: String,
    /// Optional bearer token for the push service
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub ws_port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub db: DbConfig,
    pub rust_log: String,
    pub logging: LoggingConfig,
    pub realtime: RealtimeConfig,
    pub push: PushConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let storage_backend: StorageBackend = std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let config = Self {
            port: parse_env("PORT", DEFAULT_PORT)?,
            ws_port: parse_env("WS_PORT", DEFAULT_WS_PORT)?,
            storage_backend,
            database_url,
            db: DbConfig {
                max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                acquire_timeout_secs: parse_env(
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
                )?,
            },
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            logging: LoggingConfig::from_env()?,
            realtime: RealtimeConfig {
                connection_buffer: parse_env(
                    "REALTIME_CONNECTION_BUFFER",
                    DEFAULT_CONNECTION_BUFFER,
                )?,
                poll_interval_ms: parse_env("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            },
            push: PushConfig {
                enabled: std::env::var("PUSH_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                endpoint: std::env::var("PUSH_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_PUSH_ENDPOINT.to_string()),
                access_token: std::env::var("PUSH_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
                timeout_secs: parse_env("PUSH_TIMEOUT_SECS", DEFAULT_PUSH_TIMEOUT_SECS)?,
            },
        };

        if config.realtime.connection_buffer == 0 {
            anyhow::bail!("REALTIME_CONNECTION_BUFFER must be at least 1");
        }

        Ok(config)
    }
}

/// Reads an optional numeric variable, failing loudly on garbage
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", name, raw)),
        _ => Ok(default),
    }
}
