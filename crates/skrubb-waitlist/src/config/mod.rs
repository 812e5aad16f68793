use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use url::Url;

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

/// Top-level configuration for the waiting-list service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub relay: RelayConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_default());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            relay: RelayConfig::from_env()?,
            cors: CorsConfig::from_env(environment),
            rate_limit: RateLimitConfig::from_env()?,
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

/// Output layout of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Body encoding used when forwarding a submission downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// The full sanitized submission as a JSON document.
    Json,
    /// URL-encoded `email`, `type` and `timestamp` fields.
    Form,
}

impl PayloadFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(Self::Json),
            "form" | "urlencoded" => Ok(Self::Form),
            other => Err(ConfigError::InvalidPayloadFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// Where and how validated submissions are forwarded.
///
/// The destination is optional so the service can still boot without it;
/// submissions then fail with a configuration error instead of being dropped.
#[derive(Clone)]
pub struct RelayConfig {
    pub destination: Option<Url>,
    pub payload_format: PayloadFormat,
    pub response_inspectable: bool,
    pub timeout: Duration,
}

impl RelayConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    fn from_env() -> Result<Self, ConfigError> {
        let destination = match env::var("RELAY_DESTINATION_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_destination(&raw)?),
            _ => None,
        };

        let payload_format =
            PayloadFormat::parse(&env::var("RELAY_PAYLOAD_FORMAT").unwrap_or_default())?;

        let response_inspectable = match env::var("RELAY_RESPONSE_INSPECTABLE") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "RELAY_RESPONSE_INSPECTABLE",
            })?,
            Err(_) => true,
        };

        let timeout = match env::var("RELAY_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_positive(&raw, "RELAY_TIMEOUT_SECS")?),
            Err(_) => Self::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            destination,
            payload_format,
            response_inspectable,
            timeout,
        })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            destination: None,
            payload_format: PayloadFormat::Json,
            response_inspectable: true,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

// The destination is a secret; keep it out of debug output and logs.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field(
                "destination",
                &self.destination.as_ref().map(|_| "<configured>"),
            )
            .field("payload_format", &self.payload_format)
            .field("response_inspectable", &self.response_inspectable)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    fn from_env(environment: AppEnvironment) -> Self {
        let allowed_origins = match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) if environment == AppEnvironment::Production => Vec::new(),
            Err(_) => vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        };

        Self { allowed_origins }
    }
}

/// Sliding window applied per source address to the `/api/` routes.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let window = match env::var("RATE_LIMIT_WINDOW_SECS") {
            Ok(raw) => Duration::from_secs(parse_positive(&raw, "RATE_LIMIT_WINDOW_SECS")?),
            Err(_) => Duration::from_secs(15 * 60),
        };
        let max_requests = match env::var("RATE_LIMIT_MAX_REQUESTS") {
            Ok(raw) => u32::try_from(parse_positive(&raw, "RATE_LIMIT_MAX_REQUESTS")?)
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "RATE_LIMIT_MAX_REQUESTS",
                })?,
            Err(_) => 10,
        };

        Ok(Self {
            window,
            max_requests,
        })
    }
}

fn parse_destination(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidDestination {
        reason: source.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::InvalidDestination {
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive(raw: &str, key: &'static str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber { key }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDestination { reason: String },
    InvalidPayloadFormat { value: String },
    InvalidFlag { key: &'static str },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            // The URL itself is never echoed back.
            ConfigError::InvalidDestination { reason } => {
                write!(f, "RELAY_DESTINATION_URL is not a usable http(s) URL: {reason}")
            }
            ConfigError::InvalidPayloadFormat { value } => {
                write!(f, "RELAY_PAYLOAD_FORMAT must be 'json' or 'form', got '{value}'")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
