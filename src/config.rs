use crate::queue::{PacingConfig, SendPacing};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Connection settings for the REST API
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL including the API prefix, e.g. `https://host/api/v1`
    pub base_url: String,
    /// Raw `Cookie` header value carrying the authenticated session
    pub session_cookie: Option<String>,
    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            session_cookie: None,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }
}

/// Application configuration
/// In debug builds a `.env` file is loaded first; values always come from `KRYTEN_*` variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub api: ApiConfig,
    /// Pacing for playlist/marathon application
    pub pacing: PacingConfig,
    /// Pacing for the interactive send path
    pub send_pacing: SendPacing,
    /// Where saved marathons are persisted
    pub marathons_path: PathBuf,
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: Dev mode activated - loaded .env file");
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("KRYTEN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let session_cookie = lookup("KRYTEN_SESSION_COOKIE").filter(|c| !c.trim().is_empty());

        let timeout_secs = parse_var(
            &lookup,
            "KRYTEN_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let request_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let defaults = PacingConfig::default();
        let pacing = PacingConfig {
            item_delay: Duration::from_millis(parse_var(
                &lookup,
                "KRYTEN_QUEUE_DELAY_MS",
                defaults.item_delay.as_millis() as u64,
            )?),
            burst_every: parse_var(&lookup, "KRYTEN_BURST_EVERY", defaults.burst_every)?,
            burst_multiplier: parse_var(
                &lookup,
                "KRYTEN_BURST_MULTIPLIER",
                defaults.burst_multiplier,
            )?,
        };

        if pacing.burst_every == 0 {
            return Err(ConfigError::InvalidValue {
                name: "KRYTEN_BURST_EVERY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let send_defaults = SendPacing::default();
        let send_delay = Duration::from_millis(parse_var(
            &lookup,
            "KRYTEN_SEND_DELAY_MS",
            send_defaults.item_delay.as_millis() as u64,
        )?);
        let send_pacing = SendPacing {
            item_delay: send_delay,
            clear_settle: send_delay,
        };

        let marathons_path = match lookup("KRYTEN_MARATHONS_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_marathons_path()?,
        };

        info!(
            "Config: API {} ({}), queue delay {:?}, burst every {}",
            base_url,
            if session_cookie.is_some() {
                "session cookie set"
            } else {
                "no session cookie"
            },
            pacing.item_delay,
            pacing.burst_every
        );

        Ok(Self {
            api: ApiConfig {
                base_url,
                session_cookie,
                request_timeout,
            },
            pacing,
            send_pacing,
            marathons_path,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// `~/.kryten/marathons.json`
fn default_marathons_path() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".kryten").join("marathons.json"))
}
