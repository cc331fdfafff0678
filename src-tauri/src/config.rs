//! Konfiguration
//!
//! Wird einmal beim Start aus Umgebungsvariablen gebaut und danach
//! nicht mehr verändert.

use once_cell::sync::OnceCell;
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Standard Backend URL (lokaler Entwicklungs-Server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// User-ID unter der das Backend den AI-Agenten in den Call schickt
pub const DEFAULT_AGENT_USER_ID: &str = "lucy";

/// Timeout für Join und Agent-Connect (jeweils pro Branch)
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 30;

/// Frames pro Sekunde für den Audio-Visualizer
pub const DEFAULT_FRAME_RATE: u32 = 30;

const ENV_BASE_URL: &str = "AGENT_CALL_BASE_URL";
const ENV_AGENT_USER_ID: &str = "AGENT_CALL_AGENT_ID";
const ENV_JOIN_TIMEOUT: &str = "AGENT_CALL_JOIN_TIMEOUT_SECS";
const ENV_FRAME_RATE: &str = "AGENT_CALL_FPS";

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid base URL '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

// ============================================================================
// APP CONFIG
// ============================================================================

/// Prozessweite Konfiguration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: Url,
    pub agent_user_id: String,
    /// `None` = kein Timeout
    pub join_timeout: Option<Duration>,
    pub frame_rate: u32,
    /// Beim Auflegen den Call für alle beenden (gibt auch den Agenten frei)
    pub end_call_on_hang_up: bool,
}

impl AppConfig {
    /// Baut die Konfiguration aus Umgebungsvariablen (mit Defaults)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Wie `from_env`, aber mit beliebiger Quelle (für Tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::defaults()?;

        if let Some(raw) = lookup(ENV_BASE_URL) {
            config.base_url = parse_base_url(&raw)?;
        }

        if let Some(agent) = lookup(ENV_AGENT_USER_ID).filter(|s| !s.trim().is_empty()) {
            config.agent_user_id = agent.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_JOIN_TIMEOUT) {
            let secs = parse_number::<u64>(ENV_JOIN_TIMEOUT, &raw)?;
            config.join_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup(ENV_FRAME_RATE) {
            let fps = parse_number::<u32>(ENV_FRAME_RATE, &raw)?;
            if fps == 0 {
                return Err(ConfigError::InvalidNumber {
                    name: ENV_FRAME_RATE,
                    value: raw,
                });
            }
            config.frame_rate = fps;
        }

        Ok(config)
    }

    /// Setzt die globale Konfiguration (einmalig)
    pub fn install(self) -> Result<&'static AppConfig, ConfigError> {
        CONFIG
            .set(self)
            .map_err(|_| ConfigError::AlreadyInitialized)?;
        CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
    }

    /// Gibt die globale Konfiguration zurück (falls installiert)
    pub fn get() -> Option<&'static AppConfig> {
        CONFIG.get()
    }

    /// Intervall zwischen zwei Visualizer-Frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    /// Konfiguration ohne Umgebungsvariablen
    pub fn defaults() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            agent_user_id: DEFAULT_AGENT_USER_ID.to_string(),
            join_timeout: Some(Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS)),
            frame_rate: DEFAULT_FRAME_RATE,
            end_call_on_hang_up: true,
        })
    }
}

/// Parst die Backend URL. Ein abschließender Slash wird ergänzt, damit
/// `Url::join` relative Routen unterhalb des Pfads auflöst.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash).map_err(|source| ConfigError::InvalidBaseUrl {
        value: trimmed.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}

// ============================================================================
// TESTS
// ============================================================================
