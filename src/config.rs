//! Configuration, built from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::delivery::{DeliveryMode, QueueConfig};
use crate::error::ConfigError;
use crate::flow::EngineSettings;

/// Where sessions, cooldowns and leads live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    LibSql,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            other => Err(format!("unknown store '{other}' (expected memory|libsql)")),
        }
    }
}

/// WhatsApp Cloud API credentials.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub token: SecretString,
    pub phone_number_id: String,
}

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub port: u16,
    pub store: StoreBackend,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
    pub cooldown_ttl: Duration,
    pub delivery: DeliveryMode,
    pub queue: QueueConfig,
    pub reset_keyword: String,
    pub admin_phone: Option<String>,
    pub fallback_log: PathBuf,
    pub suppliers_file: Option<PathBuf>,
    /// `None` means outbound messages are only logged.
    pub whatsapp: Option<WhatsAppConfig>,
    /// `None` refuses the webhook verification handshake.
    pub verify_token: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            port: 8080,
            store: StoreBackend::Memory,
            db_path: PathBuf::from("./data/lead-intake.db"),
            session_ttl: engine.session_ttl,
            cooldown_ttl: engine.cooldown_ttl,
            delivery: DeliveryMode::Direct,
            queue: QueueConfig::default(),
            reset_keyword: engine.reset_keyword,
            admin_phone: None,
            fallback_log: PathBuf::from("./data/leads_fallback.jsonl"),
            suppliers_file: None,
            whatsapp: None,
            verify_token: None,
        }
    }
}

impl IntakeConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup. Unset and blank
    /// variables take their defaults; malformed ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let whatsapp = match (get("WHATSAPP_TOKEN"), get("WHATSAPP_PHONE_NUMBER_ID")) {
            (Some(token), Some(phone_number_id)) => Some(WhatsAppConfig {
                token: SecretString::from(token),
                phone_number_id,
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("WHATSAPP_PHONE_NUMBER_ID".into()));
            }
            _ => None,
        };

        let queue = QueueConfig {
            workers: parse_or(&get, "INTAKE_QUEUE_WORKERS", defaults.queue.workers)?,
            capacity: parse_or(&get, "INTAKE_QUEUE_CAPACITY", defaults.queue.capacity)?,
            initial_delay: Duration::from_millis(parse_or(
                &get,
                "INTAKE_RETRY_INITIAL_MS",
                defaults.queue.initial_delay.as_millis() as u64,
            )?),
            ..defaults.queue
        };
        if queue.workers == 0 || queue.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INTAKE_QUEUE_WORKERS".into(),
                message: "workers and capacity must be at least 1".into(),
            });
        }

        Ok(Self {
            port: parse_or(&get, "INTAKE_PORT", defaults.port)?,
            store: parse_or(&get, "INTAKE_STORE", defaults.store)?,
            db_path: get("INTAKE_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            session_ttl: Duration::from_secs(parse_or(
                &get,
                "INTAKE_SESSION_TTL_SECS",
                defaults.session_ttl.as_secs(),
            )?),
            cooldown_ttl: Duration::from_secs(parse_or(
                &get,
                "INTAKE_COOLDOWN_TTL_SECS",
                defaults.cooldown_ttl.as_secs(),
            )?),
            delivery: parse_or(&get, "INTAKE_DELIVERY", defaults.delivery)?,
            queue,
            reset_keyword: get("INTAKE_RESET_KEYWORD").unwrap_or(defaults.reset_keyword),
            admin_phone: get("INTAKE_ADMIN_PHONE"),
            fallback_log: get("INTAKE_FALLBACK_LOG").map_or(defaults.fallback_log, PathBuf::from),
            suppliers_file: get("INTAKE_SUPPLIERS_FILE").map(PathBuf::from),
            whatsapp,
            verify_token: get("WHATSAPP_VERIFY_TOKEN"),
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            session_ttl: self.session_ttl,
            cooldown_ttl: self.cooldown_ttl,
            reset_keyword: self.reset_keyword.clone(),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<IntakeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IntakeConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.store, StoreBackend::Memory);
        assert_eq!(c.session_ttl, Duration::from_secs(86_400));
        assert_eq!(c.cooldown_ttl, Duration::from_secs(600));
        assert_eq!(c.delivery, DeliveryMode::Direct);
        assert_eq!(c.queue.workers, 4);
        assert_eq!(c.queue.max_attempts, 3);
        assert_eq!(c.reset_keyword, "reiniciar");
        assert!(c.whatsapp.is_none());
        assert!(c.admin_phone.is_none());
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("INTAKE_PORT", "9000"),
            ("INTAKE_STORE", "libsql"),
            ("INTAKE_DELIVERY", "queued"),
            ("INTAKE_QUEUE_WORKERS", "8"),
            ("INTAKE_RETRY_INITIAL_MS", "50"),
            ("INTAKE_COOLDOWN_TTL_SECS", "5"),
            ("INTAKE_ADMIN_PHONE", "50211112222"),
            ("WHATSAPP_TOKEN", "tok"),
            ("WHATSAPP_PHONE_NUMBER_ID", "123"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.store, StoreBackend::LibSql);
        assert_eq!(c.delivery, DeliveryMode::Queued);
        assert_eq!(c.queue.workers, 8);
        assert_eq!(c.queue.initial_delay, Duration::from_millis(50));
        assert_eq!(c.engine_settings().cooldown_ttl, Duration::from_secs(5));
        assert_eq!(c.admin_phone.as_deref(), Some("50211112222"));
        let wa = c.whatsapp.unwrap();
        assert_eq!(wa.token.expose_secret(), "tok");
        assert_eq!(wa.phone_number_id, "123");
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = config(&[("INTAKE_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "INTAKE_PORT"));

        assert!(config(&[("INTAKE_STORE", "redis")]).is_err());
        assert!(config(&[("INTAKE_QUEUE_WORKERS", "0")]).is_err());
        assert!(matches!(
            config(&[("WHATSAPP_TOKEN", "tok")]),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn blank_values_use_defaults() {
        let c = config(&[("INTAKE_PORT", "  "), ("INTAKE_ADMIN_PHONE", "")]).unwrap();
        assert_eq!(c.port, 8080);
        assert!(c.admin_phone.is_none());
    }
}
