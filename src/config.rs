//! Configuration types.
//!
//! Everything here is plain data handed to constructors. Only
//! [`BridgeConfig::from_env`] touches the process environment, and only the
//! binary calls it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default API endpoint for the assistant service.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Bucket that inbound mail lands in when nothing else is configured.
pub const DEFAULT_BUCKET: &str = "databater-emails-recieved";

/// Region used for S3 when `AWS_REGION` is unset.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Fixed-interval polling policy for assistant runs.
///
/// There is no back-off: every non-terminal poll is followed by one wait of
/// `interval`. A zero interval retries immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between poll attempts.
    pub interval: Duration,
    /// Maximum number of status requests before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(4),
            max_attempts: 4,
        }
    }
}

/// Credentials and identity for one conversation client.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub assistant_id: String,
    /// Suppress the diagnostic log line on failures. Errors are still returned.
    pub suppress_logging: bool,
}

impl AssistantConfig {
    pub fn new(api_key: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            assistant_id: assistant_id.into(),
            suppress_logging: false,
        }
    }

    pub fn with_suppressed_logging(mut self, suppress: bool) -> Self {
        self.suppress_logging = suppress;
        self
    }
}

/// Where raw messages are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStoreConfig {
    /// AWS S3 in the given region.
    S3 { region: String },
    /// A local directory laid out as `<root>/<bucket>/<key>`.
    Spool { root: PathBuf },
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub assistant: AssistantConfig,
    pub base_url: String,
    pub bucket: String,
    pub blob_store: BlobStoreConfig,
    pub poll: PollPolicy,
    pub http_timeout: Duration,
    /// Caller-level deadline around a whole conversation, if any.
    pub conversation_timeout: Option<Duration>,
}

impl BridgeConfig {
    /// Build config from environment variables.
    ///
    /// `OPEN_AI_CREDENTIAL` and `OPENAI_ASSISTANT_ID` are required; everything
    /// else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPEN_AI_CREDENTIAL")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPEN_AI_CREDENTIAL".into()))?;
        let assistant_id = get("OPENAI_ASSISTANT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_ASSISTANT_ID".into()))?;

        let suppress_logging = get("MAILBRIDGE_SUPPRESS_ASSISTANT_LOGS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let blob_store = match get("MAILBRIDGE_SPOOL_DIR") {
            Some(dir) => BlobStoreConfig::Spool {
                root: PathBuf::from(dir),
            },
            None => BlobStoreConfig::S3 {
                region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            },
        };

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: Duration::from_secs(parse_or(
                &get,
                "MAILBRIDGE_POLL_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            max_attempts: parse_or(&get, "MAILBRIDGE_POLL_MAX_ATTEMPTS", defaults.max_attempts)?,
        };

        let http_timeout = Duration::from_secs(parse_or(&get, "MAILBRIDGE_HTTP_TIMEOUT_SECS", 30)?);

        let conversation_timeout = match get("MAILBRIDGE_CONVERSATION_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value(
                "MAILBRIDGE_CONVERSATION_TIMEOUT_SECS",
                &raw,
            )?)),
            None => None,
        };

        Ok(Self {
            assistant: AssistantConfig {
                api_key: SecretString::from(api_key),
                assistant_id,
                suppress_logging,
            },
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            bucket: get("MAILBRIDGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            blob_store,
            poll,
            http_timeout,
            conversation_timeout,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("OPEN_AI_CREDENTIAL", "sk-test"),
        ("OPENAI_ASSISTANT_ID", "asst_1"),
    ];

    #[test]
    fn defaults_applied_when_only_required_vars_set() {
        let config = BridgeConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.assistant.api_key.expose_secret(), "sk-test");
        assert_eq!(config.assistant.assistant_id, "asst_1");
        assert!(!config.assistant.suppress_logging);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(
            config.blob_store,
            BlobStoreConfig::S3 {
                region: DEFAULT_REGION.to_string()
            }
        );
        assert_eq!(config.poll, PollPolicy::default());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.conversation_timeout.is_none());
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err = BridgeConfig::from_lookup(lookup(&[("OPENAI_ASSISTANT_ID", "asst_1")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPEN_AI_CREDENTIAL"));
    }

    #[test]
    fn missing_assistant_id_is_fatal() {
        let err =
            BridgeConfig::from_lookup(lookup(&[("OPEN_AI_CREDENTIAL", "sk-test")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_ASSISTANT_ID"));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let err = BridgeConfig::from_lookup(lookup(&[
            ("OPEN_AI_CREDENTIAL", "  "),
            ("OPENAI_ASSISTANT_ID", "asst_1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn spool_dir_selects_filesystem_store() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAILBRIDGE_SPOOL_DIR", "/var/spool/mail"));
        let config = BridgeConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.blob_store,
            BlobStoreConfig::Spool {
                root: PathBuf::from("/var/spool/mail")
            }
        );
    }

    #[test]
    fn poll_overrides_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAILBRIDGE_POLL_INTERVAL_SECS", "0"));
        pairs.push(("MAILBRIDGE_POLL_MAX_ATTEMPTS", "10"));
        pairs.push(("MAILBRIDGE_CONVERSATION_TIMEOUT_SECS", "90"));
        pairs.push(("MAILBRIDGE_SUPPRESS_ASSISTANT_LOGS", "true"));
        let config = BridgeConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.poll, PollPolicy::new(Duration::ZERO, 10));
        assert_eq!(config.conversation_timeout, Some(Duration::from_secs(90)));
        assert!(config.assistant.suppress_logging);
    }

    #[test]
    fn invalid_number_reports_key() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAILBRIDGE_POLL_MAX_ATTEMPTS", "lots"));
        let err = BridgeConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAILBRIDGE_POLL_MAX_ATTEMPTS")
        );
    }
}
