//! Validation of raw configuration strings into [`Settings`].

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use log::{debug, warn};

use crate::{connection::TlsOptions, routing::TagRule};

use super::{
    ConfigError, ConfigSource, ProcessEnv, keys,
    settings::{
        CredentialSource, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_PORT,
        DEFAULT_WRITE_TIMEOUT, Endpoint, Settings, TOKENS_ENV_VAR, UnmatchedTagPolicy,
        WriteFailurePolicy,
    },
};

macro_rules! ensure_positive {
    ($value:expr, $key:expr, $raw:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidTimeout {
                key: $key,
                value: $raw,
            })
        } else {
            Ok($value)
        }
    }};
}

/// Turns host configuration strings into validated [`Settings`].
///
/// Environment lookups (the tokens blob) go through a separate
/// [`ConfigSource`] so callers can substitute the process environment.
pub struct ConfigResolver<'a> {
    env: &'a dyn ConfigSource,
}

impl Default for ConfigResolver<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver<'static> {
    /// Create a resolver that reads the process environment.
    pub fn new() -> Self {
        Self { env: &ProcessEnv }
    }
}

impl<'a> ConfigResolver<'a> {
    /// Create a resolver reading environment values from `env`.
    pub fn with_env(env: &'a dyn ConfigSource) -> Self {
        Self { env }
    }

    /// Validate `source` into [`Settings`].
    pub fn resolve(&self, source: &dyn ConfigSource) -> Result<Settings, ConfigError> {
        let region = source
            .value(keys::REGION)
            .ok_or(ConfigError::MissingRegion)?;
        let credentials = self.credential_source(source)?;
        let protocol = parse_enum(source, keys::PROTOCOL, ConfigError::InvalidProtocol)?;
        let port = parse_port(source.value(keys::PORT))?;
        let max_retries = parse_retry_count(source.value(keys::MAX_RETRIES))?;
        let tag_rule =
            resolve_tag_rule(source.value(keys::TAG_REGEX), source.value(keys::TAG_KEY))?;
        let connection_mode =
            parse_enum(source, keys::CONNECTION_MODE, ConfigError::InvalidConnectionMode)?;
        let unmatched_tag = parse_policy::<UnmatchedTagPolicy>(source, keys::UNMATCHED_TAG)?;
        let write_failure = parse_policy::<WriteFailurePolicy>(source, keys::ON_WRITE_FAILURE)?;
        let connect_timeout =
            parse_timeout(source, keys::CONNECT_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT)?;
        let write_timeout = parse_timeout(source, keys::WRITE_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT)?;

        let endpoint = Endpoint::for_region(&region, port);
        let tls = if parse_flag(source, keys::TLS, true)? {
            Some(TlsOptions {
                domain: endpoint.host.clone(),
                insecure_skip_verify: !parse_flag(source, keys::TLS_VERIFY, true)?,
            })
        } else {
            warn!("insightops: tls is disabled; logs to {endpoint} are sent in plaintext");
            None
        };

        Ok(Settings {
            region,
            protocol,
            endpoint,
            max_retries,
            tag_rule,
            credentials,
            connection_mode,
            tls,
            connect_timeout,
            write_timeout,
            unmatched_tag,
            write_failure,
        })
    }

    fn credential_source(
        &self,
        source: &dyn ConfigSource,
    ) -> Result<CredentialSource, ConfigError> {
        let token = source.value(keys::TOKEN);
        let path = source.value(keys::PATH);
        let blob = self.env.value(TOKENS_ENV_VAR);
        let chosen = match (token, path, blob) {
            (Some(token), path, blob) => {
                if path.is_some() || blob.is_some() {
                    debug!(
                        "insightops: static token configured; ignoring tokens file and {TOKENS_ENV_VAR}"
                    );
                }
                CredentialSource::Token(token)
            }
            (None, Some(path), blob) => {
                if blob.is_some() {
                    debug!("insightops: tokens file configured; ignoring {TOKENS_ENV_VAR}");
                }
                CredentialSource::File(PathBuf::from(path))
            }
            (None, None, Some(blob)) => CredentialSource::Environment(blob),
            (None, None, None) => return Err(ConfigError::MissingCredentialSource),
        };
        Ok(chosen)
    }
}

/// Parse `max_retries`, defaulting to three attempts.
pub(crate) fn parse_retry_count(raw: Option<String>) -> Result<NonZeroU32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_MAX_RETRIES);
    };
    raw.parse::<NonZeroU32>()
        .map_err(|_| ConfigError::InvalidRetryCount(raw))
}

fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PORT);
    };
    match raw.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw)),
    }
}

/// Compile the routing rule when both halves are configured.
///
/// Only one of `tag_regex`/`tag_key` disables routing rather than failing,
/// so older configurations that set just one keep working.
pub(crate) fn resolve_tag_rule(
    pattern: Option<String>,
    key: Option<String>,
) -> Result<Option<TagRule>, ConfigError> {
    match (pattern, key) {
        (Some(pattern), Some(key)) => TagRule::new(&pattern, &key).map(Some),
        (Some(_), None) => {
            warn!("insightops: tag_regex set without tag_key; tags are routed unchanged");
            Ok(None)
        }
        (None, Some(_)) => {
            warn!("insightops: tag_key set without tag_regex; tags are routed unchanged");
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn parse_enum<T: FromStr + Default>(
    source: &dyn ConfigSource,
    key: &'static str,
    err: impl FnOnce(String) -> ConfigError,
) -> Result<T, ConfigError> {
    match source.value(key) {
        None => Ok(T::default()),
        Some(raw) => raw.parse().map_err(|_| err(raw)),
    }
}

fn parse_policy<T: FromStr + Default>(
    source: &dyn ConfigSource,
    key: &'static str,
) -> Result<T, ConfigError> {
    parse_enum(source, key, |value| ConfigError::InvalidPolicy { key, value })
}

fn parse_flag(
    source: &dyn ConfigSource,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = source.value(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value: raw }),
    }
}

fn parse_timeout(
    source: &dyn ConfigSource,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = source.value(key) else {
        return Ok(default);
    };
    let millis = raw.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
        key,
        value: raw.clone(),
    })?;
    ensure_positive!(millis, key, raw).map(Duration::from_millis)
}
