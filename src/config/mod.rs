//! Plugin configuration.
//!
//! The host hands the plugin a flat set of named strings. [`ConfigResolver`]
//! validates them into an immutable [`Settings`] value, resolving defaults,
//! the collector address, the credential source, and the optional
//! tag-routing rule. Every validation failure is a [`ConfigError`] and stops
//! the plugin instance from starting.

use std::{io, path::PathBuf};

use thiserror::Error;

pub mod keys;
mod resolve;
mod settings;
mod source;


pub use resolve::ConfigResolver;
pub use settings::{
    COLLECTOR_DOMAIN, ConnectionMode, CredentialSource, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, Endpoint, Protocol, Settings,
    TOKENS_ENV_VAR, UnmatchedTagPolicy, WriteFailurePolicy,
};
pub use source::{ConfigSource, ProcessEnv};

/// Errors raised while validating plugin configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The mandatory `region` key was absent or empty.
    #[error("region is required")]
    MissingRegion,
    /// Neither a token, a tokens file, nor the tokens environment blob was set.
    #[error("a credential source is required: set token, path, or INSIGHTOPS_TOKENS_JSON")]
    MissingCredentialSource,
    /// `max_retries` was not a positive integer.
    #[error("max_retries must be a positive integer, got {0:?}")]
    InvalidRetryCount(String),
    /// `port` was not a valid TCP port.
    #[error("port must be an integer between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    /// `protocol` named an unsupported network.
    #[error("unsupported protocol {0:?}; expected tcp, tcp4, or tcp6")]
    InvalidProtocol(String),
    /// `connection_mode` named an unknown policy.
    #[error("unsupported connection_mode {0:?}; expected persistent or ephemeral")]
    InvalidConnectionMode(String),
    /// A policy key held an unknown value.
    #[error("unsupported value {value:?} for {key}")]
    InvalidPolicy {
        /// Configuration key being parsed.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
    /// A boolean key could not be parsed.
    #[error("{key} must be on/off, got {value:?}")]
    InvalidBool {
        /// Configuration key being parsed.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
    /// A timeout key was not a positive number of milliseconds.
    #[error("{key} must be a positive number of milliseconds, got {value:?}")]
    InvalidTimeout {
        /// Configuration key being parsed.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
    /// `tag_regex` failed to compile.
    #[error("tag_regex {pattern:?} is invalid: {source}")]
    InvalidTagRegex {
        /// Pattern as configured.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
    /// `tag_regex` has no named capture group called `tag_key`.
    #[error("tag_regex {pattern:?} has no named group {key:?}; tag_regex must contain tag_key")]
    TagKeyNotInRegex {
        /// Capture group name that was requested.
        key: String,
        /// Pattern that lacks the group.
        pattern: String,
    },
    /// The tokens file could not be read.
    #[error("cannot read tokens file {}: {source}", path.display())]
    CredentialRead {
        /// Path as configured.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The tokens JSON was not an object of string values.
    #[error("cannot parse tokens from {origin}: {source}")]
    InvalidCredentials {
        /// Where the JSON came from (file path or environment variable).
        origin: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// A token contained whitespace and would corrupt the wire frame.
    #[error("token for {key:?} must not contain whitespace")]
    InvalidToken {
        /// Routing key of the offending entry (`*` for the single token).
        key: String,
    },
}
