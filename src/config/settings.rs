//! Validated plugin settings and the policy enums they carry.

use std::{fmt, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use crate::{connection::TlsOptions, routing::TagRule};

/// Domain appended to the region to form the collector host name.
pub const COLLECTOR_DOMAIN: &str = "data.logs.insight.rapid7.com";
/// Collector port used when none is configured.
pub const DEFAULT_PORT: u16 = 443;
/// Total write attempts per frame when `max_retries` is unset.
pub const DEFAULT_MAX_RETRIES: NonZeroU32 = NonZeroU32::MIN.saturating_add(2);
/// Default bound on dialling plus the TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to the collector socket.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Environment variable carrying a JSON tag→token table.
pub const TOKENS_ENV_VAR: &str = "INSIGHTOPS_TOKENS_JSON";

/// Network family used when dialling the collector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Any address family.
    #[default]
    Tcp,
    /// IPv4 only.
    Tcp4,
    /// IPv6 only.
    Tcp6,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp4 => "tcp4",
            Protocol::Tcp6 => "tcp6",
        })
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "tls" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            _ => Err(()),
        }
    }
}

/// Connection lifecycle policy for a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Dial once at init and reuse the stream for every flush.
    #[default]
    Persistent,
    /// Dial at the start of each flush and close at its end.
    Ephemeral,
}

impl FromStr for ConnectionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "ephemeral" | "per_flush" => Ok(Self::Ephemeral),
            _ => Err(()),
        }
    }
}

/// What to do with a tag the routing regex does not match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedTagPolicy {
    /// Use the raw tag as the routing key.
    #[default]
    Passthrough,
    /// Treat the batch as unrouted and skip it.
    Drop,
}

impl FromStr for UnmatchedTagPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "drop" => Ok(Self::Drop),
            _ => Err(()),
        }
    }
}

/// What to do once a frame has exhausted its write attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteFailurePolicy {
    /// Abort the batch and ask the host to redeliver it.
    #[default]
    Retry,
    /// Drop the frame and carry on with the rest of the batch.
    Drop,
}

impl FromStr for WriteFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "drop" => Ok(Self::Drop),
            _ => Err(()),
        }
    }
}

/// Collector host and port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// DNS name of the regional collector.
    pub host: String,
    /// TCP port, 443 unless overridden.
    pub port: u16,
}

impl Endpoint {
    /// Build the collector endpoint for `region`.
    pub fn for_region(region: &str, port: u16) -> Self {
        Self {
            host: format!("{region}.{COLLECTOR_DOMAIN}"),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where the context's tokens come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// One token for every tag.
    Token(String),
    /// JSON tag→token table on disk.
    File(PathBuf),
    /// JSON tag→token table delivered through [`TOKENS_ENV_VAR`].
    Environment(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Environment(_) => write!(f, "Environment({TOKENS_ENV_VAR})"),
        }
    }
}

/// Immutable settings for one plugin instance.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Collector region, as written in the host configuration.
    pub region: String,
    /// Address family used when dialing.
    pub protocol: Protocol,
    /// Collector derived from `region`.
    pub endpoint: Endpoint,
    /// Total write attempts per frame, including the first.
    pub max_retries: NonZeroU32,
    /// Optional regex extracting the routing key from a tag.
    pub tag_rule: Option<TagRule>,
    /// Where tokens are loaded from.
    pub credentials: CredentialSource,
    /// Whether one connection is reused across flushes.
    pub connection_mode: ConnectionMode,
    /// `None` sends plaintext; only meant for local collectors.
    pub tls: Option<TlsOptions>,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on a single frame write.
    pub write_timeout: Duration,
    /// What to do with tags the rule does not match.
    pub unmatched_tag: UnmatchedTagPolicy,
    /// What to do when a frame exhausts its write attempts.
    pub write_failure: WriteFailurePolicy,
}

impl Settings {
    /// `<host>:<port>` of the collector.
    pub fn address(&self) -> String {
        self.endpoint.to_string()
    }
}
