//! Configuration key names understood by [`ConfigResolver`](super::ConfigResolver).

pub const REGION: &str = "region";
pub const PROTOCOL: &str = "protocol";
pub const PORT: &str = "port";
pub const TOKEN: &str = "token";
pub const PATH: &str = "path";
pub const TAG_REGEX: &str = "tag_regex";
pub const TAG_KEY: &str = "tag_key";
pub const MAX_RETRIES: &str = "max_retries";
pub const CONNECTION_MODE: &str = "connection_mode";
pub const TLS: &str = "tls";
pub const TLS_VERIFY: &str = "tls_verify";
pub const CONNECT_TIMEOUT_MS: &str = "connect_timeout_ms";
pub const WRITE_TIMEOUT_MS: &str = "write_timeout_ms";
pub const UNMATCHED_TAG: &str = "unmatched_tag";
pub const ON_WRITE_FAILURE: &str = "on_write_failure";
