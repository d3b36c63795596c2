//! Log-forwarding core of an InsightOps output plugin.
//!
//! A host pipeline hands over MessagePack batches tagged with their source.
//! Each batch is routed to a token by tag, every record is re-encoded as
//! compact JSON, framed as `<token> <json>\r\n`, and written to the regional
//! collector over TLS with bounded retries.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod context;
pub mod credentials;
pub mod pipeline;
pub mod rate_limited_warner;
pub mod record;
pub mod registry;
pub mod routing;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use adapter::{HostStatus, OutputPlugin};
pub use config::{ConfigError, ConfigResolver, ConfigSource, Settings};
pub use connection::{ConnectError, ConnectionManager, TcpDialer, WriteExhausted};
pub use context::{Context, InitError};
pub use credentials::{CredentialStore, Token};
pub use pipeline::{FlushOutcome, FlushReport};
pub use record::{DecodeError, EncodeError, Record, RecordValue};
pub use registry::{ContextHandle, ContextRegistry};
pub use routing::{TagRouter, TagRule};
