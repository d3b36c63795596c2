//! Per-instance state shared by every flush of one plugin instance.

use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::{
    config::{ConfigError, Settings},
    connection::{ConnectError, ConnectionManager, Dialer},
    credentials::CredentialStore,
    rate_limited_warner::RateLimitedWarner,
    routing::TagRouter,
};

/// Failure to bring up a plugin instance.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot reach collector: {0}")]
    Connect(#[from] ConnectError),
}

/// Everything one plugin instance needs to flush: settings, tokens, the
/// routing rule, and its connection.
pub struct Context {
    settings: Settings,
    credentials: CredentialStore,
    router: TagRouter,
    connections: ConnectionManager,
    pub(crate) dropped_records: RateLimitedWarner,
    pub(crate) unrouted_batches: RateLimitedWarner,
}

impl Context {
    /// Load credentials and, in persistent mode, dial the collector.
    pub fn new(settings: Settings, dialer: Arc<dyn Dialer>) -> Result<Self, InitError> {
        let credentials = CredentialStore::load(&settings.credentials)?;
        match credentials.len() {
            Some(0) => warn!("insightops: token table is empty; every batch will be skipped"),
            Some(n) => info!("insightops: loaded {n} routing key token(s)"),
            None => info!("insightops: using a single token for every tag"),
        }
        let router = TagRouter::new(settings.tag_rule.clone(), settings.unmatched_tag);
        let connections = ConnectionManager::open(settings.connection_mode, dialer)?;
        info!(
            "insightops: context ready for {} ({:?} connection)",
            settings.address(),
            settings.connection_mode
        );
        Ok(Self {
            settings,
            credentials,
            router,
            connections,
            dropped_records: RateLimitedWarner::default(),
            unrouted_batches: RateLimitedWarner::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn router(&self) -> &TagRouter {
        &self.router
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Emit any pending rate-limited warnings.
    pub(crate) fn flush_warnings(&self) {
        self.dropped_records.flush(|count| {
            warn!("insightops: dropped {count} record(s) that could not be delivered");
        });
        self.unrouted_batches.flush(|count| {
            warn!("insightops: skipped {count} batch(es) with no routing key or token");
        });
    }

    /// Close the connection. Later flushes report [`ConnectError::Closed`].
    pub fn shutdown(&self) {
        self.flush_warnings();
        self.connections.close();
        info!("insightops: context for {} closed", self.settings.address());
    }
}
