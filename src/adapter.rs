//! In-process Init/Flush/Exit surface of the output plugin.
//!
//! [`OutputPlugin`] is what a host shim calls into: it owns the context
//! registry and translates flush outcomes into the host's status codes.

use std::sync::Arc;

use log::{error, info, warn};
use once_cell::sync::Lazy;

use crate::{
    config::{ConfigResolver, ConfigSource, ProcessEnv, Settings},
    connection::{Dialer, TcpDialer},
    context::{Context, InitError},
    pipeline::{self, FlushOutcome, FlushReport},
    registry::{ContextHandle, ContextRegistry},
};

/// Status codes understood by the host pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum HostStatus {
    Error = 0,
    Ok = 1,
    Retry = 2,
}

impl HostStatus {
    pub fn as_code(self) -> i32 {
        self as i32
    }
}

impl From<FlushOutcome> for HostStatus {
    fn from(outcome: FlushOutcome) -> Self {
        match outcome {
            FlushOutcome::Ok | FlushOutcome::PartialOk => HostStatus::Ok,
            FlushOutcome::Retryable => HostStatus::Retry,
            FlushOutcome::Fatal => HostStatus::Error,
        }
    }
}

type DialerFactory = Box<dyn Fn(&Settings) -> Arc<dyn Dialer> + Send + Sync>;

pub struct OutputPlugin {
    registry: ContextRegistry,
    dialers: DialerFactory,
    env: Box<dyn ConfigSource + Send + Sync>,
}

impl Default for OutputPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPlugin {
    /// Plugin that dials the collector over TCP/TLS and reads the process
    /// environment.
    pub fn new() -> Self {
        Self {
            registry: ContextRegistry::new(),
            dialers: Box::new(|settings| Arc::new(TcpDialer::from_settings(settings))),
            env: Box::new(ProcessEnv),
        }
    }

    /// Replace how each context's dialer is built.
    pub fn with_dialer_factory(
        mut self,
        factory: impl Fn(&Settings) -> Arc<dyn Dialer> + Send + Sync + 'static,
    ) -> Self {
        self.dialers = Box::new(factory);
        self
    }

    /// Replace the environment consulted for the tokens blob.
    pub fn with_environment(mut self, env: impl ConfigSource + Send + Sync + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Validate `config`, start a context and register it.
    pub fn init(&self, config: &dyn ConfigSource) -> Result<ContextHandle, InitError> {
        let result = ConfigResolver::with_env(self.env.as_ref())
            .resolve(config)
            .map_err(InitError::from)
            .and_then(|settings| {
                let dialer = (self.dialers)(&settings);
                Context::new(settings, dialer)
            });
        match result {
            Ok(context) => {
                let handle = self.registry.insert(context);
                info!("insightops: registered context {}", handle.as_u64());
                Ok(handle)
            }
            Err(err) => {
                error!("insightops: init failed: {err}");
                Err(err)
            }
        }
    }

    /// Run one flush and return its full report.
    ///
    /// An unknown handle yields a [`FlushOutcome::Fatal`] report.
    pub fn flush_report(&self, handle: ContextHandle, batch: &[u8], tag: &str) -> FlushReport {
        match self.registry.get(handle) {
            Some(context) => pipeline::run(&context, batch, tag),
            None => {
                error!(
                    "insightops: flush for tag {tag:?} on unknown context {}",
                    handle.as_u64()
                );
                FlushReport {
                    outcome: FlushOutcome::Fatal,
                    routing_key: None,
                    sent: 0,
                    dropped: 0,
                    skipped: false,
                }
            }
        }
    }

    pub fn flush(&self, handle: ContextHandle, batch: &[u8], tag: &str) -> HostStatus {
        self.flush_report(handle, batch, tag).outcome.into()
    }

    /// Close and unregister one context.
    pub fn exit_context(&self, handle: ContextHandle) -> HostStatus {
        match self.registry.remove(handle) {
            Some(context) => {
                context.shutdown();
                HostStatus::Ok
            }
            None => {
                warn!("insightops: exit for unknown context {}", handle.as_u64());
                HostStatus::Error
            }
        }
    }

    /// Close every registered context exactly once.
    pub fn exit(&self) -> HostStatus {
        let contexts = self.registry.drain();
        let count = contexts.len();
        for (_, context) in contexts {
            context.shutdown();
        }
        info!("insightops: exit closed {count} context(s)");
        HostStatus::Ok
    }
}

static GLOBAL: Lazy<OutputPlugin> = Lazy::new(OutputPlugin::new);

/// Process-wide plugin instance for host bindings.
pub fn global() -> &'static OutputPlugin {
    &GLOBAL
}
