//! Connection lifetime for one context.
//!
//! In persistent mode a single connection is opened at init, shared by every
//! flush and reopened lazily after a failure. In ephemeral mode each flush
//! dials its own connection and closes it when the [`Session`] drops.

use std::{
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use crate::config::ConnectionMode;

use super::{ConnectError, Connection, Dialer, WriteExhausted, send_with_retry};

type Slot = Option<Box<dyn Connection>>;

/// Failure to deliver one frame.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Exhausted(#[from] WriteExhausted),
}

pub struct ConnectionManager {
    mode: ConnectionMode,
    dialer: Arc<dyn Dialer>,
    persistent: Mutex<Slot>,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Create a manager without dialing.
    pub fn new(mode: ConnectionMode, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            mode,
            dialer,
            persistent: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a manager, dialing immediately in persistent mode.
    pub fn open(mode: ConnectionMode, dialer: Arc<dyn Dialer>) -> Result<Self, ConnectError> {
        let manager = Self::new(mode, dialer);
        if mode == ConnectionMode::Persistent {
            let conn = manager.dial()?;
            *manager.persistent.lock() = Some(conn);
        }
        Ok(manager)
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a persistent connection is currently held open.
    pub fn is_connected(&self) -> bool {
        self.persistent.lock().is_some()
    }

    fn dial(&self) -> Result<Box<dyn Connection>, ConnectError> {
        if self.is_closed() {
            return Err(ConnectError::Closed);
        }
        debug!("insightops: dialing collector ({:?} mode)", self.mode);
        self.dialer.dial()
    }

    /// Acquire the connection to use for one flush.
    ///
    /// In persistent mode the returned session holds the shared connection
    /// lock, so concurrent flushes of one context write one at a time.
    pub fn session(&self) -> Result<Session<'_>, ConnectError> {
        if self.is_closed() {
            return Err(ConnectError::Closed);
        }
        let slot = match self.mode {
            ConnectionMode::Persistent => {
                let mut guard = self.persistent.lock();
                if guard.is_none() {
                    *guard = Some(self.dial()?);
                }
                SessionSlot::Shared(guard)
            }
            ConnectionMode::Ephemeral => SessionSlot::Owned(Some(self.dial()?)),
        };
        Ok(Session {
            manager: self,
            slot,
        })
    }

    /// Close the persistent connection and refuse further sessions.
    ///
    /// Only the first call has any effect. Waits for an in-flight persistent
    /// session to finish before closing its connection.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut conn) = self.persistent.lock().take() {
            close_quietly(conn.as_mut());
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

enum SessionSlot<'a> {
    Shared(MutexGuard<'a, Slot>),
    Owned(Slot),
}

impl SessionSlot<'_> {
    fn get(&mut self) -> &mut Slot {
        match self {
            SessionSlot::Shared(guard) => &mut **guard,
            SessionSlot::Owned(slot) => slot,
        }
    }
}

/// Connection access for the duration of one flush.
pub struct Session<'a> {
    manager: &'a ConnectionManager,
    slot: SessionSlot<'a>,
}

impl Session<'_> {
    /// Send one frame with bounded retries.
    ///
    /// When every attempt fails the connection is discarded; the next send
    /// dials a fresh one.
    pub fn send(
        &mut self,
        frame: &[u8],
        max_attempts: NonZeroU32,
        tag: &str,
    ) -> Result<u32, SendError> {
        let manager = self.manager;
        let slot = self.slot.get();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => manager.dial()?,
        };
        let conn = slot.insert(conn);
        match send_with_retry(conn.as_mut(), frame, max_attempts, tag) {
            Ok(attempts) => Ok(attempts),
            Err(err) => {
                warn!("insightops: discarding connection after {err}");
                if let Some(mut conn) = slot.take() {
                    close_quietly(conn.as_mut());
                }
                Err(err.into())
            }
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let SessionSlot::Owned(slot) = &mut self.slot {
            if let Some(mut conn) = slot.take() {
                close_quietly(conn.as_mut());
            }
        }
    }
}

fn close_quietly(conn: &mut dyn Connection) {
    if let Err(err) = conn.close() {
        debug!("insightops: error while closing connection: {err}");
    }
}
