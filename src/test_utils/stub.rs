//! In-memory dialer and connection that record frames.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;

use crate::connection::{ConnectError, Connection, Dialer};

#[derive(Debug, Default)]
struct StubState {
    frames: Vec<Vec<u8>>,
    write_attempts: usize,
    failing_writes: usize,
    refuse: bool,
}

/// Dialer handing out [`StubConnection`]s that share one frame log.
#[derive(Clone, Debug, Default)]
pub struct StubDialer {
    state: Arc<Mutex<StubState>>,
    dials: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl StubDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` write attempts fail with `BrokenPipe`.
    pub fn fail_next_writes(&self, n: usize) {
        self.state.lock().failing_writes = n;
    }

    /// Make every write attempt fail until reset with `fail_next_writes(0)`.
    pub fn fail_all_writes(&self) {
        self.fail_next_writes(usize::MAX);
    }

    /// Refuse (or accept again) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Forget recorded frames and attempts.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.frames.clear();
        state.write_attempts = 0;
    }

    /// Frames successfully written, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    /// Written frames decoded as UTF-8.
    pub fn frame_strings(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .map(|f| String::from_utf8(f).expect("frame is UTF-8"))
            .collect()
    }

    /// Total write attempts, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Boxed handle suitable for the connection manager.
    pub fn shared(&self) -> Arc<dyn Dialer> {
        Arc::new(self.clone())
    }
}

impl Dialer for StubDialer {
    fn dial(&self) -> Result<Box<dyn Connection>, ConnectError> {
        if self.state.lock().refuse {
            return Err(ConnectError::Io {
                endpoint: "stub:0".into(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection {
            state: Arc::clone(&self.state),
            closes: Arc::clone(&self.closes),
            closed: false,
        }))
    }
}

/// Connection produced by [`StubDialer`].
#[derive(Debug)]
pub struct StubConnection {
    state: Arc<Mutex<StubState>>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

impl Connection for StubConnection {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        assert!(!self.closed, "write on a closed stub connection");
        let mut state = self.state.lock();
        state.write_attempts += 1;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.frames.push(frame.to_vec());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        assert!(!self.closed, "stub connection closed twice");
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
