//! Helpers shared by unit and integration tests.
//!
//! Compiled for crate unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

mod batch;
mod stub;

pub use batch::BatchBuilder;
pub use stub::{StubConnection, StubDialer};
