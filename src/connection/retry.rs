//! Bounded, immediate retry of a single frame write.

use std::num::NonZeroU32;

use log::warn;

use super::{Connection, WriteExhausted};

/// Write `frame` to `conn`, retrying immediately on failure.
///
/// At most `max_attempts` writes are made. Returns the number of attempts the
/// successful write took.
pub fn send_with_retry(
    conn: &mut dyn Connection,
    frame: &[u8],
    max_attempts: NonZeroU32,
    tag: &str,
) -> Result<u32, WriteExhausted> {
    let max = max_attempts.get();
    let mut attempt = 1;
    loop {
        match conn.write_frame(frame) {
            Ok(()) => return Ok(attempt),
            Err(source) => {
                warn!(
                    "insightops: write for tag {tag:?} failed \
                     (attempt {attempt}/{max}): {source}"
                );
                if attempt >= max {
                    return Err(WriteExhausted {
                        attempts: attempt,
                        source,
                    });
                }
                attempt += 1;
            }
        }
    }
}
