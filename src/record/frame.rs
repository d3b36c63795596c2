//! Wire framing: `<token> <json>\r\n`.

use crate::credentials::Token;

const SEPARATOR: u8 = b' ';
const TERMINATOR: &[u8] = b"\r\n";

/// Build the frame carrying `payload` for `token`.
///
/// Returns `None` if the frame length would overflow `usize`.
pub fn frame_payload(token: &Token, payload: &[u8]) -> Option<Vec<u8>> {
    let token = token.as_str().as_bytes();
    let capacity = token
        .len()
        .checked_add(payload.len())?
        .checked_add(1 + TERMINATOR.len())?;
    let mut framed = Vec::with_capacity(capacity);
    framed.extend_from_slice(token);
    framed.push(SEPARATOR);
    framed.extend_from_slice(payload);
    framed.extend_from_slice(TERMINATOR);
    Some(framed)
}
