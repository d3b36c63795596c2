//! Record decoding, JSON encoding, and wire framing.
//!
//! A host batch is a concatenation of MessagePack events. [`decode`] walks it
//! once, yielding [`Record`]s; [`encode`] turns each record body into compact
//! JSON; [`frame_payload`] prefixes the token and terminates the line.

mod decode;
mod encode;
mod frame;
mod value;


pub use decode::{DecodeError, EventTime, Record, RecordDecoder, decode};
pub use encode::{EncodeError, encode};
pub use frame::frame_payload;
pub use value::RecordValue;
