//! Lazy decoding of a raw host batch into [`Record`]s.

use std::io::Cursor;

use thiserror::Error;

use super::value::RecordValue;

/// Extension type the host uses for nanosecond timestamps.
const EVENT_TIME_EXT: i8 = 0;

/// Errors that abort decoding of the remaining batch.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes at `offset` are not valid MessagePack.
    #[error("invalid MessagePack at byte {offset}: {source}")]
    MessagePack {
        offset: u64,
        #[source]
        source: rmp_serde::decode::Error,
    },
    /// A well-formed value at `offset` is not a `[timestamp, map]` event.
    #[error("malformed event at byte {offset}: {reason}")]
    MalformedEvent { offset: u64, reason: &'static str },
}

/// Event timestamp with nanosecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventTime {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl EventTime {
    fn from_value(value: &RecordValue) -> Option<Self> {
        match value {
            RecordValue::Int(secs) => Some(Self {
                seconds: *secs,
                nanoseconds: 0,
            }),
            RecordValue::UInt(secs) => i64::try_from(*secs).ok().map(|seconds| Self {
                seconds,
                nanoseconds: 0,
            }),
            RecordValue::Float(secs) if secs.is_finite() => Some(Self {
                seconds: secs.trunc() as i64,
                nanoseconds: (secs.fract().abs() * 1e9) as u32,
            }),
            RecordValue::Ext(EVENT_TIME_EXT, data) => Self::from_ext(data),
            _ => None,
        }
    }

    /// Parse the 8-byte extension payload: big-endian seconds then nanoseconds.
    pub(crate) fn from_ext(data: &[u8]) -> Option<Self> {
        let bytes: &[u8; 8] = data.try_into().ok()?;
        let (secs, nanos) = bytes.split_at(4);
        Some(Self {
            seconds: i64::from(u32::from_be_bytes(secs.try_into().ok()?)),
            nanoseconds: u32::from_be_bytes(nanos.try_into().ok()?),
        })
    }

    /// Seconds since the epoch as a float.
    pub fn as_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.nanoseconds) / 1e9
    }
}

/// One decoded event.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// `None` when the timestamp is of an unrecognised shape.
    pub timestamp: Option<EventTime>,
    /// Event metadata (newer host event format only; empty otherwise).
    pub metadata: Vec<(RecordValue, RecordValue)>,
    /// Record body in wire order.
    pub body: Vec<(RecordValue, RecordValue)>,
}

impl Record {
    fn from_event(value: RecordValue, offset: u64) -> Result<Self, DecodeError> {
        let malformed = |reason| DecodeError::MalformedEvent { offset, reason };
        let RecordValue::Array(parts) = value else {
            return Err(malformed("event is not an array"));
        };
        let [header, body]: [RecordValue; 2] = parts
            .try_into()
            .map_err(|_| malformed("event does not have two elements"))?;
        let RecordValue::Map(body) = body else {
            return Err(malformed("record body is not a map"));
        };
        let (timestamp, metadata) = match header {
            RecordValue::Array(header) => {
                let [time, meta]: [RecordValue; 2] = header
                    .try_into()
                    .map_err(|_| malformed("event header does not have two elements"))?;
                let RecordValue::Map(meta) = meta else {
                    return Err(malformed("event metadata is not a map"));
                };
                (EventTime::from_value(&time), meta)
            }
            time => (EventTime::from_value(&time), Vec::new()),
        };
        Ok(Self {
            timestamp,
            metadata,
            body,
        })
    }

    /// Look up a body field by string key.
    pub fn field(&self, key: &str) -> Option<&RecordValue> {
        self.body.iter().find_map(|(k, v)| match k {
            RecordValue::Str(name) if name == key => Some(v),
            _ => None,
        })
    }
}

/// Single forward pass over a raw batch.
///
/// Yields each event as a fully materialised [`Record`]. The first error ends
/// the sequence: later bytes are never decoded, since the event boundary is
/// lost once the stream is corrupt.
pub struct RecordDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    failed: bool,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(batch: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(batch),
            failed: false,
        }
    }

    fn remaining(&self) -> bool {
        (self.cursor.position() as usize) < self.cursor.get_ref().len()
    }
}

impl Iterator for RecordDecoder<'_> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.remaining() {
            return None;
        }
        let offset = self.cursor.position();
        let result = rmp_serde::from_read::<_, RecordValue>(&mut self.cursor)
            .map_err(|source| DecodeError::MessagePack { offset, source })
            .and_then(|value| Record::from_event(value, offset));
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for RecordDecoder<'_> {}

/// Decode `batch` lazily.
pub fn decode(batch: &[u8]) -> RecordDecoder<'_> {
    RecordDecoder::new(batch)
}
