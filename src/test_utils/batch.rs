//! Builder for MessagePack batches in the host's event format.

use crate::record::RecordValue;

/// Accumulates `[timestamp, record]` events into one raw batch.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    bytes: Vec<u8>,
    next_time: i64,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next_time: 1_700_000_000,
        }
    }

    /// Append a record stamped one second after the previous one.
    pub fn record<K, V>(self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RecordValue>,
    {
        let time = self.next_time;
        self.record_at(time, fields)
    }

    /// Append a record with an explicit integer timestamp.
    pub fn record_at<K, V>(mut self, time: i64, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RecordValue>,
    {
        self.next_time = time + 1;
        self.event(RecordValue::Array(vec![
            RecordValue::Int(time),
            RecordValue::map(fields),
        ]))
    }

    /// Append an arbitrary value as one event.
    pub fn event(mut self, event: RecordValue) -> Self {
        let encoded = rmp_serde::to_vec(&event).expect("test event encodes as MessagePack");
        self.bytes.extend_from_slice(&encoded);
        self
    }

    /// Append raw bytes, e.g. to corrupt the batch.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
