//! One flush: route the tag, look up the token, then decode, encode, frame and
//! send each record in order.

#[cfg(test)]
mod tests;

use log::{debug, error, info, warn};

use crate::{
    config::WriteFailurePolicy,
    connection::{ConnectError, SendError, Session},
    context::Context,
    record::{self, frame_payload},
};

/// Result of one flush, mapped onto the host's status codes by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Every record was delivered, or the batch was deliberately skipped.
    Ok,
    /// The batch was consumed but some records were dropped.
    PartialOk,
    /// The host should redeliver the batch later.
    Retryable,
    /// The batch cannot be delivered.
    Fatal,
}

/// Per-flush accounting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushReport {
    pub outcome: FlushOutcome,
    /// Routing key derived from the tag, if any.
    pub routing_key: Option<String>,
    /// Frames written to the collector.
    pub sent: usize,
    /// Records that could not be encoded or delivered.
    pub dropped: usize,
    /// Whether the whole batch was skipped (no routing key or no token).
    pub skipped: bool,
}

impl FlushReport {
    fn new(routing_key: Option<String>) -> Self {
        Self {
            outcome: FlushOutcome::Ok,
            routing_key,
            sent: 0,
            dropped: 0,
            skipped: false,
        }
    }

    fn skip(mut self) -> Self {
        self.skipped = true;
        self
    }

    fn finish(mut self, outcome: FlushOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Deliver `batch`, tagged `tag`, through `ctx`.
///
/// Frames go out in batch order. Nothing is dialed for a batch that is
/// skipped or holds no records.
pub fn run(ctx: &Context, batch: &[u8], tag: &str) -> FlushReport {
    let Some(routing_key) = ctx.router().route(tag) else {
        debug!("insightops: tag {tag:?} has no routing key; skipping batch");
        ctx.unrouted_batches.record_drop();
        ctx.unrouted_batches.warn_if_due(|count| {
            warn!("insightops: skipped {count} batch(es) whose tag did not match tag_regex");
        });
        return FlushReport::new(None).skip();
    };
    let mut report = FlushReport::new(Some(routing_key.to_owned()));
    let Some(token) = ctx.credentials().resolve(routing_key) else {
        info!(
            "insightops: no token configured for routing key {routing_key:?} (tag {tag:?}); \
             skipping batch"
        );
        return report.skip();
    };

    let settings = ctx.settings();
    let mut session: Option<Session<'_>> = None;
    for item in record::decode(batch) {
        let record = match item {
            Ok(record) => record,
            Err(err) => {
                error!("insightops: cannot decode batch for tag {tag:?}: {err}");
                return report.finish(FlushOutcome::Fatal);
            }
        };
        let payload = match record::encode(&record) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("insightops: dropping unencodable record for tag {tag:?}: {err}");
                drop_record(ctx, &mut report);
                continue;
            }
        };
        let Some(frame) = frame_payload(token, &payload) else {
            warn!(
                "insightops: dropping oversized record for tag {tag:?} ({} bytes)",
                payload.len()
            );
            drop_record(ctx, &mut report);
            continue;
        };

        let active = match session {
            Some(ref mut active) => active,
            None => match ctx.connections().session() {
                Ok(opened) => session.insert(opened),
                Err(err) => return connect_failure(report, tag, &err),
            },
        };
        match active.send(&frame, settings.max_retries, tag) {
            Ok(_) => report.sent += 1,
            Err(SendError::Exhausted(err)) => match settings.write_failure {
                WriteFailurePolicy::Retry => {
                    warn!("insightops: batch for tag {tag:?} will be retried: {err}");
                    return report.finish(FlushOutcome::Retryable);
                }
                WriteFailurePolicy::Drop => {
                    warn!("insightops: dropping record for tag {tag:?}: {err}");
                    drop_record(ctx, &mut report);
                }
            },
            Err(SendError::Connect(err)) => return connect_failure(report, tag, &err),
        }
    }

    let outcome = if report.dropped > 0 {
        FlushOutcome::PartialOk
    } else {
        FlushOutcome::Ok
    };
    report.finish(outcome)
}

fn drop_record(ctx: &Context, report: &mut FlushReport) {
    report.dropped += 1;
    ctx.dropped_records.record_drop();
    ctx.dropped_records.warn_if_due(|count| {
        warn!("insightops: dropped {count} record(s) that could not be delivered");
    });
}

fn connect_failure(report: FlushReport, tag: &str, err: &ConnectError) -> FlushReport {
    if matches!(err, ConnectError::Closed) {
        debug!("insightops: context closed during flush of tag {tag:?}; asking host to retry");
        return report.finish(FlushOutcome::Retryable);
    }
    error!("insightops: cannot reach collector for tag {tag:?}: {err}");
    report.finish(FlushOutcome::Fatal)
}
