//! Flush behaviour against a recording stub collector.

use std::{sync::Arc, thread};

use rstest::rstest;

use crate::{
    config::{ConfigResolver, TOKENS_ENV_VAR},
    context::Context,
    record::RecordValue,
    test_utils::{BatchBuilder, StubDialer},
};

use super::*;

const SERVICE_PATTERN: &str = r"app\.(?P<tag>\w+)\.service";

fn context(pairs: &[(&str, &str)], dialer: &StubDialer) -> Context {
    context_with_env(pairs, &[], dialer)
}

fn context_with_env(
    pairs: &[(&str, &str)],
    env: &[(&str, &str)],
    dialer: &StubDialer,
) -> Context {
    let settings = ConfigResolver::with_env(&env)
        .resolve(&pairs)
        .expect("valid settings");
    Context::new(settings, dialer.shared()).expect("context starts")
}

fn single_token(dialer: &StubDialer) -> Context {
    context(&[("region", "eu"), ("token", "SECRETA")], dialer)
}

fn hello_batch() -> Vec<u8> {
    BatchBuilder::new().record([("msg", "hi")]).build()
}

#[rstest]
fn delivers_single_record_frame() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);

    let report = run(&ctx, &hello_batch(), "app.log");

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert_eq!(report.sent, 1);
    assert_eq!(report.routing_key.as_deref(), Some("app.log"));
    assert_eq!(dialer.frame_strings(), vec!["SECRETA {\"msg\":\"hi\"}\r\n"]);
}

#[rstest]
fn frames_follow_batch_order() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    let batch = (0..5)
        .fold(BatchBuilder::new(), |b, i| b.record([("seq", i as i64)]))
        .build();

    let report = run(&ctx, &batch, "app");

    assert_eq!(report.sent, 5);
    let expected: Vec<String> = (0..5)
        .map(|i| format!("SECRETA {{\"seq\":{i}}}\r\n"))
        .collect();
    assert_eq!(dialer.frame_strings(), expected);
}

#[rstest]
fn identical_batches_produce_identical_frames() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    let batch = BatchBuilder::new()
        .record([("b", RecordValue::from(1i64)), ("a", RecordValue::from("x"))])
        .build();

    run(&ctx, &batch, "app");
    run(&ctx, &batch, "app");

    let frames = dialer.frame_strings();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], frames[1]);
    assert_eq!(frames[0], "SECRETA {\"a\":\"x\",\"b\":1}\r\n");
}

#[rstest]
fn binary_values_are_sent_as_text() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    let batch = BatchBuilder::new()
        .record([("log", RecordValue::from(b"hello".as_slice()))])
        .build();

    run(&ctx, &batch, "app");

    assert_eq!(dialer.frame_strings(), vec!["SECRETA {\"log\":\"hello\"}\r\n"]);
}

#[rstest]
fn unconfigured_routing_key_skips_batch_without_dialing() {
    let dialer = StubDialer::new();
    let ctx = context_with_env(
        &[("region", "eu"), ("connection_mode", "ephemeral")],
        &[(TOKENS_ENV_VAR, r#"{"app": "SECRETA"}"#)],
        &dialer,
    );

    let report = run(&ctx, &hello_batch(), "unknown");

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert!(report.skipped);
    assert_eq!(report.sent, 0);
    assert_eq!(dialer.dial_count(), 0);
    assert!(dialer.frames().is_empty());
}

#[rstest]
#[case("app.prod.service", "SECRETP {\"msg\":\"hi\"}\r\n")]
#[case("app.staging.service", "SECRETS {\"msg\":\"hi\"}\r\n")]
fn regex_capture_selects_token(#[case] tag: &str, #[case] expected: &str) {
    let dialer = StubDialer::new();
    let ctx = context_with_env(
        &[
            ("region", "eu"),
            ("tag_regex", SERVICE_PATTERN),
            ("tag_key", "tag"),
        ],
        &[(TOKENS_ENV_VAR, r#"{"prod": "SECRETP", "staging": "SECRETS"}"#)],
        &dialer,
    );

    let report = run(&ctx, &hello_batch(), tag);

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert_eq!(dialer.frame_strings(), vec![expected]);
}

#[rstest]
fn unmatched_tag_passes_through_by_default() {
    let dialer = StubDialer::new();
    let ctx = context_with_env(
        &[
            ("region", "eu"),
            ("tag_regex", SERVICE_PATTERN),
            ("tag_key", "tag"),
        ],
        &[(TOKENS_ENV_VAR, r#"{"other": "SECRETO"}"#)],
        &dialer,
    );

    let report = run(&ctx, &hello_batch(), "other");

    assert_eq!(report.routing_key.as_deref(), Some("other"));
    assert_eq!(dialer.frame_strings(), vec!["SECRETO {\"msg\":\"hi\"}\r\n"]);
}

#[rstest]
fn unmatched_tag_is_skipped_under_drop_policy() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("tag_regex", SERVICE_PATTERN),
            ("tag_key", "tag"),
            ("unmatched_tag", "drop"),
        ],
        &dialer,
    );

    let report = run(&ctx, &hello_batch(), "other");

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert!(report.skipped);
    assert_eq!(report.routing_key, None);
    assert!(dialer.frames().is_empty());
}

#[rstest]
fn write_succeeding_on_last_attempt_delivers_once() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[("region", "eu"), ("token", "SECRETA"), ("max_retries", "3")],
        &dialer,
    );
    dialer.fail_next_writes(2);

    let report = run(&ctx, &hello_batch(), "app");

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert_eq!(dialer.write_attempts(), 3);
    assert_eq!(dialer.frames().len(), 1);
}

#[rstest]
fn exhausted_writes_make_batch_retryable() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[("region", "eu"), ("token", "SECRETA"), ("max_retries", "3")],
        &dialer,
    );
    dialer.fail_next_writes(3);
    let batch = BatchBuilder::new()
        .record([("msg", "first")])
        .record([("msg", "second")])
        .build();

    let report = run(&ctx, &batch, "app");

    assert_eq!(report.outcome, FlushOutcome::Retryable);
    assert_eq!(report.sent, 0);
    assert_eq!(dialer.write_attempts(), 3);
    assert!(dialer.frames().is_empty());
}

#[rstest]
fn retryable_batch_is_delivered_on_redelivery() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[("region", "eu"), ("token", "SECRETA"), ("max_retries", "1")],
        &dialer,
    );
    dialer.fail_next_writes(1);

    assert_eq!(run(&ctx, &hello_batch(), "app").outcome, FlushOutcome::Retryable);
    assert_eq!(run(&ctx, &hello_batch(), "app").outcome, FlushOutcome::Ok);

    assert_eq!(dialer.dial_count(), 2);
    assert_eq!(dialer.frames().len(), 1);
}

#[rstest]
fn drop_policy_discards_exhausted_record_and_continues() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("max_retries", "2"),
            ("on_write_failure", "drop"),
        ],
        &dialer,
    );
    dialer.fail_next_writes(2);
    let batch = BatchBuilder::new()
        .record([("msg", "lost")])
        .record([("msg", "kept")])
        .build();

    let report = run(&ctx, &batch, "app");

    assert_eq!(report.outcome, FlushOutcome::PartialOk);
    assert_eq!((report.sent, report.dropped), (1, 1));
    assert_eq!(dialer.frame_strings(), vec!["SECRETA {\"msg\":\"kept\"}\r\n"]);
}

#[rstest]
fn unencodable_record_is_dropped_and_rest_delivered() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    let batch = BatchBuilder::new()
        .record([("value", RecordValue::Float(f64::NAN))])
        .record([("msg", "ok")])
        .build();

    let report = run(&ctx, &batch, "app");

    assert_eq!(report.outcome, FlushOutcome::PartialOk);
    assert_eq!((report.sent, report.dropped), (1, 1));
    assert_eq!(dialer.frame_strings(), vec!["SECRETA {\"msg\":\"ok\"}\r\n"]);
}

#[rstest]
fn corrupt_batch_is_fatal_and_stops_delivery() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    let batch = BatchBuilder::new()
        .record([("msg", "before")])
        .raw(&[0xc1])
        .record([("msg", "after")])
        .build();

    let report = run(&ctx, &batch, "app");

    assert_eq!(report.outcome, FlushOutcome::Fatal);
    assert_eq!(dialer.frame_strings(), vec!["SECRETA {\"msg\":\"before\"}\r\n"]);
}

#[rstest]
fn connect_failure_is_fatal() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("connection_mode", "ephemeral"),
        ],
        &dialer,
    );
    dialer.refuse_connections(true);

    let report = run(&ctx, &hello_batch(), "app");

    assert_eq!(report.outcome, FlushOutcome::Fatal);
    assert_eq!(report.sent, 0);
}

#[rstest]
fn ephemeral_flush_closes_its_connection() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("connection_mode", "ephemeral"),
        ],
        &dialer,
    );

    run(&ctx, &hello_batch(), "app");
    run(&ctx, &hello_batch(), "app");

    assert_eq!(dialer.dial_count(), 2);
    assert_eq!(dialer.close_count(), 2);
}

#[rstest]
fn empty_batch_never_dials() {
    let dialer = StubDialer::new();
    let ctx = context(
        &[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("connection_mode", "ephemeral"),
        ],
        &dialer,
    );

    let report = run(&ctx, &[], "app");

    assert_eq!(report.outcome, FlushOutcome::Ok);
    assert_eq!(dialer.dial_count(), 0);
}

#[rstest]
fn flush_after_shutdown_is_retryable() {
    let dialer = StubDialer::new();
    let ctx = single_token(&dialer);
    ctx.shutdown();

    let report = run(&ctx, &hello_batch(), "app");

    assert_eq!(report.outcome, FlushOutcome::Retryable);
    assert!(dialer.frames().is_empty());
    assert_eq!(dialer.close_count(), 1);
}

#[rstest]
fn concurrent_flushes_share_one_persistent_connection() {
    let dialer = StubDialer::new();
    let ctx = Arc::new(single_token(&dialer));
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let batch = (0..25)
                    .fold(BatchBuilder::new(), |b, i| {
                        b.record([("worker", worker as i64), ("seq", i)])
                    })
                    .build();
                run(&ctx, &batch, "app").outcome
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().expect("worker"), FlushOutcome::Ok);
    }
    assert_eq!(dialer.dial_count(), 1);
    let frames = dialer.frame_strings();
    assert_eq!(frames.len(), 100);
    let sent: Vec<(i64, i64)> = frames
        .iter()
        .map(|frame| {
            let json = frame
                .strip_prefix("SECRETA ")
                .and_then(|rest| rest.strip_suffix("\r\n"))
                .expect("frame is token SP json CRLF");
            let body: serde_json::Value = serde_json::from_str(json).expect("payload is JSON");
            (
                body["worker"].as_i64().expect("worker field"),
                body["seq"].as_i64().expect("seq field"),
            )
        })
        .collect();

    // Each batch holds the connection for its whole run, so its frames are
    // contiguous and in order.
    let mut seen = Vec::new();
    for run in sent.chunks(25) {
        let worker = run[0].0;
        assert!(!seen.contains(&worker), "worker {worker} interleaved: {sent:?}");
        seen.push(worker);
        let expected: Vec<(i64, i64)> = (0..25).map(|seq| (worker, seq)).collect();
        assert_eq!(run, expected.as_slice());
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3]);
}
