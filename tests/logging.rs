//! Diagnostics emitted on failure paths.

use insightops_rs::{
    FlushOutcome, OutputPlugin,
    test_utils::{BatchBuilder, StubDialer},
};
use log::Level;
use logtest::Logger;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use serial_test::serial;

// `Logger::start` installs the global logger, which only succeeds once per process.
static LOGGER: Lazy<Mutex<Logger>> = Lazy::new(|| Mutex::new(Logger::start()));

/// Lock the shared logger with its queue emptied.
fn logger() -> MutexGuard<'static, Logger> {
    let mut logger = LOGGER.lock();
    drain(&mut logger);
    logger
}

fn drain(logger: &mut Logger) -> Vec<(Level, String)> {
    let mut records = Vec::new();
    while let Some(record) = logger.pop() {
        records.push((record.level(), record.args().to_owned()));
    }
    records
}

fn plugin(dialer: &StubDialer) -> OutputPlugin {
    let dialer = dialer.clone();
    OutputPlugin::new()
        .with_environment([("unused", "")])
        .with_dialer_factory(move |_| dialer.shared())
}

#[test]
#[serial]
fn failed_attempts_are_logged_with_tag_and_count() {
    let mut logger = logger();
    let dialer = StubDialer::new();
    let plugin = plugin(&dialer);
    let handle = plugin
        .init(&[("region", "eu"), ("token", "SECRET"), ("max_retries", "2")])
        .expect("init");
    drain(&mut logger);
    dialer.fail_next_writes(2);

    let batch = BatchBuilder::new().record([("msg", "x")]).build();
    let report = plugin.flush_report(handle, &batch, "app.orders");

    assert_eq!(report.outcome, FlushOutcome::Retryable);
    let warnings: Vec<String> = drain(&mut logger)
        .into_iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, msg)| msg)
        .collect();
    assert!(
        warnings
            .iter()
            .any(|m| m.contains("\"app.orders\"") && m.contains("attempt 1/2")),
        "{warnings:?}"
    );
    assert!(
        warnings.iter().any(|m| m.contains("attempt 2/2")),
        "{warnings:?}"
    );
    assert!(warnings.iter().all(|m| !m.contains("SECRET")));
    plugin.exit();
}

#[test]
#[serial]
fn corrupt_batch_is_logged_as_error() {
    let mut logger = logger();
    let dialer = StubDialer::new();
    let plugin = plugin(&dialer);
    let handle = plugin
        .init(&[("region", "eu"), ("token", "SECRET")])
        .expect("init");
    drain(&mut logger);

    plugin.flush(handle, &[0xc1], "app.orders");

    let errors: Vec<String> = drain(&mut logger)
        .into_iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, msg)| msg)
        .collect();
    assert!(
        errors
            .iter()
            .any(|m| m.starts_with("insightops: cannot decode batch") && m.contains("app.orders")),
        "{errors:?}"
    );
    plugin.exit();
}

#[test]
#[serial]
fn tls_disabled_warns_at_init() {
    let mut logger = logger();
    let dialer = StubDialer::new();
    let plugin = plugin(&dialer);
    drain(&mut logger);

    plugin
        .init(&[("region", "eu"), ("token", "SECRET"), ("tls", "off")])
        .expect("init");

    assert!(
        drain(&mut logger)
            .iter()
            .any(|(level, msg)| *level == Level::Warn && msg.contains("plaintext"))
    );
    plugin.exit();
}
