//! Plaintext delivery to a local listener through the production dialer.

use std::{
    io::{BufRead, BufReader},
    net::TcpListener,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use insightops_rs::{
    HostStatus, OutputPlugin, TcpDialer, config::Endpoint, test_utils::BatchBuilder,
};
use rstest::{fixture, rstest};

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

/// Accept `connections` connections in turn and forward each received line.
fn spawn_line_server(listener: TcpListener, connections: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..connections {
            let (stream, _) = listener.accept().expect("accept connection");
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    return;
                }
            }
        }
    });
    rx
}

fn local_plugin(port: u16) -> OutputPlugin {
    OutputPlugin::new()
        .with_environment([("unused", "")])
        .with_dialer_factory(move |settings| {
            let mut dialer = TcpDialer::from_settings(settings);
            dialer.endpoint = Endpoint {
                host: "127.0.0.1".into(),
                port,
            };
            Arc::new(dialer)
        })
}

fn recv_line(rx: &mpsc::Receiver<String>) -> String {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("line received by collector")
}

#[rstest]
fn persistent_context_streams_frames(tcp_listener: TcpListener) {
    let port = tcp_listener.local_addr().expect("address").port();
    let lines = spawn_line_server(tcp_listener, 1);
    let plugin = local_plugin(port);
    let handle = plugin
        .init(&[("region", "eu"), ("token", "SECRETA"), ("tls", "off")])
        .expect("init dials listener");
    let batch = BatchBuilder::new()
        .record([("msg", "one")])
        .record([("msg", "two")])
        .build();

    assert_eq!(plugin.flush(handle, &batch, "app"), HostStatus::Ok);

    assert_eq!(recv_line(&lines), "SECRETA {\"msg\":\"one\"}");
    assert_eq!(recv_line(&lines), "SECRETA {\"msg\":\"two\"}");
    plugin.exit();
}

#[rstest]
fn ephemeral_context_reconnects_per_flush(tcp_listener: TcpListener) {
    let port = tcp_listener.local_addr().expect("address").port();
    let lines = spawn_line_server(tcp_listener, 2);
    let plugin = local_plugin(port);
    let handle = plugin
        .init(&[
            ("region", "eu"),
            ("token", "SECRETA"),
            ("tls", "off"),
            ("connection_mode", "ephemeral"),
        ])
        .expect("init");

    for msg in ["first", "second"] {
        let batch = BatchBuilder::new().record([("msg", msg)]).build();
        assert_eq!(plugin.flush(handle, &batch, "app"), HostStatus::Ok);
        assert_eq!(recv_line(&lines), format!("SECRETA {{\"msg\":\"{msg}\"}}"));
    }
    plugin.exit();
}

#[rstest]
fn unreachable_collector_fails_init(tcp_listener: TcpListener) {
    let port = tcp_listener.local_addr().expect("address").port();
    drop(tcp_listener);
    let plugin = local_plugin(port);

    let result = plugin.init(&[
        ("region", "eu"),
        ("token", "SECRETA"),
        ("tls", "off"),
        ("connect_timeout_ms", "500"),
    ]);

    assert!(result.is_err());
    assert!(plugin.registry().is_empty());
}
