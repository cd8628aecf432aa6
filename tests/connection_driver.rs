//! Tests for the tokio connection driver over in-memory transports.

use bytes::Bytes;
use dubbo_tcp_upstream::{
    CloseType,
    ConnectionConfig,
    ConnectionEvent,
    ConnectionSignal,
    UpstreamConnection,
    connection::{DriverExit, active_connection_count},
    connection_pair,
};
use futures::FutureExt;
use rstest::{fixture, rstest};
use serial_test::serial;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio_util::sync::CancellationToken;

#[fixture]
fn shutdown_token() -> CancellationToken {
    // Shutdown token for driver tests
    CancellationToken::new()
}

#[rstest]
#[tokio::test]
#[serial]
async fn writes_reach_the_peer_and_half_close(shutdown_token: CancellationToken) {
    let (client, mut server) = duplex(1024);
    let (mut connection, driver, mut signals) =
        connection_pair(client, ConnectionConfig::default(), shutdown_token)
            .expect("default config is valid");
    let driver = tokio::spawn(driver.run());

    connection.write(Bytes::from_static(b"hello "), false);
    connection.write(Bytes::from_static(b"dubbo"), true);

    let mut received = Vec::new();
    server
        .read_to_end(&mut received)
        .await
        .expect("peer reads request");
    assert_eq!(received, b"hello dubbo");
    assert_eq!(
        signals.recv().await,
        Some(ConnectionSignal::Event(ConnectionEvent::Connected))
    );

    connection.release();
    let exit = driver.await.expect("driver task").expect("driver result");
    assert!(matches!(exit, DriverExit::Released(_)));
    assert_eq!(connection.pending_write_bytes(), 0);
}

#[rstest]
#[tokio::test]
#[serial]
async fn peer_close_ends_the_stream(shutdown_token: CancellationToken) {
    let (client, mut server) = duplex(1024);
    let (_connection, driver, mut signals) =
        connection_pair(client, ConnectionConfig::default(), shutdown_token)
            .expect("default config is valid");
    let driver = tokio::spawn(driver.run());

    server.write_all(b"\xda\xbb").await.expect("peer write");
    drop(server);

    let mut seen = Vec::new();
    while let Some(signal) = signals.recv().await {
        seen.push(signal);
    }
    let data: Vec<u8> = seen
        .iter()
        .filter_map(|signal| match signal {
            ConnectionSignal::Data { data, .. } => Some(data.to_vec()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(data, vec![0xda, 0xbb]);
    assert_eq!(
        seen.first(),
        Some(&ConnectionSignal::Event(ConnectionEvent::Connected))
    );
    assert_eq!(
        &seen[seen.len() - 2..],
        &[
            ConnectionSignal::Data {
                data: Bytes::new(),
                end_stream: true,
            },
            ConnectionSignal::Event(ConnectionEvent::RemoteClose),
        ]
    );
    let exit = driver.await.expect("driver task").expect("driver result");
    assert!(matches!(exit, DriverExit::Closed));
}

#[rstest]
#[tokio::test]
#[serial]
async fn watermarks_track_queued_writes(shutdown_token: CancellationToken) {
    let (client, _server) = duplex(1024);
    let config = ConnectionConfig::default().watermarks(0, 8);
    let (mut connection, driver, mut signals) =
        connection_pair(client, config, shutdown_token).expect("watermarks are ordered");

    // Queue both writes before the driver runs so 16 bytes are pending.
    connection.write(Bytes::from_static(&[1; 8]), false);
    connection.write(Bytes::from_static(&[2; 8]), false);
    assert_eq!(connection.pending_write_bytes(), 16);
    let driver = tokio::spawn(driver.run());

    for expected in [
        ConnectionSignal::Event(ConnectionEvent::Connected),
        ConnectionSignal::AboveWriteBufferHighWatermark,
        ConnectionSignal::BelowWriteBufferLowWatermark,
    ] {
        assert_eq!(signals.recv().await, Some(expected));
    }
    assert!(signals.recv().now_or_never().is_none(), "no further signals");

    connection.close(CloseType::FlushWrite);
    assert_eq!(
        signals.recv().await,
        Some(ConnectionSignal::Event(ConnectionEvent::LocalClose))
    );
    let exit = driver.await.expect("driver task").expect("driver result");
    assert!(matches!(exit, DriverExit::Closed));
}

#[rstest]
#[tokio::test]
#[serial]
async fn close_is_idempotent_and_blocks_release(shutdown_token: CancellationToken) {
    let (client, mut server) = duplex(1024);
    let (mut connection, driver, _signals) =
        connection_pair(client, ConnectionConfig::default(), shutdown_token)
            .expect("default config is valid");
    connection.close(CloseType::NoFlush);
    connection.close(CloseType::FlushWrite);
    connection.release();

    let exit = driver.run().await.expect("driver result");
    assert!(matches!(exit, DriverExit::Closed));

    let mut buf = Vec::new();
    let read = server.read_to_end(&mut buf).await.expect("peer read");
    assert_eq!(read, 0, "transport dropped after close");
}

#[test]
#[serial]
fn driver_counts_as_active_until_dropped() {
    let before = active_connection_count();
    let (client, _server) = duplex(64);
    let pair = connection_pair(client, ConnectionConfig::default(), CancellationToken::new())
        .expect("default config is valid");
    assert_eq!(active_connection_count(), before + 1);
    drop(pair);
    assert_eq!(active_connection_count(), before);
}

#[rstest]
#[case(5, 4)]
#[case(0, 0)]
fn inconsistent_watermarks_are_rejected(#[case] low: usize, #[case] high: usize) {
    let (client, _server) = duplex(64);
    let err = connection_pair(
        client,
        ConnectionConfig::default().watermarks(low, high),
        CancellationToken::new(),
    )
    .err()
    .expect("watermarks rejected");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}
