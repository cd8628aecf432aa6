//! Tests for acquiring a bridge through [`TcpConnPool`].

use bytes::Bytes;
use dubbo_tcp_upstream::{
    ConnectionPool,
    GenericUpstream,
    HostDescription,
    LoadBalancerContext,
    PoolFailureReason,
    PoolOutcome,
    TcpConnPool,
    UpstreamEvent,
    UpstreamError,
    pool::{CancelPolicy, ChannelPoolCallbacks, PoolEvent, Priority},
};
use dubbo_tcp_upstream_testing::{
    LoggerHandle,
    MockConnection,
    ScriptedPool,
    StaticCluster,
    logger,
};
use rstest::{fixture, rstest};
use serial_test::serial;
use tokio::sync::mpsc;

type Downstream = mpsc::UnboundedSender<UpstreamEvent>;
type Callbacks = ChannelPoolCallbacks<MockConnection, Downstream>;

#[fixture]
fn pool() -> ScriptedPool { ScriptedPool::new(HostDescription::new("orders", "10.1.2.3:20880")) }

fn adapter(pool: &ScriptedPool) -> TcpConnPool<ScriptedPool, Callbacks> {
    TcpConnPool::new(
        &StaticCluster::with_pool(pool.clone()),
        Priority::Default,
        LoadBalancerContext::default(),
    )
}

#[test]
fn cluster_without_pool_is_invalid() {
    let cluster = StaticCluster::empty();
    let mut adapter: TcpConnPool<ScriptedPool, Callbacks> =
        TcpConnPool::new(&cluster, Priority::High, LoadBalancerContext::default());

    assert!(!adapter.valid());
    assert_eq!(cluster.priorities(), vec![Priority::High]);

    let (downstream, _) = mpsc::unbounded_channel();
    let (callbacks, _) = ChannelPoolCallbacks::new(downstream);
    assert_eq!(adapter.new_stream(callbacks), Err(UpstreamError::InvalidPool));
}

#[rstest]
fn ready_bridge_reaches_the_connection(pool: ScriptedPool) {
    let mut adapter = adapter(&pool);
    let (downstream, mut upstream_events) = mpsc::unbounded_channel();
    let (callbacks, mut pool_events) = ChannelPoolCallbacks::new(downstream);
    adapter.new_stream(callbacks).expect("pool configured");
    assert_eq!(pool.pending_tokens().len(), 1);

    let connection = MockConnection::default();
    adapter.on_pool_outcome(pool.ready(connection.clone()));

    let Ok(PoolEvent::Ready { mut upstream, host }) = pool_events.try_recv() else {
        panic!("expected a ready bridge");
    };
    assert_eq!(host.address(), "10.1.2.3:20880");
    upstream
        .encode_data(Bytes::from_static(b"invoke"), true)
        .expect("connection open");
    assert_eq!(connection.log().written(), b"invoke");

    drop(upstream);
    assert!(connection.log().released, "idle connection returns to pool");
    assert!(upstream_events.try_recv().is_err());
}

#[rstest]
fn cancel_abandons_the_request(pool: ScriptedPool) {
    let mut adapter = adapter(&pool);
    let (downstream, _) = mpsc::unbounded_channel();
    let (callbacks, mut pool_events) = ChannelPoolCallbacks::new(downstream);
    adapter.new_stream(callbacks).expect("pool configured");

    assert!(adapter.cancel_any_pending_stream());
    assert!(!adapter.cancel_any_pending_stream());
    assert!(pool.pending_tokens().iter().all(|token| token.is_cancelled()));
    assert_eq!(pool.cancels(), vec![CancelPolicy::Default]);

    let late = MockConnection::default();
    adapter.on_pool_outcome(pool.ready(late.clone()));
    assert!(late.log().released);
    assert!(pool_events.try_recv().is_err());
}

#[rstest]
fn inline_answer_is_delivered_before_new_stream_returns(pool: ScriptedPool) {
    let connection = MockConnection::default();
    let outcome = pool.ready(connection);
    let pool = pool.complete_with(outcome);
    let mut adapter = adapter(&pool);
    let (downstream, _) = mpsc::unbounded_channel();
    let (callbacks, mut pool_events) = ChannelPoolCallbacks::new(downstream);

    adapter.new_stream(callbacks).expect("pool configured");
    assert!(matches!(pool_events.try_recv(), Ok(PoolEvent::Ready { .. })));
    assert!(pool.pending_tokens().is_empty());
}

#[rstest]
#[serial]
fn failure_is_forwarded_and_logged(pool: ScriptedPool, mut logger: LoggerHandle) {
    let mut adapter = adapter(&pool);
    let (downstream, _) = mpsc::unbounded_channel();
    let (callbacks, mut pool_events) = ChannelPoolCallbacks::new(downstream);
    adapter.new_stream(callbacks).expect("pool configured");

    adapter.on_pool_outcome(PoolOutcome::Failed {
        reason: PoolFailureReason::RemoteConnectionFailure,
        transport_failure_reason: "delayed connect error: 111".to_owned(),
        host: Some(pool.host()),
    });

    let Ok(PoolEvent::Failure {
        reason,
        transport_failure_reason,
        host,
    }) = pool_events.try_recv()
    else {
        panic!("expected a failure");
    };
    assert_eq!(reason, PoolFailureReason::RemoteConnectionFailure);
    assert_eq!(transport_failure_reason, "delayed connect error: 111");
    assert_eq!(host.map(|h| h.cluster().to_owned()), Some("orders".to_owned()));
    assert!(logger.contains(log::Level::Warn, "delayed connect error: 111"));
}
