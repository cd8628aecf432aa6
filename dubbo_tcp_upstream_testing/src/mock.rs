//! Stand-ins for the connection and pool collaborators.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use dubbo_tcp_upstream::{
    CloseType,
    ConnectionPool,
    HostDescription,
    LoadBalancerContext,
    PendingConnection,
    PoolOutcome,
    UpstreamConnection,
    pool::{CancelPolicy, Priority, ThreadLocalCluster},
};
use tokio_util::sync::CancellationToken;

/// Calls observed by a [`MockConnection`].
#[derive(Debug, Default)]
pub struct ConnectionLog {
    pub writes: Vec<(Bytes, bool)>,
    pub read_disable: Vec<bool>,
    pub closed: Option<CloseType>,
    pub released: bool,
}

impl ConnectionLog {
    /// All written bytes concatenated.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.writes
            .iter()
            .flat_map(|(data, _)| data.iter().copied())
            .collect()
    }
}

/// Connection recording every call. Clones share one log.
#[derive(Clone, Debug, Default)]
pub struct MockConnection {
    log: Arc<Mutex<ConnectionLog>>,
}

impl MockConnection {
    /// Lock the shared call log.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder panicked.
    pub fn log(&self) -> MutexGuard<'_, ConnectionLog> {
        self.log.lock().expect("connection log poisoned")
    }
}

impl UpstreamConnection for MockConnection {
    fn write(&mut self, data: Bytes, end_stream: bool) { self.log().writes.push((data, end_stream)); }

    fn read_disable(&mut self, disable: bool) { self.log().read_disable.push(disable); }

    fn close(&mut self, close_type: CloseType) { self.log().closed = Some(close_type); }

    fn release(&mut self) { self.log().released = true; }
}

#[derive(Default)]
struct PoolState {
    script: VecDeque<PendingConnection<MockConnection>>,
    pending: Vec<CancellationToken>,
    cancels: Vec<CancelPolicy>,
    requests: Vec<LoadBalancerContext>,
}

/// Pool answering each request from a script.
///
/// Requests beyond the script stay pending; their tokens are kept so tests
/// can check cancellation. Clones share state.
#[derive(Clone)]
pub struct ScriptedPool {
    host: Arc<HostDescription>,
    state: Arc<Mutex<PoolState>>,
}

impl ScriptedPool {
    /// Pool for `host` with an empty script.
    #[must_use]
    pub fn new(host: HostDescription) -> Self {
        Self {
            host: Arc::new(host),
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> { self.state.lock().expect("pool state poisoned") }

    /// Queue an inline answer for the next request.
    #[must_use]
    pub fn complete_with(self, outcome: PoolOutcome<MockConnection>) -> Self {
        self.state()
            .script
            .push_back(PendingConnection::Complete(outcome));
        self
    }

    /// A ready outcome for this pool's host.
    #[must_use]
    pub fn ready(&self, connection: MockConnection) -> PoolOutcome<MockConnection> {
        PoolOutcome::Ready {
            connection,
            host: Arc::clone(&self.host),
        }
    }

    /// Tokens handed out for requests left pending.
    #[must_use]
    pub fn pending_tokens(&self) -> Vec<CancellationToken> { self.state().pending.clone() }

    /// Policies passed to [`ConnectionPool::on_cancel`].
    #[must_use]
    pub fn cancels(&self) -> Vec<CancelPolicy> { self.state().cancels.clone() }

    /// Load-balancer contexts seen by [`ConnectionPool::new_connection`].
    #[must_use]
    pub fn requests(&self) -> Vec<LoadBalancerContext> { self.state().requests.clone() }
}

impl ConnectionPool for ScriptedPool {
    type Connection = MockConnection;

    fn host(&self) -> Arc<HostDescription> { Arc::clone(&self.host) }

    fn new_connection(&mut self, ctx: &LoadBalancerContext) -> PendingConnection<MockConnection> {
        let mut state = self.state();
        state.requests.push(ctx.clone());
        if let Some(answer) = state.script.pop_front() {
            return answer;
        }
        let token = CancellationToken::new();
        state.pending.push(token.clone());
        PendingConnection::Pending(token)
    }

    fn on_cancel(&mut self, policy: CancelPolicy) { self.state().cancels.push(policy); }
}

/// Cluster handing out clones of one optional pool.
#[derive(Clone, Default)]
pub struct StaticCluster {
    pool: Option<ScriptedPool>,
    priorities: Arc<Mutex<Vec<Priority>>>,
}

impl StaticCluster {
    /// Cluster with a TCP pool.
    #[must_use]
    pub fn with_pool(pool: ScriptedPool) -> Self {
        Self {
            pool: Some(pool),
            priorities: Arc::default(),
        }
    }

    /// Cluster without a TCP pool.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Priorities requested so far.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder panicked.
    #[must_use]
    pub fn priorities(&self) -> Vec<Priority> { self.priorities.lock().expect("poisoned").clone() }
}

impl ThreadLocalCluster for StaticCluster {
    type Pool = ScriptedPool;

    fn tcp_conn_pool(&self, priority: Priority, _ctx: &LoadBalancerContext) -> Option<ScriptedPool> {
        self.priorities.lock().expect("poisoned").push(priority);
        self.pool.clone()
    }
}
