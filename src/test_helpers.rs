//! Connection double for unit tests.
//!
//! Unit tests see this crate as `crate`, while `dubbo_tcp_upstream_testing`
//! links its own copy, so its mocks implement a different
//! `UpstreamConnection` and cannot stand in here. Frame builders carry no
//! such trait and come from the testing crate directly.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::connection::{CloseType, UpstreamConnection};

/// Calls observed by a [`MockConnection`].
#[derive(Debug, Default)]
pub(crate) struct ConnectionLog {
    pub writes: Vec<(Bytes, bool)>,
    pub read_disable: Vec<bool>,
    pub closed: Option<CloseType>,
    pub released: bool,
}

/// Connection recording every call into a shared [`ConnectionLog`].
#[derive(Clone, Debug, Default)]
pub(crate) struct MockConnection {
    log: Arc<Mutex<ConnectionLog>>,
}

impl MockConnection {
    pub(crate) fn log(&self) -> MutexGuard<'_, ConnectionLog> {
        self.log.lock().expect("connection log poisoned")
    }
}

impl UpstreamConnection for MockConnection {
    fn write(&mut self, data: Bytes, end_stream: bool) { self.log().writes.push((data, end_stream)); }

    fn read_disable(&mut self, disable: bool) { self.log().read_disable.push(disable); }

    fn close(&mut self, close_type: CloseType) { self.log().closed = Some(close_type); }

    fn release(&mut self) { self.log().released = true; }
}
