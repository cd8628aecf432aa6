//! Utilities for exercising [`dubbo_tcp_upstream`] bridges in tests.
//!
//! The helpers build Dubbo frames, stand in for the pool and connection
//! collaborators, snapshot recorded metrics, and drive a real
//! [`ConnectionDriver`] over a `tokio::io::duplex` stream against a scripted
//! backend.
//!
//! ```rust
//! use bytes::Bytes;
//! use dubbo_tcp_upstream_testing::{dubbo_frame, drive_bridge};
//!
//! # async fn example() {
//! let outcome = drive_bridge(Bytes::from_static(b"ping"), vec![dubbo_frame(b"pong")])
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.backend_received, b"ping");
//! # }
//! ```
//!
//! [`ConnectionDriver`]: dubbo_tcp_upstream::ConnectionDriver

pub mod drive;
pub mod frames;
pub mod logging;
pub mod metrics;
pub mod mock;

pub use drive::{BridgeOutcome, drive_bridge, drive_bridge_with};
pub use frames::{DubboHeader, dubbo_frame, frame_with_header, split_chunks};
pub use logging::{LoggerHandle, logger};
pub use metrics::{RecordedMetrics, debugging_recorder_setup};
pub use mock::{ConnectionLog, MockConnection, ScriptedPool, StaticCluster};
