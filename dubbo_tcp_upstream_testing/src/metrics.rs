//! Recorder helpers for asserting on bridge metrics.
//!
//! [`Snapshotter::snapshot`] drains what it reports, so a test should take a
//! single [`RecordedMetrics`] after exercising the code under test and run
//! every assertion against it.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder together with its snapshotter.
///
/// Install the recorder with `metrics::with_local_recorder` around the code
/// under test, then call [`RecordedMetrics::take`].
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

#[derive(Debug)]
struct RecordedMetric {
    name: String,
    labels: Vec<(String, String)>,
    value: DebugValue,
}

impl RecordedMetric {
    fn matches(&self, name: &str, label: Option<(&str, &str)>) -> bool {
        self.name == name
            && label.is_none_or(|(key, value)| {
                self.labels.iter().any(|(k, v)| k == key && v == value)
            })
    }
}

/// One snapshot of everything recorded so far.
#[derive(Debug)]
pub struct RecordedMetrics {
    entries: Vec<RecordedMetric>,
}

impl RecordedMetrics {
    /// Drain the recorder behind `snapshotter`.
    #[must_use]
    pub fn take(snapshotter: &Snapshotter) -> Self {
        let entries = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| RecordedMetric {
                name: key.key().name().to_owned(),
                labels: key
                    .key()
                    .labels()
                    .map(|l| (l.key().to_owned(), l.value().to_owned()))
                    .collect(),
                value,
            })
            .collect();
        Self { entries }
    }

    /// Value of the counter `name`, optionally narrowed to one label.
    #[must_use]
    pub fn counter(&self, name: &str, label: Option<(&str, &str)>) -> Option<u64> {
        self.entries.iter().find_map(|m| match m.value {
            DebugValue::Counter(c) if m.matches(name, label) => Some(c),
            _ => None,
        })
    }

    /// Value of the gauge `name`.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.entries.iter().find_map(|m| match m.value {
            DebugValue::Gauge(v) if m.matches(name, None) => Some(v.into_inner()),
            _ => None,
        })
    }

    /// Panic unless the counter `name` equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics when the counter is missing or holds another value.
    pub fn assert_counter(&self, name: &str, label: Option<(&str, &str)>, expected: u64) {
        assert_eq!(
            self.counter(name, label),
            Some(expected),
            "counter {name} {label:?} in {:#?}",
            self.entries
        );
    }

    /// Panic unless the gauge `name` equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics when the gauge is missing or holds another value.
    pub fn assert_gauge(&self, name: &str, expected: f64) {
        let value = self.gauge(name);
        assert!(
            value.is_some_and(|v| (v - expected).abs() < f64::EPSILON),
            "gauge {name}: expected {expected}, got {value:?} in {:#?}",
            self.entries
        );
    }
}
