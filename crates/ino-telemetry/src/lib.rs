// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured logging setup and per-step metrics for orchestration runs.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing init
// ---------------------------------------------------------------------------

/// Initialize the global tracing subscriber from a log level string.
///
/// `RUST_LOG` takes precedence when set; otherwise all `ino.*` targets log
/// at `level`. Safe to call once per process; later calls are ignored.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ino={level},inorder={level}")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ---------------------------------------------------------------------------
// StepSample
// ---------------------------------------------------------------------------

/// One executed graph step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSample {
    /// Node name.
    pub step: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the step completed without recording an error.
    pub ok: bool,
}

/// Aggregated statistics for one step across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Number of executions.
    pub count: usize,
    /// Number of executions that recorded an error.
    pub error_count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// StepMetrics
// ---------------------------------------------------------------------------

/// Thread-safe collector for step samples.
///
/// Cheap to clone; all clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct StepMetrics {
    inner: Arc<Mutex<Vec<StepSample>>>,
}

impl StepMetrics {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an executed step.
    pub fn record(&self, step: impl Into<String>, duration_ms: u64, ok: bool) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(StepSample {
            step: step.into(),
            duration_ms,
            ok,
        });
    }

    /// Number of samples recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-step aggregated summaries (deterministic ordering).
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, StepSummary> {
        let data = self.inner.lock().expect("metrics lock poisoned");
        let mut grouped: BTreeMap<String, Vec<&StepSample>> = BTreeMap::new();
        for sample in data.iter() {
            grouped.entry(sample.step.clone()).or_default().push(sample);
        }

        let mut out = BTreeMap::new();
        for (step, samples) in grouped {
            let mut durations: Vec<u64> = samples.iter().map(|s| s.duration_ms).collect();
            durations.sort_unstable();
            let count = samples.len();
            let error_count = samples.iter().filter(|s| !s.ok).count();
            let mean = durations.iter().sum::<u64>() as f64 / count as f64;
            out.insert(
                step,
                StepSummary {
                    count,
                    error_count,
                    mean_duration_ms: mean,
                    p50_duration_ms: percentile(&durations, 50.0),
                    p99_duration_ms: percentile(&durations, 99.0),
                },
            );
        }
        out
    }

    /// Export the summary as pretty JSON.
    #[must_use]
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.summary()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Clear all recorded samples.
    pub fn clear(&self) {
        self.inner.lock().expect("metrics lock poisoned").clear();
    }
}
