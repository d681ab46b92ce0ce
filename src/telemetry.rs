use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Millisecond bucket upper bounds for unit durations. The last bucket
/// absorbs everything slower.
const DURATION_BUCKETS_MS: [u64; 10] = [1, 5, 10, 25, 50, 100, 250, 1_000, 5_000, 30_000];

/// In-memory metrics for a run: namespaced counters, gauges, and duration
/// histograms. The runner feeds this from its collection loop, so no
/// synchronization is needed.
#[derive(Debug)]
pub struct MetricsRegistry {
    namespace: String,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    durations: BTreeMap<String, DurationHistogram>,
}

#[derive(Debug, Clone, Default)]
pub struct DurationHistogram {
    counts: [u64; DURATION_BUCKETS_MS.len()],
    observed: u64,
}

impl DurationHistogram {
    fn observe(&mut self, value: Duration) {
        let ms = value.as_millis() as u64;
        let idx = DURATION_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(DURATION_BUCKETS_MS.len() - 1);
        self.counts[idx] = self.counts[idx].saturating_add(1);
        self.observed = self.observed.saturating_add(1);
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            durations: BTreeMap::new(),
        }
    }

    pub fn inc_counter(&mut self, name: &str, delta: u64) -> u64 {
        let key = self.qualify(name);
        let counter = self.counters.entry(key).or_insert(0);
        *counter = counter.saturating_add(delta);
        *counter
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(&self.qualify(name)).copied().unwrap_or(0)
    }

    pub fn set_gauge(&mut self, name: &str, value: u64) {
        let key = self.qualify(name);
        self.gauges.insert(key, value);
    }

    pub fn observe_duration(&mut self, name: &str, value: Duration) {
        let key = self.qualify(name);
        self.durations.entry(key).or_default().observe(value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
            duration_counts: self
                .durations
                .iter()
                .map(|(name, hist)| (name.clone(), hist.counts.to_vec()))
                .collect(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub duration_counts: BTreeMap<String, Vec<u64>>,
}
