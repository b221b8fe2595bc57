//! Observability hooks for the allocator.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;

/// Something the allocator did, reported once per occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorEvent {
    /// The long URL was already cached.
    CreateCacheHit,
    /// The long URL was already stored.
    CreateStoreHit,
    /// A new mapping was persisted.
    CreateGenerated,
    /// A candidate code was taken and the next salt is tried.
    CreateCollision,
    /// The collision limit was reached.
    CreateExhausted,
    /// A warm filter proved the code was never allocated.
    ResolveFilterReject,
    /// The cache answered, with a value or a negative entry.
    ResolveCacheHit,
    ResolveCacheMiss,
    ResolveStoreHit,
    /// No mapping exists for the code.
    ResolveNotFound,
}

impl AllocatorEvent {
    pub const ALL: [AllocatorEvent; 10] = [
        AllocatorEvent::CreateCacheHit,
        AllocatorEvent::CreateStoreHit,
        AllocatorEvent::CreateGenerated,
        AllocatorEvent::CreateCollision,
        AllocatorEvent::CreateExhausted,
        AllocatorEvent::ResolveFilterReject,
        AllocatorEvent::ResolveCacheHit,
        AllocatorEvent::ResolveCacheMiss,
        AllocatorEvent::ResolveStoreHit,
        AllocatorEvent::ResolveNotFound,
    ];

    /// Dotted name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            AllocatorEvent::CreateCacheHit => "create.cache.hits",
            AllocatorEvent::CreateStoreHit => "create.store.hits",
            AllocatorEvent::CreateGenerated => "create.generated",
            AllocatorEvent::CreateCollision => "create.collisions",
            AllocatorEvent::CreateExhausted => "create.failures",
            AllocatorEvent::ResolveFilterReject => "resolve.filter.rejects",
            AllocatorEvent::ResolveCacheHit => "resolve.cache.hits",
            AllocatorEvent::ResolveCacheMiss => "resolve.cache.misses",
            AllocatorEvent::ResolveStoreHit => "resolve.store.hits",
            AllocatorEvent::ResolveNotFound => "resolve.not_found",
        }
    }

    /// Counter name used by [`MetricsObserver`].
    pub fn metric_name(&self) -> &'static str {
        match self {
            AllocatorEvent::CreateCacheHit => "tinyurl.allocator.create.cache.hits",
            AllocatorEvent::CreateStoreHit => "tinyurl.allocator.create.store.hits",
            AllocatorEvent::CreateGenerated => "tinyurl.allocator.create.generated",
            AllocatorEvent::CreateCollision => "tinyurl.allocator.create.collisions",
            AllocatorEvent::CreateExhausted => "tinyurl.allocator.create.failures",
            AllocatorEvent::ResolveFilterReject => "tinyurl.allocator.resolve.filter.rejects",
            AllocatorEvent::ResolveCacheHit => "tinyurl.allocator.resolve.cache.hits",
            AllocatorEvent::ResolveCacheMiss => "tinyurl.allocator.resolve.cache.misses",
            AllocatorEvent::ResolveStoreHit => "tinyurl.allocator.resolve.store.hits",
            AllocatorEvent::ResolveNotFound => "tinyurl.allocator.resolve.not_found",
        }
    }
}

impl Display for AllocatorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives allocator events.
///
/// Called inline on the request path, so implementations must be cheap and
/// must not block.
pub trait AllocatorObserver: Send + Sync + 'static {
    fn observe(&self, event: AllocatorEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AllocatorObserver for NoopObserver {
    fn observe(&self, _event: AllocatorEvent) {}
}

/// Increments a `metrics` counter per event.
///
/// Counters go to whatever recorder the process installed; without one they
/// are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    /// Registers descriptions for every counter with the installed recorder.
    pub fn describe() {
        for event in AllocatorEvent::ALL {
            metrics::describe_counter!(event.metric_name(), format!("allocator {}", event.name()));
        }
    }
}

impl AllocatorObserver for MetricsObserver {
    fn observe(&self, event: AllocatorEvent) {
        metrics::counter!(event.metric_name()).increment(1);
    }
}

/// Keeps an in-memory tally of events.
#[derive(Debug, Default)]
pub struct CountingObserver {
    counts: Mutex<HashMap<AllocatorEvent, u64>>,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `event` has been observed.
    pub fn count(&self, event: AllocatorEvent) -> u64 {
        self.counts.lock().get(&event).copied().unwrap_or(0)
    }
}

impl AllocatorObserver for CountingObserver {
    fn observe(&self, event: AllocatorEvent) {
        *self.counts.lock().entry(event).or_default() += 1;
    }
}
