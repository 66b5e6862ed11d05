//! Observability infrastructure - Cache metrics

mod metrics;

pub use metrics::InMemoryCacheMetrics;
