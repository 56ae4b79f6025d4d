//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Prometheus instrumentation for routing and flow control.
use std::sync::Arc;

use anyhow::Result;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Metrics published by the session orchestrator.
#[derive(Clone)]
pub struct SessionMetrics {
    registry: SharedRegistry,
    routing_recalculations_total: IntCounterVec,
    evasive_dumps_total: IntCounterVec,
    measurements_dumped_total: IntCounterVec,
    threshold_warnings_total: IntCounterVec,
    output_queue_depth: IntGaugeVec,
}

impl SessionMetrics {
    /// Register the session metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let routing_recalculations_total = IntCounterVec::new(
            Opts::new(
                "tsf_session_routing_recalculations_total",
                "Number of times the routing tables were rebuilt",
            ),
            &["session"],
        )?;
        registry.register(Box::new(routing_recalculations_total.clone()))?;

        let evasive_dumps_total = IntCounterVec::new(
            Opts::new(
                "tsf_session_evasive_dumps_total",
                "Evasive truncations of output adapter queues",
            ),
            &["adapter"],
        )?;
        registry.register(Box::new(evasive_dumps_total.clone()))?;

        let measurements_dumped_total = IntCounterVec::new(
            Opts::new(
                "tsf_session_measurements_dumped_total",
                "Measurements discarded by evasive truncation",
            ),
            &["adapter"],
        )?;
        registry.register(Box::new(measurements_dumped_total.clone()))?;

        let threshold_warnings_total = IntCounterVec::new(
            Opts::new(
                "tsf_session_threshold_warnings_total",
                "Backlog warnings raised by the threshold policy",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(threshold_warnings_total.clone()))?;

        let output_queue_depth = IntGaugeVec::new(
            Opts::new(
                "tsf_session_output_queue_depth",
                "Last unprocessed measurement count reported by each output adapter",
            ),
            &["adapter"],
        )?;
        registry.register(Box::new(output_queue_depth.clone()))?;

        Ok(Self {
            registry,
            routing_recalculations_total,
            evasive_dumps_total,
            measurements_dumped_total,
            threshold_warnings_total,
            output_queue_depth,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_routing_recalculation(&self, session: &str) {
        self.routing_recalculations_total
            .with_label_values(&[session])
            .inc();
    }

    /// Record an evasive truncation of `count` measurements.
    pub fn record_dump(&self, adapter: &str, count: u64) {
        self.evasive_dumps_total.with_label_values(&[adapter]).inc();
        self.measurements_dumped_total
            .with_label_values(&[adapter])
            .inc_by(count);
    }

    pub fn record_threshold_warning(&self, kind: &str) {
        self.threshold_warnings_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn observe_queue_depth(&self, adapter: &str, depth: usize) {
        self.output_queue_depth
            .with_label_values(&[adapter])
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

impl std::fmt::Debug for SessionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(registry: &Registry, name: &str, label: &str) -> Option<f64> {
        registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == name)?
            .get_metric()
            .iter()
            .find(|metric| metric.get_label().iter().any(|pair| pair.get_value() == label))
            .map(|metric| metric.get_counter().get_value())
    }

    #[test]
    fn dumps_count_events_and_measurements() {
        let registry = new_registry();
        let metrics = SessionMetrics::new(registry.clone()).unwrap();
        metrics.record_dump("archive", 500);
        metrics.record_dump("archive", 500);

        assert_eq!(
            counter_value(&registry, "tsf_session_evasive_dumps_total", "archive"),
            Some(2.0)
        );
        assert_eq!(
            counter_value(&registry, "tsf_session_measurements_dumped_total", "archive"),
            Some(1000.0)
        );
    }

    #[test]
    fn registering_twice_on_one_registry_fails() {
        let registry = new_registry();
        SessionMetrics::new(registry.clone()).unwrap();
        assert!(SessionMetrics::new(registry).is_err());
    }
}
