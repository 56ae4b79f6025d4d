//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Delivery of produced measurements to interested consumers.
//!
//! [`MeasurementRouter`] is the seam a production router plugs into;
//! [`RoutingTables`] is the reference implementation, a key-indexed map from
//! measurement keys to the action and output adapters that accept them.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;
use tsf_adapters::{queue_for_processing, Adapter, AdapterCollection, Measurement, MeasurementKey};

/// The three role collections a router delivers between.
#[derive(Clone)]
pub struct AdapterGraph {
    /// Producers.
    pub inputs: Arc<AdapterCollection>,
    /// Consumers that also produce.
    pub actions: Arc<AdapterCollection>,
    /// Consumers.
    pub outputs: Arc<AdapterCollection>,
}

/// Outcome of a routing computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingSummary {
    /// Distinct keys with at least one keyed consumer.
    pub routed_keys: usize,
    /// Consumers with an explicit key filter.
    pub keyed_consumers: usize,
    /// Consumers that accept every key.
    pub broadcast_consumers: usize,
}

/// Routing collaborator used by the session in routed mode.
pub trait MeasurementRouter: Send + Sync {
    /// Bind the router to the session's collections.
    fn attach(&self, graph: AdapterGraph);

    /// Rebuild routes from the consumers' current filters. Keys outside
    /// `restriction`, when one is given, are never delivered.
    fn calculate_routing_tables(&self, restriction: Option<&[MeasurementKey]>) -> RoutingSummary;

    /// Deliver a produced batch to the consumers whose routes accept it.
    fn route(&self, measurements: &[Measurement]);

    /// Drop every route and the attached graph.
    fn clear(&self);
}

struct Consumer {
    adapter: Arc<dyn Adapter>,
    sources: Option<HashSet<String>>,
}

impl Consumer {
    fn accepts_source(&self, source: &str) -> bool {
        match &self.sources {
            None => true,
            Some(sources) => sources.contains(&source.to_ascii_uppercase()),
        }
    }
}

#[derive(Default)]
struct Table {
    consumers: Vec<Consumer>,
    by_key: HashMap<MeasurementKey, Vec<usize>>,
    broadcast: Vec<usize>,
    restriction: Option<HashSet<MeasurementKey>>,
}

/// Key-indexed reference router.
#[derive(Default)]
pub struct RoutingTables {
    graph: RwLock<Option<AdapterGraph>>,
    table: RwLock<Arc<Table>>,
    calculations: AtomicU64,
}

impl RoutingTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed routing computations.
    pub fn calculations(&self) -> u64 {
        self.calculations.load(Ordering::Relaxed)
    }

    /// Consumers currently routed for `key`, keyed and broadcast alike.
    pub fn consumers_of(&self, key: &MeasurementKey) -> Vec<String> {
        let table = self.table.read().clone();
        if table
            .restriction
            .as_ref()
            .is_some_and(|restriction| !restriction.contains(key))
        {
            return Vec::new();
        }
        table
            .by_key
            .get(key)
            .into_iter()
            .flatten()
            .chain(table.broadcast.iter())
            .map(|index| &table.consumers[*index])
            .filter(|consumer| consumer.accepts_source(key.source()))
            .map(|consumer| consumer.adapter.name())
            .collect()
    }
}

fn input_source_ids(adapter: &dyn Adapter) -> Option<Vec<String>> {
    if let Some(action) = adapter.as_action() {
        action.input_source_ids()
    } else if let Some(output) = adapter.as_output() {
        output.input_source_ids()
    } else {
        None
    }
}

fn collect_consumers(collection: &AdapterCollection, consumers: &mut Vec<Arc<dyn Adapter>>) {
    for member in collection.members() {
        match member.as_collection() {
            Some(nested) => collect_consumers(nested, consumers),
            None => consumers.push(member),
        }
    }
}

impl MeasurementRouter for RoutingTables {
    fn attach(&self, graph: AdapterGraph) {
        *self.graph.write() = Some(graph);
    }

    fn calculate_routing_tables(&self, restriction: Option<&[MeasurementKey]>) -> RoutingSummary {
        let started = Instant::now();
        let Some(graph) = self.graph.read().clone() else {
            return RoutingSummary::default();
        };
        let mut adapters = Vec::new();
        collect_consumers(&graph.actions, &mut adapters);
        collect_consumers(&graph.outputs, &mut adapters);

        let mut table = Table {
            restriction: restriction.map(|keys| keys.iter().cloned().collect()),
            ..Table::default()
        };
        for adapter in adapters {
            let sources = input_source_ids(adapter.as_ref()).map(|sources| {
                sources
                    .iter()
                    .map(|source| source.trim().to_ascii_uppercase())
                    .collect::<HashSet<_>>()
            });
            let index = table.consumers.len();
            let keys = adapter.input_measurement_keys().unwrap_or_default();
            let consumer = Consumer { adapter, sources };
            if keys.is_empty() {
                table.broadcast.push(index);
            } else {
                for key in keys {
                    if !consumer.accepts_source(key.source()) {
                        continue;
                    }
                    let routes = table.by_key.entry(key).or_default();
                    if !routes.contains(&index) {
                        routes.push(index);
                    }
                }
            }
            table.consumers.push(consumer);
        }

        let summary = RoutingSummary {
            routed_keys: table.by_key.len(),
            keyed_consumers: table.consumers.len() - table.broadcast.len(),
            broadcast_consumers: table.broadcast.len(),
        };
        *self.table.write() = Arc::new(table);
        self.calculations.fetch_add(1, Ordering::Relaxed);
        debug!(
            routed_keys = summary.routed_keys,
            keyed = summary.keyed_consumers,
            broadcast = summary.broadcast_consumers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "routing tables calculated"
        );
        summary
    }

    fn route(&self, measurements: &[Measurement]) {
        if measurements.is_empty() {
            return;
        }
        let table = self.table.read().clone();
        let mut deliveries: IndexMap<usize, Vec<Measurement>> = IndexMap::new();
        for measurement in measurements {
            let key = &measurement.key;
            if table
                .restriction
                .as_ref()
                .is_some_and(|restriction| !restriction.contains(key))
            {
                continue;
            }
            if let Some(routes) = table.by_key.get(key) {
                for index in routes {
                    deliveries
                        .entry(*index)
                        .or_default()
                        .push(measurement.clone());
                }
            }
            for index in &table.broadcast {
                if table.consumers[*index].accepts_source(key.source()) {
                    deliveries
                        .entry(*index)
                        .or_default()
                        .push(measurement.clone());
                }
            }
        }

        for (index, batch) in deliveries {
            let adapter = &table.consumers[index].adapter;
            if adapter.is_enabled() {
                queue_for_processing(adapter.as_ref(), &batch);
            }
        }
    }

    fn clear(&self) {
        *self.table.write() = Arc::new(Table::default());
        *self.graph.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tsf_adapters::{AdapterCore, AdapterRole, MeasurementQueue, OutputAdapter, Result};

    struct Sink {
        core: AdapterCore,
        queue: MeasurementQueue,
        sources: Option<Vec<String>>,
    }

    impl Sink {
        fn new(name: &str, connection_string: &str, sources: Option<&[&str]>) -> Arc<Self> {
            let sink = Arc::new(Self {
                core: AdapterCore::new(name).with_connection_string(connection_string),
                queue: MeasurementQueue::new(),
                sources: sources.map(|sources| sources.iter().map(|s| s.to_string()).collect()),
            });
            sink.initialize().unwrap();
            sink.set_initialized(true);
            sink.start().unwrap();
            sink
        }
    }

    impl Adapter for Sink {
        fn core(&self) -> &AdapterCore {
            &self.core
        }

        fn supports_temporal_processing(&self) -> bool {
            false
        }

        fn as_output(&self) -> Option<&dyn OutputAdapter> {
            Some(self)
        }
    }

    impl OutputAdapter for Sink {
        fn queue_measurements_for_processing(&self, measurements: &[Measurement]) {
            self.queue.push_all(measurements);
        }

        fn unprocessed_measurements(&self) -> usize {
            self.queue.len()
        }

        fn remove_measurements(&self, count: usize) -> usize {
            self.queue.remove_oldest(count)
        }

        fn input_source_ids(&self) -> Option<Vec<String>> {
            self.sources.clone()
        }
    }

    fn graph(outputs: &[Arc<Sink>]) -> AdapterGraph {
        let collection = AdapterCollection::new("outputs", AdapterRole::Output);
        collection.set_auto_initialize(false);
        for output in outputs {
            collection.add(output.clone());
        }
        AdapterGraph {
            inputs: AdapterCollection::new("inputs", AdapterRole::Input),
            actions: AdapterCollection::new("actions", AdapterRole::Action),
            outputs: collection,
        }
    }

    fn sample(source: &str, point: u32) -> Measurement {
        Measurement::new(MeasurementKey::new(source, point), 1.0, Utc::now())
    }

    #[test]
    fn keyed_consumers_receive_only_their_keys() {
        let keyed = Sink::new("keyed", "inputMeasurementKeys={PPA:1;PPA:2}", None);
        let open = Sink::new("open", "", None);
        let router = RoutingTables::new();
        router.attach(graph(&[keyed.clone(), open.clone()]));

        let summary = router.calculate_routing_tables(None);
        assert_eq!(
            summary,
            RoutingSummary {
                routed_keys: 2,
                keyed_consumers: 1,
                broadcast_consumers: 1
            }
        );

        router.route(&[sample("PPA", 1), sample("PPA", 3)]);
        assert_eq!(keyed.queue.len(), 1);
        assert_eq!(open.queue.len(), 2);
    }

    #[test]
    fn restriction_drops_unlisted_keys() {
        let open = Sink::new("open", "", None);
        let router = RoutingTables::new();
        router.attach(graph(&[open.clone()]));
        router.calculate_routing_tables(Some(&[MeasurementKey::new("PPA", 7)]));

        router.route(&[sample("PPA", 7), sample("PPA", 8)]);
        assert_eq!(open.queue.len(), 1);
        assert!(router.consumers_of(&MeasurementKey::new("PPA", 8)).is_empty());
    }

    #[test]
    fn source_hints_limit_delivery() {
        let shelby = Sink::new("shelby-only", "", Some(&["shelby"]));
        let router = RoutingTables::new();
        router.attach(graph(&[shelby.clone()]));
        router.calculate_routing_tables(None);

        router.route(&[sample("PPA", 1), sample("SHELBY", 1)]);
        assert_eq!(shelby.queue.len(), 1);
        assert_eq!(router.consumers_of(&MeasurementKey::new("SHELBY", 1)), ["shelby-only"]);
    }

    #[test]
    fn disabled_consumers_are_skipped() {
        let keyed = Sink::new("keyed", "inputMeasurementKeys=PPA:1", None);
        let router = RoutingTables::new();
        router.attach(graph(&[keyed.clone()]));
        router.calculate_routing_tables(None);
        keyed.stop().unwrap();

        router.route(&[sample("PPA", 1)]);
        assert!(keyed.queue.is_empty());
        assert_eq!(router.calculations(), 1);
    }
}
