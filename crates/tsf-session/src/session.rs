//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! The session orchestrator.
//!
//! An [`IaonSession`] owns one collection per role, grouped under a composite
//! collection in the order output, input, action. Every notification raised
//! anywhere in the graph arrives at the session through that composite, where
//! it is named, acted on and re-published to the session's own subscribers.
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use tsf_adapters::{
    format_count, Adapter, AdapterCollection, AdapterEvent, AdapterFactory, AdapterRole, DataSet,
    EventSource, Measurement, MeasurementKey, MessageLevel, Notification, Notifier, SignalRegistry,
    SubscriptionId,
};
use tsf_common::SessionConfig;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::metrics::SessionMetrics;
use crate::naming::DerivedNames;
use crate::policy::{QueueAction, ThresholdPolicy};
use crate::routing::{AdapterGraph, MeasurementRouter, RoutingTables};
use crate::temporal::{
    build_temporal_support_table, extract_temporal_configuration_cached,
    temporal_processing_support_exists, TEMPORAL_SUPPORT_TABLE,
};

/// Name of the composite collection holding the three role collections.
pub const ALL_ADAPTERS: &str = "AllAdapters";

const SESSION_COMPONENT: &str = "IaonSession";

/// How produced measurements reach consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Through the routing collaborator's key-indexed tables.
    Routed,
    /// To every action and output adapter, each collection filtering per member.
    Broadcast,
}

impl RoutingMode {
    /// Represent the mode as a static label for logs and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Routed => "routed",
            RoutingMode::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wires input, action and output collections together with routing and
/// threshold-driven flow control.
pub struct IaonSession {
    self_ref: Weak<IaonSession>,
    config: SessionConfig,
    node_id: RwLock<Uuid>,
    policy: ThresholdPolicy,
    names: DerivedNames,
    signals: Arc<SignalRegistry>,
    all: Arc<AdapterCollection>,
    inputs: Arc<AdapterCollection>,
    actions: Arc<AdapterCollection>,
    outputs: Arc<AdapterCollection>,
    router: Arc<dyn MeasurementRouter>,
    mode: RwLock<RoutingMode>,
    restriction: RwLock<Option<Vec<MeasurementKey>>>,
    notifier: Notifier,
    metrics: Option<SessionMetrics>,
    subscription: Mutex<Option<SubscriptionId>>,
    temporal_lock: Mutex<()>,
    poll: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl IaonSession {
    /// Session with the reference [`RoutingTables`] router.
    pub fn new(config: SessionConfig) -> Result<Arc<Self>> {
        Self::with_router(config, Arc::new(RoutingTables::new()), None)
    }

    /// Session with a caller-supplied router and optional metrics.
    pub fn with_router(
        config: SessionConfig,
        router: Arc<dyn MeasurementRouter>,
        metrics: Option<SessionMetrics>,
    ) -> Result<Arc<Self>> {
        let policy = ThresholdPolicy::from_config(&config)?;
        let signals = Arc::new(SignalRegistry::new());

        let all = AdapterCollection::new(ALL_ADAPTERS, AdapterRole::Composite);
        all.set_auto_initialize(false);
        all.set_start_members_on_initialize(false);
        all.core()
            .set_default_wait_handle_timeout(config.wait_handle_timeout);

        let role_collection = |role: AdapterRole| {
            let collection = AdapterCollection::new(role.data_member().unwrap_or("Adapters"), role);
            collection.set_monitor_intervals(config.health_interval, config.statistics_interval);
            collection
                .core()
                .set_initialization_timeout(config.initialization_timeout);
            collection
                .core()
                .set_default_wait_handle_timeout(config.wait_handle_timeout);
            collection
        };
        let inputs = role_collection(AdapterRole::Input);
        let actions = role_collection(AdapterRole::Action);
        let outputs = role_collection(AdapterRole::Output);

        // Archival first, then input, then actions on the flowing input.
        all.add(outputs.clone());
        all.add(inputs.clone());
        all.add(actions.clone());
        all.set_signal_registry(signals.clone());

        router.attach(AdapterGraph {
            inputs: inputs.clone(),
            actions: actions.clone(),
            outputs: outputs.clone(),
        });

        let mode = if config.use_measurement_routing {
            RoutingMode::Routed
        } else {
            RoutingMode::Broadcast
        };
        for collection in [&inputs, &actions, &outputs] {
            collection.set_process_measurement_filter(mode == RoutingMode::Broadcast);
        }

        let session = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            names: DerivedNames::new(config.name.clone()),
            config,
            node_id: RwLock::new(Uuid::new_v4()),
            policy,
            signals,
            all,
            inputs,
            actions,
            outputs,
            router,
            mode: RwLock::new(mode),
            restriction: RwLock::new(None),
            notifier: Notifier::new(),
            metrics,
            subscription: Mutex::new(None),
            temporal_lock: Mutex::new(()),
            poll: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&session);
        let subscription = session.all.core().notifier().subscribe(move |notification| {
            if let Some(session) = weak.upgrade() {
                session.handle(notification);
            }
            Ok(())
        });
        *session.subscription.lock() = Some(subscription);
        info!(session = ?session.name(), mode = %mode, "session created");
        Ok(session)
    }

    /// Configured session name, if any.
    pub fn name(&self) -> Option<&str> {
        self.names.session()
    }

    pub fn node_id(&self) -> Uuid {
        *self.node_id.read()
    }

    pub fn set_node_id(&self, node_id: Uuid) {
        *self.node_id.write() = node_id;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> Option<&SessionMetrics> {
        self.metrics.as_ref()
    }

    /// Composite of the three role collections.
    pub fn all_adapters(&self) -> &Arc<AdapterCollection> {
        &self.all
    }

    pub fn input_adapters(&self) -> &Arc<AdapterCollection> {
        &self.inputs
    }

    pub fn action_adapters(&self) -> &Arc<AdapterCollection> {
        &self.actions
    }

    pub fn output_adapters(&self) -> &Arc<AdapterCollection> {
        &self.outputs
    }

    pub fn router(&self) -> &Arc<dyn MeasurementRouter> {
        &self.router
    }

    /// External wait-handle registry shared by every collection.
    pub fn signal_registry(&self) -> &Arc<SignalRegistry> {
        &self.signals
    }

    /// Session observers; notifications carry their original source.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Register a session observer.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Constructor registry used by every role collection to load its table.
    pub fn set_factory(&self, factory: AdapterFactory) {
        for collection in [&self.inputs, &self.actions, &self.outputs] {
            collection.set_factory(factory.clone());
        }
    }

    /// Configuration data set shared by every collection and adapter.
    pub fn data_source(&self) -> Option<Arc<DataSet>> {
        self.all.data_source()
    }

    pub fn set_data_source(&self, data_source: Option<Arc<DataSet>>) {
        self.all.set_data_source(data_source);
    }

    /// Load the configured snapshot file, if one is configured. Returns
    /// whether a snapshot was applied.
    pub fn load_configuration_snapshot(&self) -> Result<bool> {
        let Some(path) = self.config.configuration_snapshot.as_deref() else {
            return Ok(false);
        };
        let data_source = DataSet::from_path(path)?;
        info!(path = %path.display(), tables = data_source.tables().len(), "configuration snapshot loaded");
        self.set_data_source(Some(Arc::new(data_source)));
        Ok(true)
    }

    pub fn input_measurement_keys_restriction(&self) -> Option<Vec<MeasurementKey>> {
        self.restriction.read().clone()
    }

    /// Limit routing to `keys`; `None` lifts the restriction.
    pub fn set_input_measurement_keys_restriction(&self, keys: Option<Vec<MeasurementKey>>) {
        *self.restriction.write() = keys;
        self.recalculate_routing_tables();
    }

    pub fn routing_mode(&self) -> RoutingMode {
        *self.mode.read_recursive()
    }

    pub fn use_measurement_routing(&self) -> bool {
        self.routing_mode() == RoutingMode::Routed
    }

    /// Switch between routed and broadcast delivery.
    ///
    /// The swap happens under the delivery lock, so a batch in flight is
    /// delivered entirely in one mode. Routes are computed before routed
    /// delivery is switched on.
    pub fn set_use_measurement_routing(&self, enabled: bool) {
        let mode = if enabled {
            RoutingMode::Routed
        } else {
            RoutingMode::Broadcast
        };
        if self.routing_mode() == mode {
            return;
        }
        if enabled {
            self.calculate_routes();
        }
        let mut current = self.mode.write();
        if *current == mode {
            return;
        }
        for collection in [&self.inputs, &self.actions, &self.outputs] {
            collection.set_process_measurement_filter(!enabled);
        }
        *current = mode;
        drop(current);
        info!(session = ?self.name(), mode = %mode, "measurement delivery mode changed");
    }

    /// Initialize every collection and, when `auto_start` is set, start them
    /// and compute routes.
    ///
    /// A background thread waits (bounded) for every adapter to finish
    /// initialising, then publishes the `TemporalSupport` table.
    pub fn initialize(&self, auto_start: bool) -> Result<()> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }
        for collection in [&self.inputs, &self.actions, &self.outputs] {
            collection.set_start_members_on_initialize(auto_start);
        }
        self.all.initialize()?;
        self.spawn_initialized_poll()?;

        if auto_start {
            self.all.start()?;
            self.recalculate_routing_tables();
        }
        info!(session = ?self.name(), auto_start, "session initialized");
        Ok(())
    }

    /// Start every collection that is not already running.
    pub fn start(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }
        self.all.start()?;
        self.recalculate_routing_tables();
        Ok(())
    }

    /// Stop every collection.
    pub fn stop(&self) -> Result<()> {
        self.all.stop()?;
        Ok(())
    }

    /// Block until the initialization poll, if one is running, has finished.
    pub fn wait_for_initialized_poll(&self) {
        let handle = self.poll.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn spawn_initialized_poll(&self) -> Result<()> {
        let session = self.self_ref.clone();
        let attempts = self.config.initialized_poll_attempts;
        let interval = self.config.initialized_poll_interval;
        let handle = thread::Builder::new()
            .name("tsf-session-init-poll".to_owned())
            .spawn(move || {
                for _ in 0..attempts {
                    let Some(current) = session.upgrade() else {
                        return;
                    };
                    if current.all.all_members_initialized() {
                        break;
                    }
                    drop(current);
                    thread::sleep(interval);
                }
                if let Some(current) = session.upgrade() {
                    if !current.all.all_members_initialized() {
                        debug!("adapters still initialising; publishing temporal support anyway");
                    }
                    current.request_temporal_support();
                }
            })
            .map_err(|source| SessionError::Spawn {
                task: "initialization poll",
                source,
            })?;

        let previous = self.poll.lock().replace(handle);
        if let Some(previous) = previous {
            let _ = previous.join();
        }
        Ok(())
    }

    /// Rebuild routes when routed delivery is on and every collection has
    /// initialized; otherwise do nothing.
    pub fn recalculate_routing_tables(&self) {
        if self.routing_mode() == RoutingMode::Routed {
            self.calculate_routes();
        }
    }

    fn calculate_routes(&self) {
        if !self.collections_initialized() {
            return;
        }
        let restriction = self.restriction.read().clone();
        let summary = self.router.calculate_routing_tables(restriction.as_deref());
        if let Some(metrics) = &self.metrics {
            metrics.record_routing_recalculation(self.name().unwrap_or("default"));
        }
        debug!(
            session = ?self.name(),
            routed_keys = summary.routed_keys,
            keyed = summary.keyed_consumers,
            broadcast = summary.broadcast_consumers,
            "routing tables recalculated"
        );
    }

    fn collections_initialized(&self) -> bool {
        self.all.is_initialized()
            && [&self.inputs, &self.actions, &self.outputs]
                .iter()
                .all(|collection| collection.is_initialized())
    }

    /// Publish the `TemporalSupport` table into the configuration data set
    /// unless it is already there. Without a data set there is nothing to do.
    pub fn request_temporal_support(&self) {
        let _guard = self.temporal_lock.lock();
        let Some(data_source) = self.data_source() else {
            debug!("no configuration data set; temporal support not published");
            return;
        };
        if data_source.contains_table(TEMPORAL_SUPPORT_TABLE) {
            return;
        }
        let table = match build_temporal_support_table(&[
            self.outputs.clone(),
            self.inputs.clone(),
            self.actions.clone(),
        ]) {
            Ok(table) => table,
            Err(err) => {
                error!(session = ?self.name(), error = %err, "unable to build temporal support table");
                return;
            }
        };
        let capable = table.len();
        let mut updated = (*data_source).clone();
        updated.add_table(table);
        self.set_data_source(Some(Arc::new(updated)));
        info!(session = ?self.name(), adapters = capable, "temporal support published");
    }

    /// Whether any adapter, optionally only those in one role table, can
    /// reprocess historical ranges.
    pub fn temporal_processing_support_exists(&self, collection: Option<&str>) -> bool {
        temporal_processing_support_exists(self.data_source().as_deref(), collection)
    }

    /// Reduced configuration holding only temporal-capable adapters.
    pub fn temporal_configuration(&self) -> Result<Option<Arc<DataSet>>> {
        match self.data_source() {
            Some(realtime) => Ok(Some(extract_temporal_configuration_cached(&realtime)?)),
            None => Ok(None),
        }
    }

    /// Node identity followed by the combined status of the three role collections.
    pub fn status(&self) -> String {
        let mut status = String::new();
        let _ = writeln!(status, "             Node ID: {}", self.node_id());
        for (title, collection) in [
            ("Input Adapters", &self.inputs),
            ("Action Adapters", &self.actions),
            ("Output Adapters", &self.outputs),
        ] {
            let _ = writeln!(status);
            let _ = writeln!(status, ">> {}:", title);
            let _ = writeln!(status);
            let _ = writeln!(status, "{}", collection.status());
        }
        status
    }

    /// Derived display name of a notification source.
    pub fn derived_name(&self, source: &EventSource) -> String {
        self.names.derive(source)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Stop and dispose every collection (output, input, action), then
    /// announce `Disposed`. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.wait_for_initialized_poll();
        for collection in [&self.outputs, &self.inputs, &self.actions] {
            if let Err(err) = collection.stop() {
                error!(collection = %collection.name(), error = %err, "failed to stop collection during dispose");
            }
        }
        self.all.dispose();
        if let Some(subscription) = self.subscription.lock().take() {
            self.all.unsubscribe(subscription);
        }
        self.router.clear();
        info!(session = ?self.name(), "session disposed");
        self.notifier.publish(Notification {
            source: Some(EventSource::Component(SESSION_COMPONENT)),
            event: AdapterEvent::Disposed,
        });
    }

    fn handle(&self, notification: &Notification) {
        let source = notification
            .source
            .clone()
            .unwrap_or_else(|| EventSource::Text(self.all.name()));
        let event = &notification.event;
        match event {
            AdapterEvent::StatusMessage { level, message } => {
                self.report(&source, *level, message);
                return;
            }
            AdapterEvent::ProcessException(err) => {
                self.report(&source, MessageLevel::Alarm, err);
            }
            AdapterEvent::InputMeasurementKeysUpdated | AdapterEvent::OutputMeasurementsUpdated => {
                self.recalculate_routing_tables();
            }
            AdapterEvent::NewMeasurements(batch) => self.deliver(&source, batch),
            AdapterEvent::UnpublishedSamples(seconds) => self.unpublished_samples(&source, *seconds),
            AdapterEvent::UnprocessedMeasurements(depth) => self.unprocessed_measurements(&source, *depth),
            AdapterEvent::ProcessingComplete => {
                self.report(&source, MessageLevel::Info, "Processing completed.");
            }
            AdapterEvent::Disposed => {
                self.report(&source, MessageLevel::Info, "Disposed.");
            }
        }
        self.notifier.publish(Notification {
            source: Some(source),
            event: event.clone(),
        });
    }

    /// Publish `[derived name] message` to session observers.
    fn report(&self, source: &EventSource, level: MessageLevel, message: impl fmt::Display) {
        let message = format!("[{}] {}", self.names.derive(source), message);
        self.notifier.publish(Notification {
            source: Some(source.clone()),
            event: AdapterEvent::StatusMessage { level, message },
        });
    }

    fn deliver(&self, source: &EventSource, measurements: &[Measurement]) {
        let Some(producer) = source.as_adapter() else {
            return;
        };
        if producer.as_input().is_none() && producer.as_action().is_none() {
            return;
        }
        let mode = self.mode.read_recursive();
        match *mode {
            RoutingMode::Routed => self.router.route(measurements),
            RoutingMode::Broadcast => {
                self.actions.queue_measurements_for_processing(measurements);
                self.outputs.queue_measurements_for_processing(measurements);
            }
        }
    }

    fn unprocessed_measurements(&self, source: &EventSource, depth: usize) {
        let name = self.names.derive(source);
        if let Some(metrics) = &self.metrics {
            metrics.observe_queue_depth(&name, depth);
        }
        let action = self.policy.evaluate_queue(depth);
        match action {
            QueueAction::Healthy => {}
            QueueAction::Dump { count } => {
                let output = source.as_adapter().and_then(|adapter| adapter.as_output());
                let Some(output) = output else {
                    warn!(source = %name, depth, "unprocessed backlog on a non-output source");
                    self.report(
                        source,
                        MessageLevel::Warning,
                        format!(
                            "CRITICAL: There are {} unprocessed measurements in the adapter queue - but sender \"{}\" is not an output adapter, so no evasive action can be exercised.",
                            format_count(depth as u64),
                            source_type_name(source)
                        ),
                    );
                    return;
                };
                let removed = output.remove_measurements(usize::try_from(count).unwrap_or(usize::MAX));
                if let Some(metrics) = &self.metrics {
                    metrics.record_dump(&name, removed as u64);
                }
                error!(source = %name, depth, dumped = removed, "output queue truncated");
                self.report(
                    source,
                    MessageLevel::Alarm,
                    format!(
                        "System exercised evasive action to conserve memory and dumped {} unprocessed measurements from the output queue :(",
                        format_count(removed as u64)
                    ),
                );
                self.report(
                    source,
                    MessageLevel::Warning,
                    "NOTICE: Please adjust measurement threshold settings and/or increase amount of available system memory.",
                );
            }
            QueueAction::Warning { critical } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_threshold_warning(action.as_str());
                }
                warn!(source = %name, depth, critical, "output queue backlog");
                let (level, prefix) = if critical {
                    (MessageLevel::Critical, MessageLevel::Critical.prefix())
                } else {
                    (MessageLevel::Warning, "")
                };
                self.report(
                    source,
                    level,
                    format!(
                        "{}There are {} unprocessed measurements in the output queue.",
                        prefix,
                        format_count(depth as u64)
                    ),
                );
            }
        }
    }

    fn unpublished_samples(&self, source: &EventSource, seconds: u32) {
        let (lag_time, processing_interval) = match source.as_adapter() {
            Some(adapter) => (
                adapter.as_action().and_then(|action| action.lag_time()),
                adapter.processing_interval(),
            ),
            None => (None, -1),
        };
        if !self
            .policy
            .samples_exceed(seconds, lag_time, processing_interval)
        {
            return;
        }
        if let Some(adapter) = source.as_adapter() {
            adapter.core().record_lag_warning();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_threshold_warning("unpublished");
        }
        warn!(source = %self.names.derive(source), seconds, "action adapter falling behind");
        self.report(
            source,
            MessageLevel::Warning,
            format!(
                "There are {} seconds of unpublished data in the action adapter concentration queue.",
                seconds
            ),
        );
    }
}

fn source_type_name(source: &EventSource) -> &'static str {
    match source {
        EventSource::Adapter(adapter) => adapter.type_name(),
        EventSource::Text(_) => "String",
        EventSource::Component(name) => *name,
    }
}

impl fmt::Debug for IaonSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IaonSession")
            .field("name", &self.name())
            .field("mode", &self.routing_mode())
            .field("inputs", &self.inputs.len())
            .field("actions", &self.actions.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> SessionConfig {
        SessionConfig {
            name: Some(name.to_owned()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let config = SessionConfig {
            measurement_warning_threshold: 10,
            measurement_dumping_threshold: 10,
            ..SessionConfig::default()
        };
        assert!(matches!(
            IaonSession::new(config),
            Err(SessionError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn collections_are_grouped_output_input_action() {
        let session = IaonSession::new(named("live")).unwrap();
        let order: Vec<String> = session
            .all_adapters()
            .members()
            .iter()
            .map(|member| member.name())
            .collect();
        assert_eq!(order, ["OutputAdapters", "InputAdapters", "ActionAdapters"]);
        assert_eq!(session.output_adapters().data_member().as_deref(), Some("OutputAdapters"));
        session.dispose();
    }

    #[test]
    fn routing_toggle_flips_collection_filters() {
        let session = IaonSession::new(named("live")).unwrap();
        assert_eq!(session.routing_mode(), RoutingMode::Routed);
        assert!(!session.output_adapters().process_measurement_filter());

        session.set_use_measurement_routing(false);
        assert_eq!(session.routing_mode(), RoutingMode::Broadcast);
        assert!(session.output_adapters().process_measurement_filter());
        assert!(session.action_adapters().process_measurement_filter());

        session.set_use_measurement_routing(true);
        assert!(!session.input_adapters().process_measurement_filter());
        session.dispose();
    }

    #[test]
    fn session_status_lists_each_role() {
        let session = IaonSession::new(SessionConfig::default()).unwrap();
        let node_id = Uuid::parse_str("6a1f4c3e-0d7b-4c55-9e2a-3b8f1d2c4e50").unwrap();
        session.set_node_id(node_id);
        let status = session.status();
        assert!(status.contains(&format!("Node ID: {}", node_id)));
        assert!(status.contains(">> Input Adapters:"));
        assert!(status.contains(">> Action Adapters:"));
        assert!(status.contains(">> Output Adapters:"));
        session.dispose();
    }

    #[test]
    fn use_after_dispose_is_an_error() {
        let session = IaonSession::new(SessionConfig::default()).unwrap();
        session.dispose();
        session.dispose();
        assert!(matches!(session.initialize(false), Err(SessionError::Disposed)));
    }
}
