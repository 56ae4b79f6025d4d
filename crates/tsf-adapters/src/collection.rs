//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Ordered groups of adapters that behave as a single adapter.
//!
//! A collection forwards every member notification to its own subscribers,
//! filling in the member as the source when the member did not name one.
//! Lifecycle cascades run in insertion order; a failing member is reported
//! through a process exception and the cascade carries on.
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::adapter::{Adapter, AdapterCore};
use crate::dataset::DataSet;
use crate::error::{AdapterError, Result};
use crate::factory::{AdapterDefinition, AdapterFactory};
use crate::measurement::{Measurement, MeasurementKey};
use crate::notify::{format_count, AdapterEvent, EventSource, MessageLevel, Notification, SubscriptionId};
use crate::roles::queue_for_processing;
use crate::signal::{ManualResetEvent, SignalRegistry};

/// Default period between member health polls.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);
/// Default period between statistics summaries.
pub const DEFAULT_STATISTICS_INTERVAL: Duration = Duration::from_secs(60);

/// Role shared by every member of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterRole {
    /// Input adapters.
    Input,
    /// Action adapters.
    Action,
    /// Output adapters.
    Output,
    /// A collection of collections.
    Composite,
}

impl AdapterRole {
    /// Configuration table holding adapter rows for this role.
    pub fn data_member(&self) -> Option<&'static str> {
        match self {
            AdapterRole::Input => Some("InputAdapters"),
            AdapterRole::Action => Some("ActionAdapters"),
            AdapterRole::Output => Some("OutputAdapters"),
            AdapterRole::Composite => None,
        }
    }
}

impl fmt::Display for AdapterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdapterRole::Input => "input",
            AdapterRole::Action => "action",
            AdapterRole::Output => "output",
            AdapterRole::Composite => "composite",
        };
        f.write_str(label)
    }
}

struct Member {
    adapter: Arc<dyn Adapter>,
    subscription: SubscriptionId,
}

struct Monitor {
    stop: Arc<ManualResetEvent>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct Statistics {
    runtime_start: Instant,
    last_report: Instant,
    last_total: u64,
}

impl Statistics {
    fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            runtime_start: now,
            last_report: now,
            last_total: total,
        }
    }
}

/// Union of member input keys, tagged with the membership generation it was
/// built from.
struct KeyFilter {
    generation: u64,
    keys: Option<Vec<MeasurementKey>>,
    sorted: Vec<MeasurementKey>,
}

impl KeyFilter {
    fn accepts(&self, key: &MeasurementKey) -> bool {
        self.sorted.is_empty() || self.sorted.binary_search(key).is_ok()
    }
}

/// A group of same-role adapters that is itself an [`Adapter`].
pub struct AdapterCollection {
    core: AdapterCore,
    role: AdapterRole,
    self_ref: Weak<AdapterCollection>,
    members: RwLock<Vec<Member>>,
    signals: RwLock<Arc<SignalRegistry>>,
    factory: RwLock<Option<AdapterFactory>>,
    data_member: RwLock<Option<String>>,
    process_measurement_filter: AtomicBool,
    auto_initialize: AtomicBool,
    start_members_on_initialize: AtomicBool,
    intervals: RwLock<(Duration, Duration)>,
    statistics: Mutex<Statistics>,
    monitor: Mutex<Option<Monitor>>,
    key_filter: RwLock<Option<KeyFilter>>,
    key_generation: AtomicU64,
}

impl AdapterCollection {
    /// Empty collection with its own signal registry.
    pub fn new(name: impl Into<String>, role: AdapterRole) -> Arc<Self> {
        let signals = Arc::new(SignalRegistry::new());
        Arc::new_cyclic(|self_ref| {
            let core = AdapterCore::new(name);
            core.attach_signal_registry(signals.clone());
            Self {
                core,
                role,
                self_ref: self_ref.clone(),
                members: RwLock::new(Vec::new()),
                signals: RwLock::new(signals),
                factory: RwLock::new(None),
                data_member: RwLock::new(role.data_member().map(str::to_owned)),
                process_measurement_filter: AtomicBool::new(false),
                auto_initialize: AtomicBool::new(true),
                start_members_on_initialize: AtomicBool::new(true),
                intervals: RwLock::new((DEFAULT_HEALTH_INTERVAL, DEFAULT_STATISTICS_INTERVAL)),
                statistics: Mutex::new(Statistics::new(0)),
                monitor: Mutex::new(None),
                key_filter: RwLock::new(None),
                key_generation: AtomicU64::new(0),
            }
        })
    }

    pub fn role(&self) -> AdapterRole {
        self.role
    }

    /// Share `registry` with this collection and every member.
    pub fn set_signal_registry(&self, registry: Arc<SignalRegistry>) {
        *self.signals.write() = registry.clone();
        self.core.attach_signal_registry(registry.clone());
        for member in self.members() {
            attach_registry(member.as_ref(), &registry);
        }
    }

    pub fn signal_registry(&self) -> Arc<SignalRegistry> {
        self.signals.read().clone()
    }

    /// Constructor registry used by [`Adapter::initialize`] to load members.
    pub fn set_factory(&self, factory: AdapterFactory) {
        *self.factory.write() = Some(factory);
    }

    /// Table to load members from; defaults to the role's table.
    pub fn set_data_member(&self, data_member: impl Into<String>) {
        *self.data_member.write() = Some(data_member.into());
    }

    pub fn data_member(&self) -> Option<String> {
        self.data_member.read().clone()
    }

    pub fn process_measurement_filter(&self) -> bool {
        self.process_measurement_filter.load(Ordering::SeqCst)
    }

    /// When set, batches handed to the collection are filtered per member.
    pub fn set_process_measurement_filter(&self, enabled: bool) {
        self.process_measurement_filter
            .store(enabled, Ordering::SeqCst);
    }

    pub fn auto_initialize(&self) -> bool {
        self.auto_initialize.load(Ordering::SeqCst)
    }

    /// When set, `add` initialises each member on its own thread; otherwise
    /// members are initialised in order by the collection's `initialize`.
    pub fn set_auto_initialize(&self, enabled: bool) {
        self.auto_initialize.store(enabled, Ordering::SeqCst);
    }

    pub fn start_members_on_initialize(&self) -> bool {
        self.start_members_on_initialize.load(Ordering::SeqCst)
    }

    /// Whether auto-start members are started as soon as they initialise.
    pub fn set_start_members_on_initialize(&self, enabled: bool) {
        self.start_members_on_initialize
            .store(enabled, Ordering::SeqCst);
    }

    /// Monitor periods; applied the next time the collection starts.
    pub fn set_monitor_intervals(&self, health: Duration, statistics: Duration) {
        *self.intervals.write() = (health, statistics);
    }

    /// Members in insertion order.
    pub fn members(&self) -> Vec<Arc<dyn Adapter>> {
        self.members
            .read()
            .iter()
            .map(|member| member.adapter.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    pub fn try_get_by_id(&self, id: u32) -> Option<Arc<dyn Adapter>> {
        self.members
            .read()
            .iter()
            .find(|member| member.adapter.id() == id)
            .map(|member| member.adapter.clone())
    }

    /// Member by name, ignoring case.
    pub fn try_get_by_name(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.members
            .read()
            .iter()
            .find(|member| member.adapter.name().eq_ignore_ascii_case(name))
            .map(|member| member.adapter.clone())
    }

    /// Whether every member, recursively, has finished initialising.
    pub fn all_members_initialized(&self) -> bool {
        self.members().iter().all(|member| {
            member.is_initialized()
                && member
                    .as_collection()
                    .map_or(true, AdapterCollection::all_members_initialized)
        })
    }

    /// Append a member: share the signal registry and data source, forward
    /// its notifications and, when auto-initialising, initialise it.
    pub fn add(&self, adapter: Arc<dyn Adapter>) {
        attach_registry(adapter.as_ref(), &self.signal_registry());
        adapter
            .core()
            .set_default_wait_handle_timeout(self.core.wait_handle_timeout());
        if adapter.data_source().is_none() {
            if let Some(data_source) = self.core.data_source() {
                adapter.set_data_source(Some(data_source));
            }
        }

        let subscription = adapter.subscribe(self.forwarder(&adapter));
        self.members.write().push(Member {
            adapter: adapter.clone(),
            subscription,
        });
        self.invalidate_key_filter();
        debug!(collection = %self.core.name(), adapter = %adapter.name(), "adapter added");

        if self.auto_initialize() {
            self.spawn_initialize(adapter);
        }
    }

    /// Stop, unsubscribe and dispose the named member.
    pub fn remove_by_name(&self, name: &str) -> bool {
        let removed = {
            let mut members = self.members.write();
            members
                .iter()
                .position(|member| member.adapter.name().eq_ignore_ascii_case(name))
                .map(|index| members.remove(index))
        };
        match removed {
            Some(member) => {
                self.release(member);
                true
            }
            None => false,
        }
    }

    /// Stop, unsubscribe and dispose every member.
    pub fn clear(&self) {
        let members = std::mem::take(&mut *self.members.write());
        for member in members {
            self.release(member);
        }
    }

    /// Hand a batch to every enabled member, filtered by each member's input
    /// keys when the measurement filter is on.
    pub fn queue_measurements_for_processing(&self, measurements: &[Measurement]) {
        if measurements.is_empty() {
            return;
        }
        let filter = self.process_measurement_filter();
        for member in self.members() {
            if !member.is_enabled() {
                continue;
            }
            if filter {
                let accepted: Vec<Measurement> = measurements
                    .iter()
                    .filter(|measurement| member.is_input_measurement(&measurement.key))
                    .cloned()
                    .collect();
                if !accepted.is_empty() {
                    queue_for_processing(member.as_ref(), &accepted);
                }
            } else {
                queue_for_processing(member.as_ref(), measurements);
            }
        }
        self.core
            .increment_processed_measurements(measurements.len() as u64);
    }

    /// Apply a temporal window to the collection and every member.
    pub fn set_temporal_constraint(
        &self,
        start: Option<&str>,
        stop: Option<&str>,
        parameters: Option<&str>,
    ) -> Result<()> {
        self.core.set_temporal_constraint(start, stop, parameters)?;
        for member in self.members() {
            match member.as_collection() {
                Some(collection) => collection.set_temporal_constraint(start, stop, parameters)?,
                None => member.core().set_temporal_constraint(start, stop, parameters)?,
            }
        }
        Ok(())
    }

    /// Restart the statistics window.
    pub fn reset_statistics(&self) {
        *self.statistics.lock() = Statistics::new(self.member_processed_total());
        self.core
            .status_message(MessageLevel::Info, "Statistics reset for this collection.");
    }

    fn member_processed_total(&self) -> u64 {
        self.members()
            .iter()
            .map(|member| member.processed_measurements())
            .sum()
    }

    fn forwarder(&self, adapter: &Arc<dyn Adapter>) -> crate::notify::Handler {
        let parent = self.self_ref.clone();
        let member: Weak<dyn Adapter> = Arc::downgrade(adapter);
        Arc::new(move |notification: &Notification| -> anyhow::Result<()> {
            let Some(parent) = parent.upgrade() else {
                return Ok(());
            };
            if matches!(notification.event, AdapterEvent::InputMeasurementKeysUpdated) {
                parent.invalidate_key_filter();
            }
            let source = match &notification.source {
                Some(source) => Some(source.clone()),
                None => member.upgrade().map(EventSource::Adapter),
            };
            parent.core.notifier().publish(Notification {
                source,
                event: notification.event.clone(),
            });
            Ok(())
        })
    }

    fn spawn_initialize(&self, adapter: Arc<dyn Adapter>) {
        let Some(collection) = self.self_ref.upgrade() else {
            self.initialize_member(&adapter);
            return;
        };
        let name = adapter.name();
        let spawned = thread::Builder::new()
            .name(format!("tsf-init-{}", name))
            .spawn(move || collection.initialize_member(&adapter));
        if let Err(err) = spawned {
            self.core.process_exception(AdapterError::custom(format!(
                "Failed to queue initialize operation for adapter {}: {}",
                name, err
            )));
        }
    }

    fn initialize_member(&self, member: &Arc<dyn Adapter>) {
        let name = member.name();
        let timeout = member.initialization_timeout();
        let finished = Arc::new(ManualResetEvent::new(false));
        let watchdog = (!timeout.is_zero())
            .then(|| self.spawn_watchdog(name.clone(), timeout, finished.clone()))
            .flatten();

        let result = member.initialize();
        finished.set();
        if let Some(watchdog) = watchdog {
            let _ = watchdog.join();
        }

        match result {
            Ok(()) => {
                member.set_initialized(true);
                if self.start_members_on_initialize() && member.auto_start() && !member.is_enabled() {
                    if let Err(err) = member.start() {
                        self.core
                            .process_exception(AdapterError::lifecycle("start", &name, err));
                    }
                }
                // Routing may have skipped this member while it was initialising.
                self.invalidate_key_filter();
                self.core.publish(AdapterEvent::InputMeasurementKeysUpdated);
            }
            Err(err) => {
                self.core
                    .process_exception(AdapterError::lifecycle("initialize", &name, err));
            }
        }
    }

    fn spawn_watchdog(
        &self,
        name: String,
        timeout: Duration,
        finished: Arc<ManualResetEvent>,
    ) -> Option<JoinHandle<()>> {
        let parent = self.self_ref.clone();
        thread::Builder::new()
            .name(format!("tsf-watchdog-{}", name))
            .spawn(move || {
                while !finished.wait(timeout) {
                    let Some(parent) = parent.upgrade() else {
                        break;
                    };
                    parent.core.status_message(
                        MessageLevel::Warning,
                        format!(
                            "Initialization of adapter {} has exceeded its timeout of {} seconds. \
                             The adapter may still initialize, however this may indicate a problem \
                             with the adapter. If you consider this to be normal, try adjusting the \
                             initialization timeout to suppress this message during normal operations.",
                            name,
                            timeout.as_secs_f64()
                        ),
                    );
                }
            })
            .ok()
    }

    fn invalidate_key_filter(&self) {
        self.key_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Run `f` against the cached key union, rebuilding it when membership or
    /// a member filter changed since it was built.
    fn with_key_filter<R>(&self, f: impl FnOnce(&KeyFilter) -> R) -> R {
        let generation = self.key_generation.load(Ordering::Acquire);
        if let Some(filter) = self.key_filter.read().as_ref() {
            if filter.generation == generation {
                return f(filter);
            }
        }

        let mut union = IndexSet::new();
        let mut accepts_all = false;
        for member in self.members() {
            match member.input_measurement_keys() {
                Some(member_keys) if !member_keys.is_empty() => union.extend(member_keys),
                _ => {
                    accepts_all = true;
                    break;
                }
            }
        }
        let keys: Option<Vec<MeasurementKey>> = (!accepts_all).then(|| union.into_iter().collect());
        let mut sorted = keys.clone().unwrap_or_default();
        sorted.sort();
        let filter = KeyFilter {
            generation,
            keys,
            sorted,
        };
        let result = f(&filter);
        *self.key_filter.write() = Some(filter);
        result
    }

    fn release(&self, member: Member) {
        self.invalidate_key_filter();
        let name = member.adapter.name();
        if let Err(err) = member.adapter.stop() {
            self.core
                .process_exception(AdapterError::lifecycle("stop", &name, err));
        }
        member.adapter.dispose();
        member.adapter.unsubscribe(member.subscription);
        debug!(collection = %self.core.name(), adapter = %name, "adapter removed");
    }

    fn load_members(&self, data_source: &DataSet, data_member: &str, factory: &AdapterFactory) -> Result<()> {
        let table = data_source
            .table(data_member)
            .ok_or_else(|| AdapterError::TableNotFound(data_member.to_owned()))?;
        self.clear();
        for row in table.rows() {
            let Some(definition) = AdapterDefinition::from_row(&row) else {
                self.core.process_exception(AdapterError::Configuration(format!(
                    "Row in \"{}\" is missing one of AdapterName, TypeName or ID",
                    data_member
                )));
                continue;
            };
            match factory.create(&definition) {
                Ok(adapter) => self.add(adapter),
                Err(err) => self.core.process_exception(err),
            }
        }
        info!(collection = %self.core.name(), members = self.len(), "loaded adapters from {}", data_member);
        Ok(())
    }

    fn start_monitor(&self) {
        let mut slot = self.monitor.lock();
        if slot.is_some() {
            return;
        }
        let (health, statistics) = *self.intervals.read();
        let stop = Arc::new(ManualResetEvent::new(false));
        let parent = self.self_ref.clone();
        let signal = stop.clone();
        let spawned = thread::Builder::new()
            .name(format!("tsf-monitor-{}", self.core.name()))
            .spawn(move || {
                let mut last_statistics = Instant::now();
                while !signal.wait(health) {
                    let Some(collection) = parent.upgrade() else {
                        break;
                    };
                    collection.poll_health();
                    if last_statistics.elapsed() >= statistics {
                        collection.report_statistics();
                        last_statistics = Instant::now();
                    }
                }
            });
        match spawned {
            Ok(handle) => *slot = Some(Monitor { stop, handle }),
            Err(err) => self.core.process_exception(AdapterError::custom(format!(
                "Failed to start monitor for {}: {}",
                self.core.name(),
                err
            ))),
        }
    }

    fn stop_monitor(&self) {
        let Some(monitor) = self.monitor.lock().take() else {
            return;
        };
        monitor.stop.set();
        if monitor.handle.thread().id() != thread::current().id() {
            let _ = monitor.handle.join();
        }
    }

    /// Ask every enabled member to report its backlog.
    pub fn poll_health(&self) {
        for member in self.members() {
            if !member.is_enabled() {
                continue;
            }
            if let Some(output) = member.as_output() {
                member
                    .core()
                    .publish(AdapterEvent::UnprocessedMeasurements(output.unprocessed_measurements()));
            } else if let Some(samples) = member.as_action().and_then(|action| action.unpublished_samples()) {
                member
                    .core()
                    .publish(AdapterEvent::UnpublishedSamples(samples));
            }
        }
    }

    fn report_statistics(&self) {
        let total = self.member_processed_total();
        let report = {
            let mut statistics = self.statistics.lock();
            let now = Instant::now();
            let runtime = now.duration_since(statistics.runtime_start).as_secs_f64();
            let window = now.duration_since(statistics.last_report).as_secs_f64();
            let recent = total.saturating_sub(statistics.last_total);
            statistics.last_report = now;
            statistics.last_total = total;

            let rate = |count: u64, seconds: f64| {
                if seconds > 0.0 {
                    format_count((count as f64 / seconds).round() as u64)
                } else {
                    "0".to_owned()
                }
            };
            let mut report = String::new();
            let _ = writeln!(report, "Process statistics for {:.0} seconds total runtime:", runtime);
            let _ = writeln!(report, "{:<14} {:^17} {:^10}", "Time span", "Measurements", "Per second");
            let _ = writeln!(report, "{} {} {}", "-".repeat(14), "-".repeat(17), "-".repeat(10));
            let _ = writeln!(
                report,
                "{:<14} {:^17} {:^10}",
                "Entire runtime",
                format_count(total),
                rate(total, runtime)
            );
            let _ = write!(
                report,
                "{:<14} {:^17} {:^10}",
                "Last interval",
                format_count(recent),
                rate(recent, window)
            );
            report
        };
        self.core.status_message(MessageLevel::Info, report);
    }
}

fn attach_registry(adapter: &dyn Adapter, registry: &Arc<SignalRegistry>) {
    match adapter.as_collection() {
        Some(collection) => collection.set_signal_registry(registry.clone()),
        None => adapter.core().attach_signal_registry(registry.clone()),
    }
}

impl Adapter for AdapterCollection {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn supports_temporal_processing(&self) -> bool {
        false
    }

    /// Load members from the data source when a data member and factory are
    /// configured, then initialise any members not yet initialised when
    /// auto-initialisation is off.
    fn initialize(&self) -> Result<()> {
        self.core.set_initialized(false);
        let settings = self.core.settings();
        if let Some(ms) = settings.parse_value::<u64>("initializationTimeout")? {
            self.core
                .set_initialization_timeout(Duration::from_millis(ms));
        }

        let data_source = self.core.data_source();
        let data_member = self.data_member();
        let factory = self.factory.read().clone();
        if let (Some(data_source), Some(data_member), Some(factory)) = (data_source, data_member, factory) {
            self.load_members(&data_source, &data_member, &factory)?;
        }

        if !self.auto_initialize() {
            for member in self.members() {
                if !member.is_initialized() {
                    self.initialize_member(&member);
                }
            }
        }
        self.core.set_initialized(true);
        Ok(())
    }

    /// Start every initialised auto-start member in order, then the monitor.
    fn start(&self) -> Result<()> {
        if self.core.is_enabled() {
            return Ok(());
        }
        self.core.mark_started();
        self.reset_statistics();
        for member in self.members() {
            if member.is_initialized() && member.auto_start() && !member.is_enabled() {
                if let Err(err) = member.start() {
                    self.core
                        .process_exception(AdapterError::lifecycle("start", &member.name(), err));
                }
            }
        }
        self.start_monitor();
        Ok(())
    }

    /// Stop every running member in order, then the monitor.
    fn stop(&self) -> Result<()> {
        let was_enabled = self.core.is_enabled();
        self.core.mark_stopped();
        if was_enabled {
            for member in self.members() {
                if member.is_initialized() && member.is_enabled() {
                    if let Err(err) = member.stop() {
                        self.core
                            .process_exception(AdapterError::lifecycle("stop", &member.name(), err));
                    }
                }
            }
        }
        self.stop_monitor();
        Ok(())
    }

    /// Distinct union of member keys; `None` when any member accepts everything.
    fn input_measurement_keys(&self) -> Option<Vec<MeasurementKey>> {
        self.with_key_filter(|filter| filter.keys.clone())
    }

    /// Distinct union of member outputs; `None` when no member defines any.
    fn output_measurements(&self) -> Option<Vec<Measurement>> {
        let mut seen = IndexSet::new();
        let mut outputs = Vec::new();
        let mut any = false;
        for member in self.members() {
            if let Some(member_outputs) = member.output_measurements() {
                any = true;
                for output in member_outputs {
                    if seen.insert(output.key.clone()) {
                        outputs.push(output);
                    }
                }
            }
        }
        any.then_some(outputs)
    }

    fn is_input_measurement(&self, key: &MeasurementKey) -> bool {
        self.with_key_filter(|filter| filter.accepts(key))
    }

    fn processed_measurements(&self) -> u64 {
        self.member_processed_total()
    }

    /// Replace the data source here and in every member.
    fn set_data_source(&self, data_source: Option<Arc<DataSet>>) {
        self.core.set_data_source(data_source.clone());
        for member in self.members() {
            member.set_data_source(data_source.clone());
        }
    }

    fn status(&self) -> String {
        let mut status = self
            .core
            .status_report(self.type_name(), self.supports_temporal_processing());
        let members = self.members();
        let _ = writeln!(status, "{:>27}: {}", "Total components", format_count(members.len() as u64));
        for (index, member) in members.iter().enumerate() {
            let _ = writeln!(status, "{:>5}: {}", index + 1, member.short_status(64));
        }
        status
    }

    fn short_status(&self, max_length: usize) -> String {
        format!("Total components: {}", format_count(self.len() as u64))
            .chars()
            .take(max_length)
            .collect()
    }

    /// Stop the monitor, dispose members depth-first, then announce `Disposed`.
    fn dispose(&self) {
        if !self.core.begin_dispose() {
            return;
        }
        self.stop_monitor();
        self.clear();
        self.core.finish_dispose();
    }

    fn as_collection(&self) -> Option<&AdapterCollection> {
        Some(self)
    }
}

impl fmt::Debug for AdapterCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterCollection")
            .field("name", &self.core.name())
            .field("role", &self.role)
            .field("members", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{MeasurementQueue, OutputAdapter};
    use chrono::Utc;

    struct Sink {
        core: AdapterCore,
        queue: MeasurementQueue,
    }

    impl Sink {
        fn new(name: &str, connection_string: &str) -> Arc<Self> {
            Arc::new(Self {
                core: AdapterCore::new(name).with_connection_string(connection_string),
                queue: MeasurementQueue::new(),
            })
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
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn measurement(point_id: u32) -> Measurement {
        Measurement::new(MeasurementKey::new("PPA", point_id), 1.0, Utc::now())
    }

    #[test]
    fn added_members_initialize_and_start() {
        let collection = AdapterCollection::new("outputs", AdapterRole::Output);
        let sink = Sink::new("sink", "inputMeasurementKeys=PPA:1");
        collection.add(sink.clone());
        assert!(wait_until(|| sink.is_initialized() && sink.is_enabled()));
        assert!(collection.all_members_initialized());
        collection.dispose();
    }

    #[test]
    fn filtered_dispatch_respects_member_keys() {
        let collection = AdapterCollection::new("outputs", AdapterRole::Output);
        collection.set_process_measurement_filter(true);
        let first = Sink::new("first", "inputMeasurementKeys=PPA:1");
        let open = Sink::new("open", "");
        collection.add(first.clone());
        collection.add(open.clone());
        assert!(wait_until(|| first.is_enabled() && open.is_enabled()));

        collection.queue_measurements_for_processing(&[measurement(1), measurement(2)]);
        assert_eq!(first.unprocessed_measurements(), 1);
        assert_eq!(open.unprocessed_measurements(), 2);
        assert!(collection.input_measurement_keys().is_none());
        collection.dispose();
    }

    #[test]
    fn lookups_ignore_case() {
        let collection = AdapterCollection::new("outputs", AdapterRole::Output);
        collection.set_auto_initialize(false);
        let sink = Sink::new("Archive", "");
        sink.core().set_id(12);
        collection.add(sink);
        assert!(collection.try_get_by_name("archive").is_some());
        assert!(collection.try_get_by_id(12).is_some());
        assert!(collection.try_get_by_id(13).is_none());
        assert!(collection.remove_by_name("ARCHIVE"));
        assert!(collection.is_empty());
    }

    #[test]
    fn health_poll_forwards_queue_depth_with_member_source() {
        let collection = AdapterCollection::new("outputs", AdapterRole::Output);
        collection.set_auto_initialize(false);
        let sink = Sink::new("sink", "");
        collection.add(sink.clone());
        collection.initialize().unwrap();
        collection.start().unwrap();
        sink.queue_measurements_for_processing(&[measurement(1), measurement(2)]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            collection.core().notifier().subscribe(move |notification| {
                if let AdapterEvent::UnprocessedMeasurements(count) = notification.event {
                    let source = notification
                        .source
                        .as_ref()
                        .and_then(|source| source.as_adapter())
                        .map(|adapter| adapter.name());
                    seen.lock().push((source, count));
                }
                Ok(())
            });
        }
        collection.poll_health();
        assert_eq!(seen.lock().as_slice(), [(Some("sink".to_owned()), 2)]);
        collection.dispose();
    }
}
