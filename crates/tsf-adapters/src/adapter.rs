//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! The adapter contract and the state every adapter shares.
//!
//! Implementations embed an [`AdapterCore`] and expose it through
//! [`Adapter::core`]; the trait's default methods drive the lifecycle on top
//! of it. Implementations customise behaviour through the `on_*` hooks rather
//! than by overriding `start`/`stop`, which keeps the state machine intact.
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::collection::AdapterCollection;
use crate::dataset::DataSet;
use crate::definitions::{parse_input_measurement_keys, parse_output_measurements};
use crate::error::{AdapterError, Result};
use crate::measurement::{Measurement, MeasurementKey};
use crate::notify::{
    format_count, AdapterEvent, Handler, MessageLevel, Notification, Notifier, SubscriptionId,
};
use crate::roles::{ActionAdapter, InputAdapter, OutputAdapter};
use crate::settings::Settings;
use crate::signal::{wait_all, AutoResetEvent, ManualResetEvent, SignalRegistry};
use crate::time_tag::TemporalConstraint;

/// Default wait for `initialized` before `start` gives up.
pub const DEFAULT_INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(15);
/// Default processed-measurement reporting interval.
pub const DEFAULT_MEASUREMENT_REPORTING_INTERVAL: i64 = 100_000;
/// Default timeout for external wait handles.
pub const DEFAULT_WAIT_HANDLE_TIMEOUT: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
struct Identity {
    name: String,
    id: u32,
    hash: u64,
}

impl Identity {
    fn new(name: String, id: u32) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        id.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            name,
            id,
        }
    }
}

#[derive(Debug, Default)]
struct Connection {
    text: String,
    settings: Settings,
}

#[derive(Debug, Default)]
struct InputFilter {
    keys: Option<Vec<MeasurementKey>>,
    sorted: Vec<MeasurementKey>,
}

#[derive(Debug, Default)]
struct RunTimes {
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ExternalEvents {
    names: Vec<String>,
    handles: Vec<Arc<AutoResetEvent>>,
    timeout: Option<Duration>,
    fallback_timeout: Option<Duration>,
}

/// State shared by every adapter: identity, settings, filters, lifecycle flags,
/// counters and the observer list.
///
/// All accessors take `&self`; the core is meant to live inside an `Arc`d
/// adapter that is driven from several threads.
pub struct AdapterCore {
    identity: RwLock<Identity>,
    connection: RwLock<Connection>,
    data_source: RwLock<Option<Arc<DataSet>>>,
    input: RwLock<InputFilter>,
    outputs: RwLock<Option<Vec<Measurement>>>,
    initialized: AtomicBool,
    initialized_signal: ManualResetEvent,
    enabled: AtomicBool,
    auto_start: AtomicBool,
    initialization_timeout_ms: AtomicU64,
    reporting_interval: AtomicI64,
    processing_interval: AtomicI64,
    processed: AtomicU64,
    times: Mutex<RunTimes>,
    temporal: RwLock<TemporalConstraint>,
    external: RwLock<ExternalEvents>,
    signals: RwLock<Option<Arc<SignalRegistry>>>,
    notifier: Notifier,
    disposed: AtomicBool,
    lag_warnings: AtomicU32,
}

impl AdapterCore {
    /// Fresh, uninitialised state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: RwLock::new(Identity::new(name.into(), 0)),
            connection: RwLock::new(Connection::default()),
            data_source: RwLock::new(None),
            input: RwLock::new(InputFilter::default()),
            outputs: RwLock::new(None),
            initialized: AtomicBool::new(false),
            initialized_signal: ManualResetEvent::new(false),
            enabled: AtomicBool::new(false),
            auto_start: AtomicBool::new(true),
            initialization_timeout_ms: AtomicU64::new(
                DEFAULT_INITIALIZATION_TIMEOUT.as_millis() as u64,
            ),
            reporting_interval: AtomicI64::new(DEFAULT_MEASUREMENT_REPORTING_INTERVAL),
            processing_interval: AtomicI64::new(-1),
            processed: AtomicU64::new(0),
            times: Mutex::new(RunTimes::default()),
            temporal: RwLock::new(TemporalConstraint::default()),
            external: RwLock::new(ExternalEvents::default()),
            signals: RwLock::new(None),
            notifier: Notifier::new(),
            disposed: AtomicBool::new(false),
            lag_warnings: AtomicU32::new(0),
        }
    }

    /// Builder-style ID assignment.
    pub fn with_id(self, id: u32) -> Self {
        self.set_id(id);
        self
    }

    /// Builder-style connection string assignment.
    pub fn with_connection_string(self, connection_string: impl Into<String>) -> Self {
        self.set_connection_string(connection_string);
        self
    }

    pub fn name(&self) -> String {
        self.identity.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let mut identity = self.identity.write();
        *identity = Identity::new(name.into(), identity.id);
    }

    pub fn id(&self) -> u32 {
        self.identity.read().id
    }

    pub fn set_id(&self, id: u32) {
        let mut identity = self.identity.write();
        *identity = Identity::new(std::mem::take(&mut identity.name), id);
    }

    /// Hash of `(name, id)`, recomputed whenever either changes.
    pub fn identity_hash(&self) -> u64 {
        self.identity.read().hash
    }

    pub fn connection_string(&self) -> String {
        self.connection.read().text.clone()
    }

    /// Replace the connection string and re-parse its settings.
    pub fn set_connection_string(&self, connection_string: impl Into<String>) {
        let text = connection_string.into();
        let settings = Settings::parse(&text);
        *self.connection.write() = Connection { text, settings };
    }

    /// Snapshot of the parsed settings.
    pub fn settings(&self) -> Settings {
        self.connection.read().settings.clone()
    }

    pub fn data_source(&self) -> Option<Arc<DataSet>> {
        self.data_source.read().clone()
    }

    pub fn set_data_source(&self, data_source: Option<Arc<DataSet>>) {
        *self.data_source.write() = data_source;
    }

    pub fn input_measurement_keys(&self) -> Option<Vec<MeasurementKey>> {
        self.input.read().keys.clone()
    }

    /// Replace the input filter and announce the change.
    pub fn set_input_measurement_keys(&self, keys: Option<Vec<MeasurementKey>>) {
        let mut sorted = keys.clone().unwrap_or_default();
        sorted.sort();
        sorted.dedup();
        *self.input.write() = InputFilter { keys, sorted };
        self.publish(AdapterEvent::InputMeasurementKeysUpdated);
    }

    /// Fail-open membership test against the sorted filter.
    pub fn is_input_measurement(&self, key: &MeasurementKey) -> bool {
        let input = self.input.read();
        if input.sorted.is_empty() {
            return true;
        }
        input.sorted.binary_search(key).is_ok()
    }

    pub fn output_measurements(&self) -> Option<Vec<Measurement>> {
        self.outputs.read().clone()
    }

    /// Replace the output definitions and announce the change.
    pub fn set_output_measurements(&self, outputs: Option<Vec<Measurement>>) {
        *self.outputs.write() = outputs;
        self.publish(AdapterEvent::OutputMeasurementsUpdated);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Flip `initialized`, setting or resetting the readiness signal with it.
    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
        if initialized {
            self.initialized_signal.set();
        } else {
            self.initialized_signal.reset();
        }
    }

    /// Block until initialised; `false` on timeout.
    pub fn wait_for_initialize(&self, timeout: Duration) -> bool {
        self.initialized_signal.wait(timeout)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start.load(Ordering::SeqCst)
    }

    pub fn set_auto_start(&self, auto_start: bool) {
        self.auto_start.store(auto_start, Ordering::SeqCst);
    }

    pub fn initialization_timeout(&self) -> Duration {
        Duration::from_millis(self.initialization_timeout_ms.load(Ordering::SeqCst))
    }

    pub fn set_initialization_timeout(&self, timeout: Duration) {
        self.initialization_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn measurement_reporting_interval(&self) -> i64 {
        self.reporting_interval.load(Ordering::SeqCst)
    }

    pub fn set_measurement_reporting_interval(&self, interval: i64) {
        self.reporting_interval.store(interval, Ordering::SeqCst);
    }

    pub fn processing_interval(&self) -> i64 {
        self.processing_interval.load(Ordering::SeqCst)
    }

    /// Values below -1 clamp to -1 (process as fast as possible).
    pub fn set_processing_interval(&self, interval: i64) {
        self.processing_interval
            .store(interval.max(-1), Ordering::SeqCst);
    }

    pub fn processed_measurements(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Count processed measurements, reporting once per crossed interval.
    pub fn increment_processed_measurements(&self, count: u64) {
        let before = self.processed.fetch_add(count, Ordering::SeqCst);
        let total = before + count;
        let interval = self.measurement_reporting_interval();
        if interval <= 0 {
            return;
        }
        let interval = interval as u64;
        if total >= (before / interval + 1) * interval {
            self.status_message(
                MessageLevel::Info,
                format!(
                    "{} measurements have been processed so far...",
                    format_count(total)
                ),
            );
        }
    }

    /// Zero the processed counter.
    pub fn reset_processed_measurements(&self) {
        self.processed.store(0, Ordering::SeqCst);
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.times.lock().start
    }

    pub fn stop_time(&self) -> Option<DateTime<Utc>> {
        self.times.lock().stop
    }

    /// Time spent running: start to stop, or start to now while enabled.
    pub fn run_time(&self) -> chrono::Duration {
        let times = self.times.lock();
        match times.start {
            Some(start) => times.stop.unwrap_or_else(Utc::now) - start,
            None => chrono::Duration::zero(),
        }
    }

    pub fn temporal_constraint(&self) -> TemporalConstraint {
        self.temporal.read().clone()
    }

    /// Replace the temporal window from time tags; blank tags leave a bound open.
    pub fn set_temporal_constraint(
        &self,
        start: Option<&str>,
        stop: Option<&str>,
        parameters: Option<&str>,
    ) -> Result<()> {
        let constraint = TemporalConstraint::from_tags(start, stop, parameters, Utc::now())?;
        *self.temporal.write() = constraint;
        Ok(())
    }

    pub fn wait_handle_names(&self) -> Vec<String> {
        self.external.read().names.clone()
    }

    /// The adapter's own wait-handle timeout, else the collection default.
    pub fn wait_handle_timeout(&self) -> Duration {
        let external = self.external.read();
        external
            .timeout
            .or(external.fallback_timeout)
            .unwrap_or(DEFAULT_WAIT_HANDLE_TIMEOUT)
    }

    /// Timeout used when the adapter does not configure its own.
    pub fn set_default_wait_handle_timeout(&self, timeout: Duration) {
        self.external.write().fallback_timeout = Some(timeout);
    }

    /// Attach the shared signal registry and resolve configured handle names.
    pub fn attach_signal_registry(&self, registry: Arc<SignalRegistry>) {
        let mut external = self.external.write();
        external.handles = external
            .names
            .iter()
            .map(|name| registry.get_or_create(name))
            .collect();
        *self.signals.write() = Some(registry);
    }

    pub fn signal_registry(&self) -> Option<Arc<SignalRegistry>> {
        self.signals.read().clone()
    }

    /// Wait for every configured external handle. `Duration::ZERO` uses the
    /// configured timeout. With no handles configured this returns at once.
    pub fn wait_for_external_events(&self, timeout: Duration) -> bool {
        let (handles, configured) = {
            let external = self.external.read();
            (external.handles.clone(), external.timeout.or(external.fallback_timeout))
        };
        if handles.is_empty() {
            return true;
        }
        let timeout = if timeout.is_zero() {
            configured.unwrap_or(DEFAULT_WAIT_HANDLE_TIMEOUT)
        } else {
            timeout
        };
        wait_all(&handles, timeout)
    }

    /// Number of lag warnings raised by an action adapter; reset on start.
    pub fn lag_warnings(&self) -> u32 {
        self.lag_warnings.load(Ordering::Relaxed)
    }

    /// Record one more lag warning.
    pub fn record_lag_warning(&self) {
        self.lag_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Publish an event raised by this adapter.
    pub fn publish(&self, event: AdapterEvent) {
        self.notifier.publish(Notification::local(event));
    }

    /// Log and publish a status message with the level's text prefix.
    pub fn status_message(&self, level: MessageLevel, message: impl Into<String>) {
        let message = message.into();
        let name = self.name();
        match level {
            MessageLevel::Debug => debug!(adapter = %name, "{}", message),
            MessageLevel::Info => info!(adapter = %name, "{}", message),
            MessageLevel::Warning => warn!(adapter = %name, "{}", message),
            MessageLevel::Alarm | MessageLevel::Error | MessageLevel::Critical => {
                error!(adapter = %name, level = %level, "{}", message)
            }
        }
        self.publish(AdapterEvent::StatusMessage {
            level,
            message: format!("{}{}", level.prefix(), message),
        });
    }

    /// Log and publish a handled failure.
    pub fn process_exception(&self, err: AdapterError) {
        error!(adapter = %self.name(), error = %err, "adapter exception");
        self.publish(AdapterEvent::ProcessException(Arc::new(err)));
    }

    /// Count and publish a batch of produced measurements.
    pub fn publish_new_measurements(&self, measurements: Vec<Measurement>) {
        if measurements.is_empty() {
            return;
        }
        let count = measurements.len() as u64;
        self.publish(AdapterEvent::NewMeasurements(measurements.into()));
        self.increment_processed_measurements(count);
    }

    /// Announce that an input adapter has no more data.
    pub fn processing_complete(&self) {
        self.publish(AdapterEvent::ProcessingComplete);
    }

    /// Re-derive configuration from the connection string.
    ///
    /// Each field is parsed before it is stored, so a malformed setting fails
    /// the call without touching that field.
    pub fn initialize_settings(&self) -> Result<()> {
        self.set_initialized(false);
        let settings = self.settings();
        let data_source = self.data_source();
        let data_source = data_source.as_deref();

        let keys = match settings.get("inputMeasurementKeys") {
            Some(value) => parse_input_measurement_keys(data_source, value)?,
            None => Vec::new(),
        };
        self.set_input_measurement_keys(Some(keys));

        let outputs = match settings.get("outputMeasurements") {
            Some(value) => Some(parse_output_measurements(data_source, value)?),
            None => None,
        };
        self.set_output_measurements(outputs);

        let interval = settings
            .parse_value::<i64>("measurementReportingInterval")?
            .unwrap_or(DEFAULT_MEASUREMENT_REPORTING_INTERVAL);
        self.set_measurement_reporting_interval(interval);

        let connect_on_demand = settings.parse_bool("connectOnDemand")?.unwrap_or(false);
        self.set_auto_start(!connect_on_demand);

        let start = settings.get("startTimeConstraint");
        let stop = settings.get("stopTimeConstraint");
        if start.is_some() || stop.is_some() {
            self.set_temporal_constraint(start, stop, settings.get("timeConstraintParameters"))?;
        }

        if let Some(interval) = settings
            .get("processingInterval")
            .and_then(|value| value.trim().parse::<i64>().ok())
        {
            self.set_processing_interval(interval);
        }

        let names: Vec<String> = settings
            .get("waitHandleNames")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let timeout = settings
            .parse_value::<u64>("waitHandleTimeout")?
            .map(Duration::from_millis);
        let registry = self.signal_registry();
        let mut external = self.external.write();
        external.handles = match registry {
            Some(registry) => names.iter().map(|name| registry.get_or_create(name)).collect(),
            None => Vec::new(),
        };
        external.names = names;
        external.timeout = timeout;
        Ok(())
    }

    /// Wait for initialisation and mark the adapter running. A timeout is
    /// reported as a process exception and leaves the adapter stopped.
    pub fn begin_start(&self) -> bool {
        if !self.wait_for_initialize(self.initialization_timeout()) {
            self.process_exception(AdapterError::InitializationTimeout);
            return false;
        }
        self.enabled.store(true, Ordering::SeqCst);
        self.lag_warnings.store(0, Ordering::Relaxed);
        let mut times = self.times.lock();
        times.stop = None;
        times.start = Some(Utc::now());
        true
    }

    /// Mark the adapter stopped; safe to call repeatedly.
    pub fn mark_stopped(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.times.lock().stop = Some(Utc::now());
    }

    /// Mark the adapter running without waiting on initialisation.
    pub(crate) fn mark_started(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        let mut times = self.times.lock();
        times.stop = None;
        times.start = Some(Utc::now());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Claim disposal; only the first caller gets `true`.
    pub fn begin_dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    /// Release the readiness signal and announce disposal.
    pub fn finish_dispose(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.initialized_signal.close();
        self.publish(AdapterEvent::Disposed);
    }

    /// Multi-line status report.
    pub fn status_report(&self, type_name: &str, supports_temporal: bool) -> String {
        let mut status = String::new();
        let identity = self.identity.read().clone();
        let constraint = self.temporal_constraint();
        let bound = |value: DateTime<Utc>, open: DateTime<Utc>| {
            if value == open {
                "<none defined>".to_owned()
            } else {
                value.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            }
        };
        let run_time = self.run_time();

        let _ = writeln!(status, "{:>27}: {}", "Adapter name", identity.name);
        let _ = writeln!(status, "{:>27}: {}", "Data source ID", identity.id);
        let _ = writeln!(status, "{:>27}: {}", "Adapter type", type_name);
        let _ = writeln!(status, "{:>27}: {}", "Initialized", self.is_initialized());
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Operational state",
            if self.is_enabled() { "Running" } else { "Stopped" }
        );
        let _ = writeln!(status, "{:>27}: {}", "Connect on demand", !self.auto_start());
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Processed measurements",
            format_count(self.processed_measurements())
        );
        let _ = writeln!(
            status,
            "{:>27}: {:.3} seconds",
            "Total process time",
            run_time.num_milliseconds() as f64 / 1000.0
        );
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Measurement report interval",
            self.measurement_reporting_interval()
        );
        let _ = writeln!(status, "{:>27}: {}", "Temporal support", supports_temporal);
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Start time constraint",
            bound(constraint.start, DateTime::<Utc>::MIN_UTC)
        );
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Stop time constraint",
            bound(constraint.stop, DateTime::<Utc>::MAX_UTC)
        );
        if let Some(parameters) = &constraint.parameters {
            let _ = writeln!(status, "{:>27}: {}", "Temporal parameters", parameters);
        }
        let interval = self.processing_interval();
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Processing interval",
            match interval {
                -1 => "Default".to_owned(),
                0 => "As fast as possible".to_owned(),
                ms => format!("{} milliseconds", ms),
            }
        );
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Input measurements",
            describe_count(self.input_measurement_keys().map(|keys| keys.len()))
        );
        let _ = writeln!(
            status,
            "{:>27}: {}",
            "Output measurements",
            describe_count(self.output_measurements().map(|outputs| outputs.len()))
        );
        let names = self.wait_handle_names();
        if !names.is_empty() {
            let _ = writeln!(
                status,
                "{:>27}: {} ({} ms timeout)",
                "External wait handles",
                names.join(", "),
                self.wait_handle_timeout().as_millis()
            );
        }
        let settings = self.settings();
        if !settings.is_empty() {
            let _ = writeln!(status, "{:>27}:", "Connection string settings");
            for (key, value) in settings.iter() {
                let _ = writeln!(status, "{:>31}{} = {}", "", key, value);
            }
        }
        status
    }
}

impl std::fmt::Debug for AdapterCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterCore")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("initialized", &self.is_initialized())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

fn describe_count(count: Option<usize>) -> String {
    match count {
        None | Some(0) => "<none defined>".to_owned(),
        Some(count) => format_count(count as u64),
    }
}

/// Trailing path segment of a type name, ignoring generic arguments.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A processing unit with a lifecycle and a measurement filter.
///
/// Required methods are [`core`](Adapter::core) and
/// [`supports_temporal_processing`](Adapter::supports_temporal_processing);
/// everything else has a default built on the core.
pub trait Adapter: Send + Sync + 'static {
    /// Shared adapter state.
    fn core(&self) -> &AdapterCore;

    /// Whether the adapter can reprocess historical ranges.
    fn supports_temporal_processing(&self) -> bool;

    /// Runtime type name used in diagnostics and derived names.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Hook run after the connection string has been applied.
    fn on_initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Hook run once the adapter is marked running.
    fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Hook run after the adapter is marked stopped.
    fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Hook run once, before `Disposed` is announced.
    fn on_dispose(&self) {}

    fn name(&self) -> String {
        self.core().name()
    }

    fn id(&self) -> u32 {
        self.core().id()
    }

    /// Apply the connection string, then run [`on_initialize`](Adapter::on_initialize).
    fn initialize(&self) -> Result<()> {
        self.core().initialize_settings()?;
        self.on_initialize()
    }

    fn is_initialized(&self) -> bool {
        self.core().is_initialized()
    }

    fn set_initialized(&self, initialized: bool) {
        self.core().set_initialized(initialized);
    }

    fn wait_for_initialize(&self, timeout: Duration) -> bool {
        self.core().wait_for_initialize(timeout)
    }

    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Start or stop to match `enabled`.
    fn set_enabled(&self, enabled: bool) -> Result<()> {
        match (enabled, self.is_enabled()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => Ok(()),
        }
    }

    fn auto_start(&self) -> bool {
        self.core().auto_start()
    }

    /// Stop if running, wait for initialisation, then mark running.
    ///
    /// An initialisation timeout is reported through a process exception and
    /// returns `Ok`; only a failing [`on_start`](Adapter::on_start) is returned.
    fn start(&self) -> Result<()> {
        if self.is_enabled() {
            self.stop()?;
        }
        if !self.core().begin_start() {
            return Ok(());
        }
        if let Err(err) = self.on_start() {
            self.core().mark_stopped();
            return Err(err);
        }
        Ok(())
    }

    /// Mark stopped, then run [`on_stop`](Adapter::on_stop). Idempotent.
    fn stop(&self) -> Result<()> {
        self.core().mark_stopped();
        self.on_stop()
    }

    fn input_measurement_keys(&self) -> Option<Vec<MeasurementKey>> {
        self.core().input_measurement_keys()
    }

    fn output_measurements(&self) -> Option<Vec<Measurement>> {
        self.core().output_measurements()
    }

    fn is_input_measurement(&self, key: &MeasurementKey) -> bool {
        self.core().is_input_measurement(key)
    }

    fn processed_measurements(&self) -> u64 {
        self.core().processed_measurements()
    }

    fn processing_interval(&self) -> i64 {
        self.core().processing_interval()
    }

    fn initialization_timeout(&self) -> Duration {
        self.core().initialization_timeout()
    }

    fn data_source(&self) -> Option<Arc<DataSet>> {
        self.core().data_source()
    }

    fn set_data_source(&self, data_source: Option<Arc<DataSet>>) {
        self.core().set_data_source(data_source);
    }

    fn status(&self) -> String {
        self.core()
            .status_report(self.type_name(), self.supports_temporal_processing())
    }

    /// One-line status, truncated to `max_length` characters.
    fn short_status(&self, max_length: usize) -> String {
        let state = if self.is_enabled() { "running" } else { "stopped" };
        let line = format!(
            "{} is {}, {} measurements processed",
            self.name(),
            state,
            format_count(self.processed_measurements())
        );
        line.chars().take(max_length).collect()
    }

    fn subscribe(&self, handler: Handler) -> SubscriptionId {
        self.core().notifier().subscribe_handler(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core().notifier().unsubscribe(id)
    }

    /// Release resources and announce `Disposed` once.
    fn dispose(&self) {
        if !self.core().begin_dispose() {
            return;
        }
        self.on_dispose();
        self.core().finish_dispose();
    }

    fn is_disposed(&self) -> bool {
        self.core().is_disposed()
    }

    fn as_input(&self) -> Option<&dyn InputAdapter> {
        None
    }

    fn as_action(&self) -> Option<&dyn ActionAdapter> {
        None
    }

    fn as_output(&self) -> Option<&dyn OutputAdapter> {
        None
    }

    fn as_collection(&self) -> Option<&AdapterCollection> {
        None
    }
}
