//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tsf_adapters::{
    ActionAdapter, Adapter, AdapterCore, AdapterEvent, AdapterFactory, AdapterError, DataSet,
    DataTable, InputAdapter, Measurement, MeasurementKey, MeasurementQueue, MessageLevel,
    OutputAdapter, Result, Value,
};
use tsf_common::SessionConfig;
use tsf_session::{IaonSession, RoutingTables, TEMPORAL_SUPPORT_TABLE};

struct Pmu {
    core: AdapterCore,
}

impl Adapter for Pmu {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn supports_temporal_processing(&self) -> bool {
        false
    }

    fn as_input(&self) -> Option<&dyn InputAdapter> {
        Some(self)
    }
}

impl InputAdapter for Pmu {}

/// Doubles PPA:1 into CALC:1.
struct Calc {
    core: AdapterCore,
    lag_time: Option<f64>,
}

impl Adapter for Calc {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn supports_temporal_processing(&self) -> bool {
        true
    }

    fn as_action(&self) -> Option<&dyn ActionAdapter> {
        Some(self)
    }
}

impl ActionAdapter for Calc {
    fn queue_measurements_for_processing(&self, measurements: &[Measurement]) {
        let derived: Vec<Measurement> = measurements
            .iter()
            .filter(|measurement| measurement.key == MeasurementKey::new("PPA", 1))
            .map(|measurement| {
                Measurement::new(
                    MeasurementKey::new("CALC", 1),
                    measurement.value * 2.0,
                    measurement.timestamp,
                )
            })
            .collect();
        self.core.publish_new_measurements(derived);
    }

    fn lag_time(&self) -> Option<f64> {
        self.lag_time
    }
}

struct Archive {
    core: AdapterCore,
    temporal: bool,
    queue: MeasurementQueue,
}

impl Archive {
    fn new(name: &str, connection_string: &str, temporal: bool) -> Arc<Self> {
        Arc::new(Self {
            core: AdapterCore::new(name).with_connection_string(connection_string),
            temporal,
            queue: MeasurementQueue::new(),
        })
    }
}

impl Adapter for Archive {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn supports_temporal_processing(&self) -> bool {
        self.temporal
    }

    fn as_output(&self) -> Option<&dyn OutputAdapter> {
        Some(self)
    }
}

impl OutputAdapter for Archive {
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

fn config(name: &str) -> SessionConfig {
    SessionConfig {
        name: Some(name.to_owned()),
        measurement_warning_threshold: 10,
        measurement_dumping_threshold: 50,
        initialized_poll_interval: Duration::from_millis(10),
        ..SessionConfig::default()
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

fn record_status(session: &IaonSession) -> Arc<Mutex<Vec<(MessageLevel, String)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    session.subscribe(move |notification| {
        if let AdapterEvent::StatusMessage { level, message } = &notification.event {
            sink.lock().push((*level, message.clone()));
        }
        Ok(())
    });
    seen
}

fn messages_for(seen: &Mutex<Vec<(MessageLevel, String)>>, prefix: &str) -> Vec<(MessageLevel, String)> {
    seen.lock()
        .iter()
        .filter(|(_, message)| message.starts_with(prefix))
        .cloned()
        .collect()
}

fn batch(source: &str, points: &[u32]) -> Vec<Measurement> {
    points
        .iter()
        .map(|point| Measurement::new(MeasurementKey::new(source, *point), 1.0, Utc::now()))
        .collect()
}

#[test]
fn overflowing_output_queue_is_truncated_by_dump_threshold() {
    let session = IaonSession::new(config("test")).unwrap();
    let seen = record_status(&session);
    let archive = Archive::new("archive", "", false);
    session.output_adapters().add(archive.clone());

    archive.queue.push_all(&batch("PPA", &[1; 51]));
    archive
        .core()
        .publish(AdapterEvent::UnprocessedMeasurements(archive.unprocessed_measurements()));

    assert_eq!(archive.queue.len(), 1);
    assert_eq!(
        messages_for(&seen, "[archive#test]"),
        [
            (
                MessageLevel::Alarm,
                "[archive#test] System exercised evasive action to conserve memory and dumped 50 unprocessed measurements from the output queue :(".to_owned()
            ),
            (
                MessageLevel::Warning,
                "[archive#test] NOTICE: Please adjust measurement threshold settings and/or increase amount of available system memory.".to_owned()
            ),
        ]
    );
    session.dispose();
}

#[test]
fn dump_alarm_reports_measurements_actually_removed() {
    let session = IaonSession::new(config("test")).unwrap();
    let seen = record_status(&session);
    let archive = Archive::new("archive", "", false);
    session.output_adapters().add(archive.clone());

    archive.queue.push_all(&batch("PPA", &[1; 20]));
    archive
        .core()
        .publish(AdapterEvent::UnprocessedMeasurements(80));

    assert!(archive.queue.is_empty());
    assert_eq!(
        messages_for(&seen, "[archive#test]").first(),
        Some(&(
            MessageLevel::Alarm,
            "[archive#test] System exercised evasive action to conserve memory and dumped 20 unprocessed measurements from the output queue :(".to_owned()
        ))
    );
    session.dispose();
}

#[test]
fn backlog_warnings_escalate_near_dump_threshold() {
    let session = IaonSession::new(config("test")).unwrap();
    let seen = record_status(&session);
    let archive = Archive::new("archive", "", false);
    session.output_adapters().add(archive.clone());

    for depth in [5usize, 11, 45] {
        archive.queue.clear();
        archive.queue.push_all(&batch("PPA", &vec![1; depth]));
        archive
            .core()
            .publish(AdapterEvent::UnprocessedMeasurements(depth));
    }

    assert_eq!(archive.queue.len(), 45);
    assert_eq!(
        messages_for(&seen, "[archive#test]"),
        [
            (
                MessageLevel::Warning,
                "[archive#test] There are 11 unprocessed measurements in the output queue.".to_owned()
            ),
            (
                MessageLevel::Critical,
                "[archive#test] CRITICAL: There are 45 unprocessed measurements in the output queue.".to_owned()
            ),
        ]
    );
    session.dispose();
}

#[test]
fn lagging_action_adapter_is_reported() {
    let session = IaonSession::new(config("test")).unwrap();
    let seen = record_status(&session);
    let calc = Arc::new(Calc {
        core: AdapterCore::new("calc"),
        lag_time: Some(1.0),
    });
    session.action_adapters().add(calc.clone());
    assert!(wait_until(|| calc.is_initialized()));

    calc.core().publish(AdapterEvent::UnpublishedSamples(2));
    assert!(messages_for(&seen, "[calc#test]").is_empty());

    calc.core().publish(AdapterEvent::UnpublishedSamples(3));
    assert_eq!(
        messages_for(&seen, "[calc#test]"),
        [(
            MessageLevel::Warning,
            "[calc#test] There are 3 seconds of unpublished data in the action adapter concentration queue.".to_owned()
        )]
    );
    assert_eq!(calc.core().lag_warnings(), 1);
    session.dispose();
}

#[test]
fn adapter_failures_are_bubbled_with_derived_names() {
    let session = IaonSession::new(config("test")).unwrap();
    let seen = record_status(&session);
    let exceptions = Arc::new(Mutex::new(0usize));
    let count = exceptions.clone();
    session.subscribe(move |notification| {
        if matches!(notification.event, AdapterEvent::ProcessException(_)) {
            *count.lock() += 1;
        }
        Ok(())
    });
    let archive = Archive::new("archive", "", false);
    session.output_adapters().add(archive.clone());

    archive
        .core()
        .process_exception(AdapterError::custom("disk full"));
    archive
        .core()
        .status_message(MessageLevel::Warning, "slow disk");

    assert_eq!(
        messages_for(&seen, "[archive#test]"),
        [
            (MessageLevel::Alarm, "[archive#test] disk full".to_owned()),
            (MessageLevel::Warning, "[archive#test] WARNING: slow disk".to_owned()),
        ]
    );
    assert_eq!(*exceptions.lock(), 1);
    session.dispose();
}

#[test]
fn routing_waits_for_initialized_collections() {
    let router = Arc::new(RoutingTables::new());
    let session = IaonSession::with_router(config("test"), router.clone(), None).unwrap();
    let archive = Archive::new("archive", "inputMeasurementKeys=PPA:1", false);
    session.output_adapters().add(archive.clone());
    assert!(wait_until(|| archive.is_initialized()));

    session.recalculate_routing_tables();
    assert_eq!(router.calculations(), 0);

    session.initialize(true).unwrap();
    assert!(router.calculations() >= 1);
    assert_eq!(router.consumers_of(&MeasurementKey::new("PPA", 1)), ["archive"]);
    session.dispose();
}

fn adapter_table(name: &str, rows: &[(u32, &str, &str, &str)]) -> DataTable {
    let mut table = DataTable::new(name, ["ID", "AdapterName", "TypeName", "ConnectionString"]);
    for (id, adapter, type_name, connection_string) in rows {
        table
            .push_row([
                Value::from(*id),
                Value::from(*adapter),
                Value::from(*type_name),
                Value::from(*connection_string),
            ])
            .unwrap();
    }
    table
}

fn configuration() -> DataSet {
    let mut data_set = DataSet::new();
    data_set.add_table(adapter_table("InputAdapters", &[(1, "pmu", "Pmu", "")]));
    data_set.add_table(adapter_table(
        "ActionAdapters",
        &[(1, "calc", "Calc", "inputMeasurementKeys=PPA:1")],
    ));
    data_set.add_table(adapter_table(
        "OutputAdapters",
        &[
            (1, "archive", "Archive", "inputMeasurementKeys={PPA:1;CALC:1}"),
            (2, "display", "Display", "inputMeasurementKeys=PPA:2"),
            (3, "mirror", "Archive", ""),
        ],
    ));
    let mut measurements = DataTable::new("ActiveMeasurements", ["ID", "PointTag"]);
    measurements
        .push_row([Value::from("PPA:1"), Value::from("FREQ")])
        .unwrap();
    data_set.add_table(measurements);
    data_set
}

fn factory(archives: Arc<Mutex<Vec<Arc<Archive>>>>, pmus: Arc<Mutex<Vec<Arc<Pmu>>>>) -> AdapterFactory {
    let mut factory = AdapterFactory::new();
    factory.register("Pmu", move |definition| {
        let pmu = Arc::new(Pmu {
            core: AdapterCore::new(definition.name.clone())
                .with_id(definition.id)
                .with_connection_string(definition.connection_string.clone()),
        });
        pmus.lock().push(pmu.clone());
        let adapter: Arc<dyn Adapter> = pmu;
        Ok(adapter)
    });
    factory.register("Calc", |definition| {
        let adapter: Arc<dyn Adapter> = Arc::new(Calc {
            core: AdapterCore::new(definition.name.clone())
                .with_id(definition.id)
                .with_connection_string(definition.connection_string.clone()),
            lag_time: None,
        });
        Ok(adapter)
    });
    for (type_name, temporal) in [("Archive", true), ("Display", false)] {
        let archives = archives.clone();
        factory.register(type_name, move |definition| {
            let archive = Arc::new(Archive {
                core: AdapterCore::new(definition.name.clone())
                    .with_id(definition.id)
                    .with_connection_string(definition.connection_string.clone()),
                temporal,
                queue: MeasurementQueue::new(),
            });
            archives.lock().push(archive.clone());
            let adapter: Arc<dyn Adapter> = archive;
            Ok(adapter)
        });
    }
    factory
}

fn all_members_enabled(session: &IaonSession) -> bool {
    [session.input_adapters(), session.action_adapters(), session.output_adapters()]
        .iter()
        .flat_map(|collection| collection.members())
        .all(|member| member.is_enabled())
}

fn queue_depths(archives: &Mutex<Vec<Arc<Archive>>>) -> Vec<(String, usize)> {
    let mut depths: Vec<(String, usize)> = archives
        .lock()
        .iter()
        .map(|archive| (archive.name(), archive.queue.len()))
        .collect();
    depths.sort();
    depths
}

#[test]
fn configured_session_routes_reprocesses_and_disposes_in_order() -> anyhow::Result<()> {
    let archives = Arc::new(Mutex::new(Vec::new()));
    let pmus = Arc::new(Mutex::new(Vec::new()));
    let router = Arc::new(RoutingTables::new());
    let session = IaonSession::with_router(config("e2e"), router.clone(), None)?;
    session.set_factory(factory(archives.clone(), pmus.clone()));
    session.set_data_source(Some(Arc::new(configuration())));
    let seen = record_status(&session);

    session.initialize(true)?;
    assert!(wait_until(|| {
        session.all_adapters().all_members_initialized()
            && all_members_enabled(&session)
            && router.consumers_of(&MeasurementKey::new("CALC", 1)) == ["archive", "mirror"]
            && router.consumers_of(&MeasurementKey::new("PPA", 1)).len() == 3
    }));
    assert_eq!(session.output_adapters().len(), 3);

    // Temporal support: archive and mirror of the outputs, plus calc.
    session.wait_for_initialized_poll();
    assert!(session.temporal_processing_support_exists(None));
    assert!(!session.temporal_processing_support_exists(Some("InputAdapters")));
    let temporal = session.temporal_configuration()?.expect("data source is set");
    let outputs: Vec<String> = temporal
        .table("OutputAdapters")
        .expect("role table kept")
        .rows()
        .map(|row| row.text("AdapterName").unwrap_or_default().into_owned())
        .collect();
    assert_eq!(outputs, ["archive", "mirror"]);
    assert!(temporal.table("InputAdapters").expect("role table kept").is_empty());
    assert_eq!(temporal.table("ActiveMeasurements").map(DataTable::len), Some(1));
    assert!(temporal.contains_table(TEMPORAL_SUPPORT_TABLE));

    let pmu = pmus.lock()[0].clone();
    pmu.core()
        .publish_new_measurements(batch("PPA", &[1, 2, 3]));
    let expected = vec![
        ("archive".to_owned(), 2),
        ("display".to_owned(), 1),
        ("mirror".to_owned(), 4),
    ];
    assert_eq!(queue_depths(&archives), expected);

    session.set_use_measurement_routing(false);
    for archive in archives.lock().iter() {
        archive.queue.clear();
    }
    pmu.core()
        .publish_new_measurements(batch("PPA", &[1, 2, 3]));
    assert_eq!(queue_depths(&archives), expected);

    pmu.core().processing_complete();
    assert_eq!(
        messages_for(&seen, "[pmu#e2e]"),
        [(MessageLevel::Info, "[pmu#e2e] Processing completed.".to_owned())]
    );

    let disposed = Arc::new(Mutex::new(Vec::new()));
    let sink = disposed.clone();
    let names = Arc::downgrade(&session);
    session.subscribe(move |notification| {
        if let (AdapterEvent::Disposed, Some(source), Some(session)) =
            (&notification.event, &notification.source, names.upgrade())
        {
            sink.lock().push(session.derived_name(source));
        }
        Ok(())
    });
    session.dispose();
    assert_eq!(
        *disposed.lock(),
        [
            "archive#e2e",
            "display#e2e",
            "mirror#e2e",
            "OutputAdapters#e2e",
            "pmu#e2e",
            "InputAdapters#e2e",
            "calc#e2e",
            "ActionAdapters#e2e",
            "AllAdapters#e2e",
            "IaonSession#e2e",
        ]
    );
    Ok(())
}

#[test]
fn missing_configuration_means_no_temporal_support() {
    let session = IaonSession::new(config("bare")).unwrap();
    session.initialize(false).unwrap();
    session.wait_for_initialized_poll();
    assert!(!session.temporal_processing_support_exists(None));
    assert!(session.temporal_configuration().unwrap().is_none());
    session.dispose();
}

#[test]
fn toggling_delivery_mode_mid_flight_delivers_each_batch_once() {
    let session = IaonSession::new(SessionConfig {
        measurement_warning_threshold: 10_000,
        measurement_dumping_threshold: 50_000,
        ..config("toggle")
    })
    .unwrap();
    let pmu = Arc::new(Pmu {
        core: AdapterCore::new("pmu"),
    });
    let archive = Archive::new("archive", "inputMeasurementKeys=PPA:1", false);
    let display = Archive::new("display", "inputMeasurementKeys=PPA:2", false);
    session.input_adapters().add(pmu.clone());
    session.output_adapters().add(archive.clone());
    session.output_adapters().add(display.clone());
    session.initialize(true).unwrap();
    assert!(wait_until(|| all_members_enabled(&session)));
    session.recalculate_routing_tables();

    const BATCHES: usize = 300;
    let toggler = {
        let session = session.clone();
        thread::spawn(move || {
            for round in 0..BATCHES {
                session.set_use_measurement_routing(round % 2 == 1);
            }
            session.set_use_measurement_routing(true);
        })
    };
    for _ in 0..BATCHES {
        pmu.core().publish_new_measurements(batch("PPA", &[1, 2, 3]));
    }
    toggler.join().unwrap();

    assert_eq!(archive.queue.len(), BATCHES);
    assert_eq!(display.queue.len(), BATCHES);
    assert!(session.use_measurement_routing());
    session.dispose();
}
