//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Temporal support discovery and reduced configurations for reprocessing.
use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;
use tsf_adapters::{Adapter, AdapterCollection, AdapterRole, DataSet, DataTable, Value};

/// Table listing the adapters that can reprocess historical ranges.
pub const TEMPORAL_SUPPORT_TABLE: &str = "TemporalSupport";

const ROLE_TABLES: [AdapterRole; 3] = [AdapterRole::Input, AdapterRole::Action, AdapterRole::Output];

static EXTRACTED: Lazy<Mutex<Option<(Arc<DataSet>, Arc<DataSet>)>>> = Lazy::new(|| Mutex::new(None));

/// One `(Source, ID)` row per temporal-capable member of each collection,
/// where `Source` is the collection's data member.
pub fn build_temporal_support_table(
    collections: &[Arc<AdapterCollection>],
) -> tsf_adapters::Result<DataTable> {
    let mut table = DataTable::new(TEMPORAL_SUPPORT_TABLE, ["Source", "ID"]);
    for collection in collections {
        let Some(source) = collection.data_member() else {
            continue;
        };
        for member in collection.members() {
            if member.supports_temporal_processing() {
                table.push_row([Value::from(source.as_str()), Value::from(member.id())])?;
            }
        }
    }
    Ok(table)
}

/// Whether `data_source` lists any temporal-capable adapter, optionally only
/// for one role table. A missing table means no support.
pub fn temporal_processing_support_exists(data_source: Option<&DataSet>, collection: Option<&str>) -> bool {
    let Some(table) = data_source.and_then(|data_source| data_source.table(TEMPORAL_SUPPORT_TABLE)) else {
        return false;
    };
    match collection.filter(|name| !name.trim().is_empty()) {
        None => !table.is_empty(),
        Some(collection) => table.rows().any(|row| {
            row.text("Source")
                .is_some_and(|source| source.eq_ignore_ascii_case(collection))
        }),
    }
}

fn is_role_table(name: &str) -> bool {
    ROLE_TABLES
        .iter()
        .filter_map(AdapterRole::data_member)
        .any(|member| member.eq_ignore_ascii_case(name))
}

fn temporal_ids(support: Option<&DataTable>, source: &str) -> HashSet<u32> {
    let Some(support) = support else {
        return HashSet::new();
    };
    support
        .rows()
        .filter(|row| {
            row.text("Source")
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(source))
        })
        .filter_map(|row| row.get("ID").and_then(Value::as_u32))
        .collect()
}

/// Reduce a real-time configuration to what temporal reprocessing needs.
///
/// Role tables keep only rows whose `ID` is listed in `TemporalSupport` for
/// that table; every other table is copied as-is.
pub fn extract_temporal_configuration(realtime: &DataSet) -> tsf_adapters::Result<DataSet> {
    let support = realtime.table(TEMPORAL_SUPPORT_TABLE);
    let mut temporal = DataSet::new();
    for table in realtime.tables() {
        if !is_role_table(&table.name) {
            temporal.add_table(table.clone());
            continue;
        }
        let ids = temporal_ids(support, &table.name);
        let mut reduced = table.clone_schema();
        for row in table.rows() {
            let id = row.get("ID").and_then(Value::as_u32);
            if id.is_some_and(|id| ids.contains(&id)) {
                reduced.import_row(&row)?;
            }
        }
        debug!(table = %table.name, kept = reduced.len(), total = table.len(), "reduced adapter table");
        temporal.add_table(reduced);
    }
    Ok(temporal)
}

/// [`extract_temporal_configuration`] memoized on the identity of `realtime`.
///
/// Every adapter shares one real-time snapshot, so repeated requests for the
/// same `Arc` return the same reduced configuration.
pub fn extract_temporal_configuration_cached(realtime: &Arc<DataSet>) -> tsf_adapters::Result<Arc<DataSet>> {
    let mut cached = EXTRACTED.lock();
    if let Some((source, temporal)) = cached.as_ref() {
        if Arc::ptr_eq(source, realtime) {
            return Ok(temporal.clone());
        }
    }
    *cached = None;
    let temporal = Arc::new(extract_temporal_configuration(realtime)?);
    *cached = Some((realtime.clone(), temporal.clone()));
    Ok(temporal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsf_adapters::AdapterCore;

    struct Replayable {
        core: AdapterCore,
        temporal: bool,
    }

    impl Adapter for Replayable {
        fn core(&self) -> &AdapterCore {
            &self.core
        }

        fn supports_temporal_processing(&self) -> bool {
            self.temporal
        }
    }

    #[test]
    fn support_table_lists_capable_members_by_data_member() {
        let outputs = AdapterCollection::new("outputs", AdapterRole::Output);
        outputs.set_auto_initialize(false);
        for (id, temporal) in [(4u32, true), (5, false), (6, true)] {
            outputs.add(Arc::new(Replayable {
                core: AdapterCore::new(format!("archive-{}", id)).with_id(id),
                temporal,
            }));
        }
        let composite = AdapterCollection::new("all", AdapterRole::Composite);

        let table = build_temporal_support_table(&[outputs.clone(), composite.clone()]).unwrap();
        let rows: Vec<(String, u32)> = table
            .rows()
            .map(|row| {
                (
                    row.text("Source").unwrap().into_owned(),
                    row.get("ID").and_then(Value::as_u32).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            rows,
            [("OutputAdapters".to_owned(), 4), ("OutputAdapters".to_owned(), 6)]
        );
        outputs.dispose();
        composite.dispose();
    }

    fn realtime() -> DataSet {
        let mut actions = DataTable::new("ActionAdapters", ["ID", "AdapterName", "TypeName", "ConnectionString"]);
        for (id, name) in [(1u32, "calc-a"), (2, "calc-b"), (3, "calc-c")] {
            actions
                .push_row([Value::from(id), name.into(), "Calc".into(), "".into()])
                .unwrap();
        }
        let mut measurements = DataTable::new("ActiveMeasurements", ["ID", "PointTag"]);
        measurements
            .push_row([Value::from("PPA:1"), "FREQ".into()])
            .unwrap();
        let mut support = DataTable::new(TEMPORAL_SUPPORT_TABLE, ["Source", "ID"]);
        support
            .push_row([Value::from("ActionAdapters"), Value::from(1u32)])
            .unwrap();
        support
            .push_row([Value::from("ActionAdapters"), Value::from(3u32)])
            .unwrap();

        let mut data_set = DataSet::new();
        data_set.add_table(actions);
        data_set.add_table(measurements);
        data_set.add_table(support);
        data_set
    }

    #[test]
    fn keeps_only_temporal_rows_in_role_tables() {
        let source = realtime();
        let temporal = extract_temporal_configuration(&source).unwrap();

        let actions = temporal.table("actionadapters").unwrap();
        let names: Vec<String> = actions
            .rows()
            .map(|row| row.text("AdapterName").unwrap().into_owned())
            .collect();
        assert_eq!(names, ["calc-a", "calc-c"]);
        assert_eq!(temporal.table("ActiveMeasurements"), source.table("ActiveMeasurements"));
    }

    #[test]
    fn missing_support_table_empties_role_tables() {
        let mut source = realtime();
        source.remove_table(TEMPORAL_SUPPORT_TABLE);
        let temporal = extract_temporal_configuration(&source).unwrap();
        assert!(temporal.table("ActionAdapters").unwrap().is_empty());
        assert!(!temporal_processing_support_exists(Some(&source), None));
    }

    #[test]
    fn support_lookup_by_collection() {
        let source = realtime();
        assert!(temporal_processing_support_exists(Some(&source), None));
        assert!(temporal_processing_support_exists(Some(&source), Some("actionadapters")));
        assert!(!temporal_processing_support_exists(Some(&source), Some("OutputAdapters")));
        assert!(!temporal_processing_support_exists(None, None));
    }

    #[test]
    fn cached_extraction_reuses_result_for_same_snapshot() {
        let source = Arc::new(realtime());
        let first = extract_temporal_configuration_cached(&source).unwrap();
        let second = extract_temporal_configuration_cached(&source).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = Arc::new(realtime());
        let third = extract_temporal_configuration_cached(&other).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
    }
}
