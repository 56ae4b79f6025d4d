//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Construct adapters from configuration rows.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::Adapter;
use crate::dataset::RowView;
use crate::error::{AdapterError, Result};

/// One adapter row from a role table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDefinition {
    /// `AdapterName` column.
    pub name: String,
    /// `TypeName` column, matched case-insensitively.
    pub type_name: String,
    /// `ConnectionString` column.
    pub connection_string: String,
    /// `ID` column.
    pub id: u32,
}

impl AdapterDefinition {
    /// Read a definition from a row; `None` when a required column is missing.
    pub fn from_row(row: &RowView<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("AdapterName")?.into_owned(),
            type_name: row.text("TypeName")?.into_owned(),
            connection_string: row
                .text("ConnectionString")
                .map(|text| text.into_owned())
                .unwrap_or_default(),
            id: row.get("ID")?.as_u32()?,
        })
    }
}

type Constructor = Arc<dyn Fn(&AdapterDefinition) -> Result<Arc<dyn Adapter>> + Send + Sync>;

/// Registry of adapter constructors keyed by type name.
#[derive(Clone, Default)]
pub struct AdapterFactory {
    constructors: BTreeMap<String, Constructor>,
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one for the same type.
    pub fn register<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&AdapterDefinition) -> Result<Arc<dyn Adapter>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.trim().to_lowercase(), Arc::new(constructor));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors
            .contains_key(&type_name.trim().to_lowercase())
    }

    /// Registered type names, lowercased.
    pub fn type_names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Build the adapter a definition names.
    pub fn create(&self, definition: &AdapterDefinition) -> Result<Arc<dyn Adapter>> {
        let constructor = self
            .constructors
            .get(&definition.type_name.trim().to_lowercase())
            .ok_or_else(|| AdapterError::UnknownAdapterType(definition.type_name.clone()))?;
        constructor(definition)
    }
}

impl fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterCore;
    use crate::dataset::DataTable;

    struct Plain {
        core: AdapterCore,
    }

    impl Adapter for Plain {
        fn core(&self) -> &AdapterCore {
            &self.core
        }

        fn supports_temporal_processing(&self) -> bool {
            true
        }
    }

    fn factory() -> AdapterFactory {
        let mut factory = AdapterFactory::new();
        factory.register("Plain", |definition| {
            let adapter: Arc<dyn Adapter> = Arc::new(Plain {
                core: AdapterCore::new(definition.name.clone())
                    .with_id(definition.id)
                    .with_connection_string(definition.connection_string.clone()),
            });
            Ok(adapter)
        });
        factory
    }

    #[test]
    fn creates_registered_types_case_insensitively() {
        let mut table = DataTable::new(
            "ActionAdapters",
            ["ID", "AdapterName", "TypeName", "ConnectionString"],
        );
        table
            .push_row([
                crate::Value::from(4u32),
                "calc".into(),
                "PLAIN".into(),
                "processingInterval=0".into(),
            ])
            .unwrap();
        let row = table.rows().next().unwrap();
        let definition = AdapterDefinition::from_row(&row).unwrap();

        let adapter = factory().create(&definition).unwrap();
        assert_eq!(adapter.name(), "calc");
        assert_eq!(adapter.id(), 4);
        assert_eq!(adapter.core().connection_string(), "processingInterval=0");
    }

    #[test]
    fn unknown_types_are_errors() {
        let definition = AdapterDefinition {
            name: "x".into(),
            type_name: "Missing".into(),
            connection_string: String::new(),
            id: 1,
        };
        let err = factory().create(&definition).err().unwrap();
        assert!(matches!(err, AdapterError::UnknownAdapterType(name) if name == "Missing"));
        assert!(factory().contains("plain"));
    }
}
