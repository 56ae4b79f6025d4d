//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Session orchestration, routing and flow control."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Display names for notification sources.
use std::collections::HashMap;

use parking_lot::RwLock;
use tsf_adapters::EventSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NameKey {
    Adapter(u64),
    Text(String),
    Component(&'static str),
}

/// Memoized source names, suffixed with `#<session>` when the session is named.
#[derive(Debug, Default)]
pub struct DerivedNames {
    session: Option<String>,
    cache: RwLock<HashMap<NameKey, String>>,
}

impl DerivedNames {
    pub fn new(session: Option<String>) -> Self {
        Self {
            session: session.filter(|name| !name.trim().is_empty()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the session these names are qualified with.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Derived name of `source`.
    ///
    /// Adapters are keyed by their identity hash, so renaming an adapter
    /// yields a fresh entry rather than a stale one.
    pub fn derive(&self, source: &EventSource) -> String {
        let key = match source {
            EventSource::Adapter(adapter) => NameKey::Adapter(adapter.core().identity_hash()),
            EventSource::Text(text) => NameKey::Text(text.clone()),
            EventSource::Component(name) => NameKey::Component(*name),
        };
        if let Some(name) = self.cache.read().get(&key) {
            return name.clone();
        }

        let mut name = match source {
            EventSource::Adapter(adapter) => {
                let name = adapter.name();
                if name.trim().is_empty() {
                    adapter.type_name().to_owned()
                } else {
                    name
                }
            }
            EventSource::Text(text) if !text.trim().is_empty() => text.clone(),
            EventSource::Text(_) => "String".to_owned(),
            EventSource::Component(name) => (*name).to_owned(),
        };
        if let Some(session) = &self.session {
            name.push('#');
            name.push_str(session);
        }
        self.cache.write().entry(key).or_insert(name).clone()
    }

    /// Forget every memoized name.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
