//! Component library: the registry mapping a type GUID to an element
//! factory, per spec §4.2.
//!
//! Registration happens once at startup (`ComponentLibrary::with_standard_gates`
//! plays the role the teacher's per-module `*_library.rs` registration
//! functions play, e.g. `std::gates::gates_library`), after which the
//! library is read-only and can be shared freely across threads (spec §5).

use crate::element::{compound::CompoundElement, gates, Element, ElementId};
use crate::error::{CoreError, CoreResult};
use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable string naming an element type in the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub String);

impl Guid {
    pub fn new(name: impl Into<String>) -> Self {
        Guid(name.into())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Guid {
    fn from(s: &str) -> Self {
        Guid(s.to_string())
    }
}

/// Describes the shape of metadata a GUID's elements accept, surfaced to
/// the editor via `enumerate_components` / `query_properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSchema {
    pub fields: Vec<MetadataField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataField {
    pub key: String,
    pub kind: &'static str,
    pub default: serde_json::Value,
}

/// Builds a new [`Element`] instance of a library's type.
pub trait Factory: fmt::Debug + Send + Sync {
    /// Instantiate a new element with the given process-unique id.
    fn instantiate(
        &self,
        id: ElementId,
        parent: Option<ElementId>,
        metadata: Metadata,
    ) -> Box<dyn Element>;

    /// Metadata schema for the editor's property sheet.
    fn schema(&self) -> MetadataSchema;
}

/// Registry mapping a GUID to the factory that builds elements of that type.
#[derive(Default)]
pub struct ComponentLibrary {
    factories: HashMap<Guid, Box<dyn Factory>>,
}

impl fmt::Debug for ComponentLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLibrary")
            .field("registered", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComponentLibrary {
    pub fn new() -> Self {
        ComponentLibrary {
            factories: HashMap::new(),
        }
    }

    /// A library pre-populated with the basic gates and the compound
    /// element type, matching the concrete variants named in spec §4.3.
    pub fn with_standard_elements() -> Self {
        let mut lib = Self::new();
        gates::register(&mut lib);
        lib.register(Guid::new("core/compound"), CompoundElement::factory());
        lib
    }

    /// Register a factory under a GUID. Replaces any prior registration for
    /// the same GUID, matching the teacher's `*_library.rs` modules which
    /// are idempotent to call multiple times during startup.
    pub fn register(&mut self, guid: Guid, factory: Box<dyn Factory>) {
        self.factories.insert(guid, factory);
    }

    pub fn instantiate(
        &self,
        guid: &Guid,
        id: ElementId,
        parent: Option<ElementId>,
        metadata: Metadata,
    ) -> CoreResult<Box<dyn Element>> {
        self.factories
            .get(guid)
            .map(|factory| factory.instantiate(id, parent, metadata))
            .ok_or_else(|| CoreError::LibraryMissing(guid.clone()))
    }

    /// All registered GUIDs, for `enumerate_components`.
    pub fn enumerate(&self) -> Vec<Guid> {
        let mut guids: Vec<_> = self.factories.keys().cloned().collect();
        guids.sort();
        guids
    }

    pub fn schema(&self, guid: &Guid) -> Option<MetadataSchema> {
        self.factories.get(guid).map(|factory| factory.schema())
    }

    /// Every registered GUID paired with its metadata schema, for
    /// `enumerate_components` (spec §6: "list of GUID + schemas").
    pub fn enumerate_with_schemas(&self) -> Vec<(Guid, MetadataSchema)> {
        self.enumerate()
            .into_iter()
            .map(|guid| {
                let schema = self.schema(&guid).expect("enumerated guid is registered");
                (guid, schema)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_library_enumerates_gates() {
        let lib = ComponentLibrary::with_standard_elements();
        let guids = lib.enumerate();
        for name in ["and", "or", "xor", "nand", "nor"] {
            assert!(
                guids.contains(&Guid::new(format!("core/{name}"))),
                "missing {name} in {guids:?}"
            );
        }
    }

    #[test]
    fn test_missing_guid_is_reported_not_fatal() {
        let lib = ComponentLibrary::with_standard_elements();
        let result = lib.instantiate(
            &Guid::new("nonexistent"),
            ElementId(1),
            None,
            Metadata::new(),
        );
        assert!(matches!(result, Err(CoreError::LibraryMissing(_))));
    }
}
