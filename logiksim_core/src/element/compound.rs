//! Compound elements: a named, reusable sub-circuit exposed to its parent
//! as a single element with its own numbered boundary ports (spec §4.3).
//!
//! A compound element owns no simulated state of its own — nothing ever
//! calls `on_input_edge`/`on_self_wake` on it, since interconnects attach
//! directly to the real child ports once a boundary binding is resolved.
//! Its job is purely the forwarding table the controller consults when a
//! command names one of its external ports; see
//! `Controller::resolve_terminal_port` for the iterative (non-recursive)
//! walk through nested compounds this enables.

use crate::element::{Element, ElementId, ElementResponse};
use crate::library::{ComponentLibrary, Factory, Guid, MetadataField, MetadataSchema};
use crate::metadata::Metadata;
use crate::signal::{Timestamp, Value};

/// Where a compound element's boundary port forwards to: a port on one of
/// its children, which may itself be another compound element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
    pub child: ElementId,
    pub child_port: usize,
}

#[derive(Debug)]
pub struct CompoundElement {
    id: ElementId,
    parent: Option<ElementId>,
    guid: Guid,
    metadata: Metadata,
    input_ports: Vec<PortBinding>,
    output_ports: Vec<PortBinding>,
    children: Vec<ElementId>,
}

impl CompoundElement {
    pub fn new(id: ElementId, parent: Option<ElementId>, metadata: Metadata) -> Self {
        let input_ports = Self::read_bindings(&metadata, "inputs");
        let output_ports = Self::read_bindings(&metadata, "outputs");
        CompoundElement {
            id,
            parent,
            guid: Guid::new("core/compound"),
            metadata,
            input_ports,
            output_ports,
            children: Vec::new(),
        }
    }

    /// Reads a compound's boundary port map out of its metadata (spec §3:
    /// "a port map from the compound's external ports to internal child
    /// ports"). `key` is `"inputs"` or `"outputs"`; each entry is
    /// `{"child": <element id>, "port": <child port index>}`, ordered by
    /// external port index. Malformed or missing entries are skipped rather
    /// than rejected outright — mirrors `Gate::read_input_delays` defaulting
    /// unset ports instead of failing the whole element.
    fn read_bindings(metadata: &Metadata, key: &str) -> Vec<PortBinding> {
        metadata
            .get(key)
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let child = entry.get("child")?.as_u64()?;
                        let child_port = entry.get("port")?.as_u64()? as usize;
                        Some(PortBinding {
                            child: ElementId(child),
                            child_port,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn factory() -> Box<dyn Factory> {
        Box::new(CompoundFactory)
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn add_child(&mut self, child: ElementId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub fn remove_child(&mut self, child: ElementId) {
        self.children.retain(|&c| c != child);
    }

    pub fn bind_input_port(&mut self, external_port: usize, binding: PortBinding) {
        Self::set_binding(&mut self.input_ports, external_port, binding);
    }

    pub fn bind_output_port(&mut self, external_port: usize, binding: PortBinding) {
        Self::set_binding(&mut self.output_ports, external_port, binding);
    }

    fn set_binding(ports: &mut Vec<PortBinding>, index: usize, binding: PortBinding) {
        if index >= ports.len() {
            ports.resize(
                index + 1,
                PortBinding {
                    child: binding.child,
                    child_port: binding.child_port,
                },
            );
        }
        ports[index] = binding;
    }

    pub fn resolve_input(&self, external_port: usize) -> Option<PortBinding> {
        self.input_ports.get(external_port).copied()
    }

    pub fn resolve_output(&self, external_port: usize) -> Option<PortBinding> {
        self.output_ports.get(external_port).copied()
    }
}

impl Element for CompoundElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn guid(&self) -> &Guid {
        &self.guid
    }

    fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    fn input_count(&self) -> usize {
        self.input_ports.len()
    }

    fn output_count(&self) -> usize {
        self.output_ports.len()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn apply_metadata(&mut self, delta: Metadata) {
        crate::metadata::merge(&mut self.metadata, delta);
        self.input_ports = Self::read_bindings(&self.metadata, "inputs");
        self.output_ports = Self::read_bindings(&self.metadata, "outputs");
    }

    /// Never consulted: `Controller::resolve_terminal_port` always walks a
    /// compound's port binding down to the real child port before any edge
    /// delay is looked up, so the compound itself has no `d_i` of its own.
    fn input_delay(&self, _port: usize) -> u64 {
        0
    }

    fn latched_input(&self, _port: usize) -> Value {
        Value::Low
    }

    fn on_input_edge(&mut self, _port: usize, _value: Value, _t: Timestamp) -> ElementResponse {
        ElementResponse::none()
    }

    fn on_self_wake(&mut self, _t: Timestamp) -> ElementResponse {
        ElementResponse::none()
    }
}

#[derive(Debug)]
struct CompoundFactory;

impl Factory for CompoundFactory {
    fn instantiate(
        &self,
        id: ElementId,
        parent: Option<ElementId>,
        metadata: Metadata,
    ) -> Box<dyn Element> {
        Box::new(CompoundElement::new(id, parent, metadata))
    }

    fn schema(&self) -> MetadataSchema {
        MetadataSchema {
            fields: vec![
                MetadataField {
                    key: "inputs".to_string(),
                    kind: "array",
                    default: serde_json::json!([]),
                },
                MetadataField {
                    key: "outputs".to_string(),
                    kind: "array",
                    default: serde_json::json!([]),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_binding_resolves() {
        let mut c = CompoundElement::new(ElementId(1), None, Metadata::new());
        c.bind_input_port(
            0,
            PortBinding {
                child: ElementId(2),
                child_port: 1,
            },
        );
        assert_eq!(
            c.resolve_input(0),
            Some(PortBinding {
                child: ElementId(2),
                child_port: 1
            })
        );
        assert_eq!(c.resolve_input(1), None);
    }

    #[test]
    fn test_port_bindings_parsed_from_creation_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "inputs".to_string(),
            serde_json::json!([{"child": 2, "port": 0}, {"child": 3, "port": 1}]),
        );
        metadata.insert(
            "outputs".to_string(),
            serde_json::json!([{"child": 3, "port": 0}]),
        );
        let c = CompoundElement::new(ElementId(1), None, metadata);

        assert_eq!(
            c.resolve_input(0),
            Some(PortBinding { child: ElementId(2), child_port: 0 })
        );
        assert_eq!(
            c.resolve_input(1),
            Some(PortBinding { child: ElementId(3), child_port: 1 })
        );
        assert_eq!(
            c.resolve_output(0),
            Some(PortBinding { child: ElementId(3), child_port: 0 })
        );
    }

    #[test]
    fn test_port_bindings_updated_by_apply_metadata() {
        let mut c = CompoundElement::new(ElementId(1), None, Metadata::new());
        assert_eq!(c.resolve_input(0), None);

        let mut delta = Metadata::new();
        delta.insert(
            "inputs".to_string(),
            serde_json::json!([{"child": 5, "port": 2}]),
        );
        c.apply_metadata(delta);

        assert_eq!(
            c.resolve_input(0),
            Some(PortBinding { child: ElementId(5), child_port: 2 })
        );
    }

    #[test]
    fn test_child_tracking_is_idempotent() {
        let mut c = CompoundElement::new(ElementId(1), None, Metadata::new());
        c.add_child(ElementId(2));
        c.add_child(ElementId(2));
        assert_eq!(c.children(), &[ElementId(2)]);
        c.remove_child(ElementId(2));
        assert!(c.children().is_empty());
    }
}
