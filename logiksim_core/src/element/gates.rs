//! The built-in two-input boolean gates named in spec §4.3: And, Or, Xor,
//! Nand, Nor. Grounded on the teacher's per-gate structs
//! (`Logisim-Rust/logisim_core/src/component.rs`'s `AndGate`), but
//! collapsed into one `Gate` struct parameterized by an operation enum,
//! since the five only differ in their truth table.

use crate::element::{Element, ElementId, ElementResponse};
use crate::library::{ComponentLibrary, Factory, Guid, MetadataField, MetadataSchema};
use crate::metadata::Metadata;
use crate::signal::{Timestamp, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
}

impl GateOp {
    fn guid_name(self) -> &'static str {
        match self {
            GateOp::And => "core/and",
            GateOp::Or => "core/or",
            GateOp::Xor => "core/xor",
            GateOp::Nand => "core/nand",
            GateOp::Nor => "core/nor",
        }
    }

    fn eval(self, a: Value, b: Value) -> Value {
        match self {
            GateOp::And => a.and(b),
            GateOp::Or => a.or(b),
            GateOp::Xor => a.xor(b),
            GateOp::Nand => !a.and(b),
            GateOp::Nor => !a.or(b),
        }
    }
}

/// A two-input, one-output combinational gate.
#[derive(Debug)]
struct Gate {
    id: ElementId,
    parent: Option<ElementId>,
    guid: Guid,
    op: GateOp,
    inputs: [Value; 2],
    input_delays: [u64; 2],
    output: Value,
    metadata: Metadata,
}

impl Gate {
    fn new(id: ElementId, parent: Option<ElementId>, op: GateOp, metadata: Metadata) -> Self {
        let input_delays = Self::read_input_delays(&metadata);
        Gate {
            id,
            parent,
            guid: Guid::new(op.guid_name()),
            op,
            inputs: [Value::Low, Value::Low],
            input_delays,
            output: op.eval(Value::Low, Value::Low),
            metadata,
        }
    }

    /// Reads each input's `d_i` from metadata (spec §3). `"input_delay"` sets
    /// both ports uniformly; `"input_delays"` (a two-element array) sets
    /// them independently and takes precedence. Unset ports default to `0`.
    fn read_input_delays(metadata: &Metadata) -> [u64; 2] {
        let mut delays = [0u64; 2];
        if let Some(uniform) = metadata.get("input_delay").and_then(|v| v.as_u64()) {
            delays = [uniform, uniform];
        }
        if let Some(per_port) = metadata.get("input_delays").and_then(|v| v.as_array()) {
            for (i, slot) in delays.iter_mut().enumerate() {
                if let Some(d) = per_port.get(i).and_then(|v| v.as_u64()) {
                    *slot = d;
                }
            }
        }
        delays
    }

    fn recompute(&mut self, _t: Timestamp) -> ElementResponse {
        let new_output = self.op.eval(self.inputs[0], self.inputs[1]);
        if new_output == self.output {
            return ElementResponse::none();
        }
        self.output = new_output;
        ElementResponse::output(0, new_output)
    }
}

impl Element for Gate {
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
        2
    }

    fn output_count(&self) -> usize {
        1
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn apply_metadata(&mut self, delta: Metadata) {
        crate::metadata::merge(&mut self.metadata, delta);
        self.input_delays = Self::read_input_delays(&self.metadata);
    }

    fn input_delay(&self, port: usize) -> u64 {
        self.input_delays[port]
    }

    fn latched_input(&self, port: usize) -> Value {
        self.inputs[port]
    }

    fn on_input_edge(&mut self, port: usize, value: Value, t: Timestamp) -> ElementResponse {
        self.inputs[port] = value;
        self.recompute(t)
    }

    fn on_self_wake(&mut self, _t: Timestamp) -> ElementResponse {
        ElementResponse::none()
    }
}

#[derive(Debug)]
struct GateFactory(GateOp);

impl Factory for GateFactory {
    fn instantiate(
        &self,
        id: ElementId,
        parent: Option<ElementId>,
        metadata: Metadata,
    ) -> Box<dyn Element> {
        Box::new(Gate::new(id, parent, self.0, metadata))
    }

    fn schema(&self) -> MetadataSchema {
        MetadataSchema {
            fields: vec![
                MetadataField {
                    key: "input_delay".to_string(),
                    kind: "number",
                    default: serde_json::json!(0),
                },
                MetadataField {
                    key: "input_delays".to_string(),
                    kind: "array",
                    default: serde_json::json!([0, 0]),
                },
            ],
        }
    }
}

/// Register the five standard gates into `lib`.
pub fn register(lib: &mut ComponentLibrary) {
    for op in [GateOp::And, GateOp::Or, GateOp::Xor, GateOp::Nand, GateOp::Nor] {
        lib.register(Guid::new(op.guid_name()), Box::new(GateFactory(op)));
    }
}
