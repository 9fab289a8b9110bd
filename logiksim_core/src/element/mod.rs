//! Elements: the polymorphic simulation objects described in spec §4.3.
//!
//! `Element` is the trait every gate and the compound wrapper implement —
//! the role the teacher's `Component` trait plays in
//! `examples/crossplatformdev-Logisim-RUST/Logisim-Rust/logisim_core/src/component.rs`,
//! narrowed to the two reaction hooks the core loop actually needs
//! (`on_input_edge`, `on_self_wake`) instead of a generic `update`.

pub mod compound;
pub mod gates;

use crate::library::Guid;
use crate::metadata::Metadata;
use crate::signal::{Timestamp, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique identifier for an element instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// What an element did in reaction to an edge or a self-wake: zero or more
/// output changes (each one drives the interconnect attached to that output
/// port) and, optionally, a request to be woken again after a delay.
#[derive(Debug, Clone, Default)]
pub struct ElementResponse {
    pub outputs: Vec<(usize, Value)>,
    pub self_wake_delay: Option<u64>,
}

impl ElementResponse {
    pub fn none() -> Self {
        ElementResponse::default()
    }

    pub fn output(port: usize, value: Value) -> Self {
        ElementResponse {
            outputs: vec![(port, value)],
            self_wake_delay: None,
        }
    }

    pub fn with_self_wake(mut self, delay: u64) -> Self {
        self.self_wake_delay = Some(delay);
        self
    }
}

/// A simulation object: combinational gate, sequential element, or compound
/// wrapper. All state transitions happen in `on_input_edge` / `on_self_wake`,
/// both of which run to completion without blocking (spec §4.3 invariant 1).
pub trait Element: fmt::Debug + Send {
    fn id(&self) -> ElementId;

    /// Supports the controller's resolution of compound-element port
    /// forwarding (spec §4.3): a boundary port may forward into another
    /// compound element, so the controller walks the chain by downcasting
    /// each element it meets rather than giving every element type a
    /// forwarding hook it doesn't need.
    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    fn guid(&self) -> &Guid;

    fn parent(&self) -> Option<ElementId>;

    fn input_count(&self) -> usize;

    fn output_count(&self) -> usize;

    fn metadata(&self) -> &Metadata;

    /// Merge `delta` into this element's metadata. Elements whose behavior
    /// depends on metadata (e.g. a compound element's child wiring) may
    /// react to the change here; most simply merge and return.
    fn apply_metadata(&mut self, delta: Metadata);

    /// This input's independent propagation delay `d_i` (spec §3/§4.3): the
    /// time a differing edge sits `Pending` before it is latched. The
    /// controller consults this when an edge arrives at the port, rather
    /// than the element itself scheduling its own latch.
    fn input_delay(&self, port: usize) -> u64;

    /// The value currently latched on this input port, used by the
    /// controller to drop edges that match the latch and have no pending
    /// change in flight (spec §4.3: "edges matching the latched value ...
    /// are ignored").
    fn latched_input(&self, port: usize) -> Value;

    /// React to a previously `Pending` edge's delay elapsing: the input
    /// latches `value` and the element recomputes whatever follows from it.
    fn on_input_edge(&mut self, port: usize, value: Value, t: Timestamp) -> ElementResponse;

    /// React to a previously requested self-wake delay elapsing.
    fn on_self_wake(&mut self, t: Timestamp) -> ElementResponse;
}
