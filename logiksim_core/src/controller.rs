//! The controller: owns every element and interconnect, drives the core
//! loop, and is the sole point of contact between a front-end and the
//! simulation (spec §5, §6, §4.7).
//!
//! Grounded on `test_controller.py`'s API surface — `get_interface()`'s
//! `create_element`/`update_element`/`connect` methods, `process(delta)`
//! to advance simulated time, `get_channel_out()` for the update stream,
//! and `_top_level_elements`/`child_added` for top-level bookkeeping — and
//! on the teacher's `Simulation` struct
//! (`Logisim-Rust/logisim_core/src/simulation.rs`) for the run/step naming
//! and `SimulationConfig`-driven stop conditions.

use crate::config::SimulationConfig;
use crate::element::compound::{CompoundElement, PortBinding};
use crate::element::{Element, ElementId, ElementResponse};
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventKey, EventPayload, EventQueue};
use crate::library::{ComponentLibrary, Guid};
use crate::linetree::{LineTree, LineTreeId, Point};
use crate::metadata::Metadata;
use crate::protocol::{Command, Update};
use crate::signal::{Timestamp, Value};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;

/// Key identifying one boundary of an interconnect attachment: an
/// element's port, and whether that port is an output (drives the tree) or
/// an input (a sink of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PortKey {
    element: ElementId,
    port: usize,
    is_output: bool,
}

/// Owns the element and interconnect tables and runs the core loop.
/// Single-threaded: all mutation happens on whichever thread calls
/// `process`/`run`, communicating with the outside world purely through
/// the two channels (spec §5).
pub struct Controller {
    elements: HashMap<ElementId, Box<dyn Element>>,
    trees: HashMap<LineTreeId, LineTree>,
    port_tree: HashMap<PortKey, LineTreeId>,
    top_level_elements: Vec<ElementId>,
    library: ComponentLibrary,
    queue: EventQueue,
    clock: Timestamp,
    config: SimulationConfig,
    commands_in: Receiver<Command>,
    updates_out: Sender<Update>,
    next_element_id: u64,
    next_tree_id: u64,
    events_dispatched: u64,
    stopped: bool,
}

impl Controller {
    /// Build a controller with a fresh standard library and its own
    /// command/update channel pair, returning the two endpoints a
    /// front-end talks to it through.
    pub fn new(config: SimulationConfig) -> (Self, Sender<Command>, Receiver<Update>) {
        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let (updates_tx, updates_rx) = crossbeam_channel::unbounded();
        let controller = Controller {
            elements: HashMap::new(),
            trees: HashMap::new(),
            port_tree: HashMap::new(),
            top_level_elements: Vec::new(),
            library: ComponentLibrary::with_standard_elements(),
            queue: EventQueue::new(),
            clock: Timestamp::new(0),
            config,
            commands_in: commands_rx,
            updates_out: updates_tx,
            next_element_id: 1,
            next_tree_id: 1,
            events_dispatched: 0,
            stopped: false,
        };
        (controller, commands_tx, updates_rx)
    }

    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    pub fn top_level_elements(&self) -> &[ElementId] {
        &self.top_level_elements
    }

    /// Number of distinct interconnect trees currently tracked. Mostly
    /// useful for tests asserting that a bridging `connect` folded two
    /// trees into one (spec §4.4 "Merging").
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn emit(&self, update: Update) {
        // The update channel is unbounded and outlives no particular
        // receiver; a disconnected receiver just means nobody's listening.
        let _ = self.updates_out.send(update);
    }

    fn properties_update(&self) -> Update {
        Update::Properties {
            rate: self.config.simulation_rate,
            clock: self.clock.as_u64(),
            grid_spacing: self.config.grid_spacing,
            delay_per_gridpoint: self.config.delay_per_gridpoint,
        }
    }

    fn emit_error(&self, err: &CoreError) {
        log::warn!("command rejected: {err}");
        // §7: InvalidCommand with no target is dropped after logging —
        // there is nothing for the error to attach to. Every other kind
        // either names an element or carries its own context (coordinates,
        // GUID) in `message`, so it is always worth emitting.
        if matches!(err, CoreError::InvalidCommand { element: None, .. }) {
            return;
        }
        self.emit(Update::from_error(err));
    }

    fn alloc_element_id(&mut self) -> ElementId {
        let id = ElementId(self.next_element_id);
        self.next_element_id += 1;
        id
    }

    fn alloc_tree_id(&mut self) -> LineTreeId {
        let id = LineTreeId(self.next_tree_id);
        self.next_tree_id += 1;
        id
    }

    /// Drain every command currently waiting without blocking (spec §4.7
    /// step 1).
    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands_in.try_recv() {
            if let Command::Quit = cmd {
                self.stopped = true;
                return;
            }
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let result = match cmd {
            Command::CreateElement {
                guid,
                parent,
                metadata,
            } => self.create_element(guid, parent, metadata).map(|_| ()),
            Command::DeleteElement { element } => self.delete_element(element),
            Command::UpdateMetadata { element, delta } => self.update_metadata(element, delta),
            Command::Connect {
                element,
                port,
                is_output,
                path,
            } => self.connect(element, port, is_output, path),
            Command::Disconnect {
                element,
                port,
                is_output,
            } => self.disconnect(element, port, is_output),
            Command::ScheduleEdge {
                element,
                port,
                value,
                delay,
            } => self.schedule_edge(element, port, value, delay),
            Command::EnumerateComponents => {
                self.emit(Update::Enumeration {
                    components: self.library.enumerate_with_schemas(),
                });
                Ok(())
            }
            Command::QueryProperties => {
                self.emit(self.properties_update());
                Ok(())
            }
            Command::SetProperties { rate } => {
                self.config.simulation_rate = rate;
                log::debug!("simulation_rate set to {rate:?}");
                self.emit(self.properties_update());
                Ok(())
            }
            Command::Quit => unreachable!("handled in drain_commands"),
        };

        if let Err(err) = result {
            if err.is_fatal() {
                log::error!("fatal invariant violation: {err}");
                self.stopped = true;
            }
            self.emit_error(&err);
        }
    }

    pub fn create_element(
        &mut self,
        guid: Guid,
        parent: Option<ElementId>,
        metadata: Metadata,
    ) -> CoreResult<ElementId> {
        let id = self.alloc_element_id();
        let element = self.library.instantiate(&guid, id, parent, metadata)?;
        self.elements.insert(id, element);

        match parent {
            Some(parent_id) => self.add_child_to_compound(parent_id, id),
            None => self.top_level_elements.push(id),
        }

        log::debug!("created element {id} ({guid})");
        self.emit(Update::Created { element: id, guid });
        Ok(id)
    }

    fn add_child_to_compound(&mut self, parent: ElementId, child: ElementId) {
        if let Some(compound) = self
            .elements
            .get_mut(&parent)
            .and_then(|e| e.as_any_mut().downcast_mut::<CompoundElement>())
        {
            compound.add_child(child);
        }
    }

    pub fn delete_element(&mut self, element: ElementId) -> CoreResult<()> {
        if !self.elements.contains_key(&element) {
            return Err(CoreError::UnknownElement(element));
        }

        self.queue.cancel_for(element);
        self.top_level_elements.retain(|&e| e != element);

        for tree in self.trees.values_mut() {
            tree.detach_element_sinks(element);
            if tree.driver().map(|(e, _)| e) == Some(element) {
                tree.detach_driver();
            }
        }
        self.port_tree.retain(|key, _| key.element != element);

        if let Some(parent) = self.elements.get(&element).and_then(|e| e.parent()) {
            if let Some(compound) = self
                .elements
                .get_mut(&parent)
                .and_then(|e| e.as_any_mut().downcast_mut::<CompoundElement>())
            {
                compound.remove_child(element);
            }
        }

        self.elements.remove(&element);
        log::debug!("deleted element {element}");
        self.emit(Update::Deleted { element });
        Ok(())
    }

    pub fn update_metadata(&mut self, element: ElementId, delta: Metadata) -> CoreResult<()> {
        let el = self
            .elements
            .get_mut(&element)
            .ok_or(CoreError::UnknownElement(element))?;
        el.apply_metadata(delta);
        let merged = el.metadata().clone();
        self.emit(Update::Change {
            element,
            metadata: merged,
        });
        Ok(())
    }

    /// Resolve a (possibly compound) element's external port down to the
    /// real element/port pair that ultimately drives or reads it,
    /// iteratively rather than recursively (spec §4.3).
    fn resolve_terminal_port(
        &self,
        mut element: ElementId,
        mut port: usize,
        is_output: bool,
    ) -> CoreResult<(ElementId, usize)> {
        loop {
            let el = self
                .elements
                .get(&element)
                .ok_or(CoreError::UnknownElement(element))?;
            match el.as_any().downcast_ref::<CompoundElement>() {
                Some(compound) => {
                    let binding = if is_output {
                        compound.resolve_output(port)
                    } else {
                        compound.resolve_input(port)
                    };
                    match binding {
                        Some(PortBinding { child, child_port }) => {
                            element = child;
                            port = child_port;
                        }
                        None => {
                            return Err(CoreError::PortOutOfRange {
                                element,
                                port,
                                count: if is_output {
                                    compound.output_count()
                                } else {
                                    compound.input_count()
                                },
                            })
                        }
                    }
                }
                None => {
                    let count = if is_output {
                        el.output_count()
                    } else {
                        el.input_count()
                    };
                    if port >= count {
                        return Err(CoreError::PortOutOfRange {
                            element,
                            port,
                            count,
                        });
                    }
                    return Ok((element, port));
                }
            }
        }
    }

    /// Every existing tree that contains at least one point of `path`,
    /// deduplicated. Used by `connect` to detect whether a new segment
    /// bridges into (or between) already-existing interconnects.
    fn touched_trees(&self, path: &[Point]) -> Vec<LineTreeId> {
        let mut touched = Vec::new();
        for &pt in path {
            for (&tid, tree) in self.trees.iter() {
                if tree.contains_point(pt) && !touched.contains(&tid) {
                    touched.push(tid);
                }
            }
        }
        touched
    }

    /// How many distinct geometric points two trees have in common. Spec
    /// §4.4 requires exactly one for an unambiguous merge.
    fn shared_point_count(&self, a: LineTreeId, b: LineTreeId) -> usize {
        let (Some(ta), Some(tb)) = (self.trees.get(&a), self.trees.get(&b)) else {
            return 0;
        };
        ta.points().filter(|&p| tb.contains_point(p)).count()
    }

    /// Any point `a` and `b` currently have in common, if exactly one such
    /// point exists. Mirrors the original `merge_tree`'s `col_points`: it is
    /// only ever called after the bridging segment has already been grafted
    /// onto one of the two trees, so a genuine merge always shows up as
    /// shared geometry between the two trees themselves.
    fn shared_point(&self, a: LineTreeId, b: LineTreeId) -> Option<Point> {
        let ta = self.trees.get(&a)?;
        let tb = self.trees.get(&b)?;
        ta.points().find(|&p| tb.contains_point(p))
    }

    /// Resolves which tree a new `connect` path belongs to: reuses the sole
    /// tree the path touches (extending it with the new path first, the way
    /// the original grows `self_tree` before ever looking for a merge), then
    /// folds in every other tree the extended path now touches (spec §4.4
    /// "Merging"), or creates a fresh tree if the path touches none.
    fn resolve_or_build_tree(&mut self, path: &[Point]) -> CoreResult<LineTreeId> {
        let touched = self.touched_trees(path);
        let primary = match touched.first() {
            Some(&id) => id,
            None => {
                let id = self.alloc_tree_id();
                let tree = LineTree::new_from_segment(
                    id,
                    path[0],
                    path[1],
                    self.config.delay_per_gridpoint,
                    self.config.grid_spacing,
                );
                self.trees.insert(id, tree);
                id
            }
        };

        {
            let tree = self.trees.get_mut(&primary).expect("primary tree exists");
            for pair in path.windows(2) {
                tree.add_segment(pair[0], pair[1])?;
            }
        }

        for &other in touched.iter().filter(|&&t| t != primary) {
            if self.shared_point_count(primary, other) != 1 {
                return Err(CoreError::AmbiguousMerge);
            }
            let bridge = self.shared_point(primary, other).ok_or(CoreError::AmbiguousMerge)?;
            let other_tree = self.trees.remove(&other).expect("touched tree exists");
            let primary_tree = self.trees.remove(&primary).expect("touched tree exists");
            let merged = primary_tree.merge(other_tree, bridge)?;
            self.trees.insert(primary, merged);
            for v in self.port_tree.values_mut() {
                if *v == other {
                    *v = primary;
                }
            }
            log::debug!("merged {other} into {primary} at {bridge:?}");
        }
        Ok(primary)
    }

    pub fn connect(
        &mut self,
        element: ElementId,
        port: usize,
        is_output: bool,
        path: Vec<Point>,
    ) -> CoreResult<()> {
        if path.len() < 2 {
            return Err(CoreError::InvalidCommand {
                message: "connect requires a path of at least two points".into(),
                element: Some(element),
            });
        }
        let (real_element, real_port) = self.resolve_terminal_port(element, port, is_output)?;
        let key = PortKey {
            element: real_element,
            port: real_port,
            is_output,
        };

        let tree_id = match self.port_tree.get(&key) {
            Some(&id) => id,
            None => self.resolve_or_build_tree(&path)?,
        };

        {
            let tree = self.trees.get_mut(&tree_id).expect("just inserted or found");
            for pair in path.windows(2) {
                tree.add_segment(pair[0], pair[1])?;
            }
            if is_output {
                tree.attach_driver(real_element, real_port, path[0])?;
            } else {
                tree.attach_sink(real_element, real_port, *path.last().unwrap())?;
            }
        }

        self.port_tree.insert(key, tree_id);
        log::debug!("connected {real_element}:{real_port} (output={is_output}) to {tree_id}");
        self.emit(Update::Connected {
            element: real_element,
            port: real_port,
            is_output,
            tree: tree_id,
        });
        Ok(())
    }

    pub fn disconnect(&mut self, element: ElementId, port: usize, is_output: bool) -> CoreResult<()> {
        let (real_element, real_port) = self.resolve_terminal_port(element, port, is_output)?;
        let key = PortKey {
            element: real_element,
            port: real_port,
            is_output,
        };
        let tree_id = self.port_tree.remove(&key).ok_or(CoreError::InvalidCommand {
            message: format!("{real_element}:{real_port} is not connected"),
            element: Some(real_element),
        })?;

        if let Some(tree) = self.trees.get_mut(&tree_id) {
            if is_output {
                tree.detach_driver();
            } else {
                tree.detach_sink(real_element, real_port);
            }
            if tree.is_empty_of_attachments() {
                self.trees.remove(&tree_id);
            }
        }

        self.emit(Update::Disconnected {
            element: real_element,
            port: real_port,
            is_output,
        });
        Ok(())
    }

    pub fn schedule_edge(
        &mut self,
        element: ElementId,
        port: usize,
        value: Value,
        delay: u64,
    ) -> CoreResult<()> {
        let (real_element, real_port) = self.resolve_terminal_port(element, port, false)?;
        self.schedule_input_arrival(real_element, real_port, self.clock.add_delay(delay), value);
        Ok(())
    }

    /// An edge has arrived at `element`'s input `port` (from an interconnect
    /// sink delay or directly from `schedule_edge`). Per spec §4.3's input
    /// state machine: an edge matching the currently latched value with no
    /// change already in flight is ignored; otherwise the element's own
    /// `d_i` is added on top of the arrival time before the `input-edge`
    /// event is scheduled, so the latch only updates once `d_i` has
    /// elapsed.
    fn schedule_input_arrival(&mut self, element: ElementId, port: usize, arrival: Timestamp, value: Value) {
        let key = EventKey::InputEdge(element, port);
        let Some(el) = self.elements.get(&element) else {
            return;
        };
        if value == el.latched_input(port) && !self.queue.has_pending(key) {
            return;
        }
        let d_i = el.input_delay(port);
        self.queue.schedule(
            arrival.add_delay(d_i),
            key,
            EventPayload::InputEdge { value },
        );
    }

    fn dispatch_event(&mut self, event: Event) {
        self.events_dispatched += 1;
        match event.key {
            EventKey::SelfWake(element) => self.dispatch_self_wake(element, event.due),
            EventKey::InputEdge(element, port) => {
                let value = match event.payload {
                    EventPayload::InputEdge { value } => value,
                    _ => {
                        log::error!("input-edge event carried an unexpected payload");
                        return;
                    }
                };
                self.dispatch_input_edge(element, port, value, event.due);
            }
            EventKey::InterconnectPropagate(tree_id) => {
                let value = match event.payload {
                    EventPayload::InterconnectPropagate { value } => value,
                    _ => {
                        log::error!("interconnect-propagate event carried the wrong payload");
                        return;
                    }
                };
                let arrivals = match self.trees.get_mut(&tree_id) {
                    Some(tree) => tree.on_driver_edge(value, event.due),
                    None => return,
                };
                for (sink_element, sink_port, arrival, value) in arrivals {
                    self.schedule_input_arrival(sink_element, sink_port, arrival, value);
                }
            }
        }
    }

    fn dispatch_self_wake(&mut self, element: ElementId, due: Timestamp) {
        let response = match self.elements.get_mut(&element) {
            Some(el) => el.on_self_wake(due),
            None => return,
        };
        self.apply_response(element, response, due);
    }

    fn dispatch_input_edge(&mut self, element: ElementId, port: usize, value: Value, due: Timestamp) {
        let response = match self.elements.get_mut(&element) {
            Some(el) => el.on_input_edge(port, value, due),
            None => return,
        };
        self.apply_response(element, response, due);
    }

    fn apply_response(&mut self, element: ElementId, response: ElementResponse, due: Timestamp) {
        for (port, value) in response.outputs {
            let key = PortKey {
                element,
                port,
                is_output: true,
            };
            if let Some(&tree_id) = self.port_tree.get(&key) {
                self.queue.schedule(
                    due,
                    EventKey::InterconnectPropagate(tree_id),
                    EventPayload::InterconnectPropagate { value },
                );
            }
        }
        if let Some(delay) = response.self_wake_delay {
            self.queue.schedule(
                due.add_delay(delay),
                EventKey::SelfWake(element),
                EventPayload::SelfWake,
            );
        }
    }

    /// Advance simulated time by `delta` ticks, draining commands and
    /// dispatching every event due at or before the new clock value
    /// (spec §4.7). Mirrors the original's `ctrl.process(delta)`.
    pub fn process(&mut self, delta: u64) {
        let target = self.clock.add_delay(delta);
        self.drain_commands();
        while !self.stopped {
            if let Some(max_events) = self.config.max_events {
                if self.events_dispatched >= max_events {
                    break;
                }
            }
            match self.queue.pop_due(target) {
                Some(event) => {
                    self.clock = event.due;
                    self.dispatch_event(event);
                    self.drain_commands();
                }
                None => break,
            }
        }
        if target > self.clock {
            self.clock = target;
        }
    }

    /// Run until told to quit, jumping directly from one due event to the
    /// next rather than polling. When `config.simulation_rate` is set, each
    /// jump is paced against a wall-clock anchor so `clock` never runs more
    /// than `rate` ticks ahead of wall time (spec §4.7) — purely cooperative,
    /// since nothing here lets wall time push `clock` forward on its own.
    pub fn run(&mut self) {
        let mut rate_anchor: Option<(std::time::Instant, Timestamp)> = None;
        loop {
            self.drain_commands();
            if self.stopped {
                break;
            }
            if let Some(max_time) = self.config.max_time {
                if self.clock.as_u64() >= max_time {
                    break;
                }
            }
            match self.queue.peek_next() {
                Some(next_due) => {
                    let delta = next_due.as_u64().saturating_sub(self.clock.as_u64()).max(1);
                    self.pace(&mut rate_anchor, delta);
                    self.process(delta);
                }
                None => match self.commands_in.recv() {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => break,
                },
            }
        }
    }

    /// Sleep just long enough that advancing `clock` by `delta` ticks next
    /// never outruns `config.simulation_rate` ticks per wall-clock second.
    /// Resets the anchor whenever the rate is unset or we've fallen behind,
    /// so a paused front-end (or a slow dispatch) never causes a catch-up
    /// burst once pacing resumes.
    fn pace(&self, anchor: &mut Option<(std::time::Instant, Timestamp)>, delta: u64) {
        let Some(rate) = self.config.simulation_rate else {
            *anchor = None;
            return;
        };
        if rate <= 0.0 {
            *anchor = None;
            return;
        }
        let (anchor_wall, anchor_clock) = *anchor.get_or_insert((std::time::Instant::now(), self.clock));
        let target_ticks = self.clock.as_u64().saturating_sub(anchor_clock.as_u64()) + delta;
        let required = std::time::Duration::from_secs_f64(target_ticks as f64 / rate);
        let elapsed = anchor_wall.elapsed();
        if elapsed < required {
            std::thread::sleep(required - elapsed);
        } else if elapsed > required + std::time::Duration::from_secs_f64(1.0 / rate) {
            // fell behind by more than a tick's worth; resynchronize instead
            // of trying to burst through every event we missed.
            *anchor = Some((std::time::Instant::now(), self.clock));
        }
    }
}
