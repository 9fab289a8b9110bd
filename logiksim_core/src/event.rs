//! Clock & event queue (spec §4.1): a min-priority queue over events keyed
//! by `(due_time, seq)`, with a companion pending-key index enforcing
//! at-most-one pending event per `(target, kind)`.
//!
//! The heap itself never loses an entry mid-flight; superseded entries are
//! simply dropped from the pending index and discarded lazily the next
//! time they would otherwise surface from the heap (the same lazy-deletion
//! idiom the teacher's `EventQueue::cancel_events_after` uses when it
//! rebuilds the heap — here we avoid the rebuild and let `pop`/`peek`
//! filter stale entries instead, per the §9 note that scanning the live
//! queue on every schedule would dominate at scale).

use crate::element::ElementId;
use crate::linetree::LineTreeId;
use crate::signal::{Timestamp, Value};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Identifies the pending slot an event occupies. Two events with equal
/// keys always collapse per the rule in `EventQueue::schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    SelfWake(ElementId),
    InputEdge(ElementId, usize),
    InterconnectPropagate(LineTreeId),
}

impl EventKey {
    /// Whether this key's pending event targets the given element (used by
    /// `cancel_for` on element deletion).
    fn targets_element(&self, id: ElementId) -> bool {
        match self {
            EventKey::SelfWake(e) | EventKey::InputEdge(e, _) => *e == id,
            EventKey::InterconnectPropagate(_) => false,
        }
    }

    /// Whether this key's payload carries a value that matters beyond *when*
    /// the event fires. `SelfWake` carries none — two pending wakes for the
    /// same element at the same tick are interchangeable, so the
    /// earlier-or-equal-wins drop rule is exact. `InputEdge` and
    /// `InterconnectPropagate` carry the value that will actually be latched
    /// or propagated, so a second schedule at the *same* `due` is not a
    /// redundant duplicate — it is a correction (e.g. a gate's second input
    /// latching within the same tick, flipping its output again) and must
    /// replace the pending payload rather than be dropped.
    fn carries_value(&self) -> bool {
        !matches!(self, EventKey::SelfWake(_))
    }
}

/// The data carried by a fired event.
#[derive(Debug, Clone, Copy)]
pub enum EventPayload {
    InputEdge { value: Value },
    SelfWake,
    InterconnectPropagate { value: Value },
}

/// A single scheduled event, as returned by `pop_due`.
#[derive(Debug, Clone)]
pub struct Event {
    pub due: Timestamp,
    pub seq: u64,
    pub key: EventKey,
    pub payload: EventPayload,
}

/// Internal heap entry; ordered earliest-due, then earliest-inserted first,
/// so `BinaryHeap<Reverse<_>>` behaves as the spec's min-priority queue with
/// FIFO tie-breaking within the same tick.
#[derive(Debug, Clone)]
struct HeapEntry {
    due: Timestamp,
    seq: u64,
    key: EventKey,
    payload: EventPayload,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due.cmp(&other.due).then_with(|| self.seq.cmp(&other.seq))
    }
}

/// The clock & event queue described in spec §4.1.
#[derive(Debug)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    /// For each key, the `(due, seq)` of the currently-authoritative entry.
    /// A heap entry whose `(due, seq)` doesn't match this map for its key
    /// is stale and is discarded when it surfaces.
    pending: HashMap<EventKey, (Timestamp, u64)>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    fn is_current(&self, entry: &HeapEntry) -> bool {
        self.pending.get(&entry.key) == Some(&(entry.due, entry.seq))
    }

    /// Schedule `payload` for `key` to fire at `due`.
    ///
    /// If a pending entry for `key` already exists: when it is strictly
    /// earlier than `due`, the new request is dropped (an earlier wake
    /// dominates a later one for the same key); otherwise the existing entry
    /// is superseded. For a key whose payload carries no value (`SelfWake`),
    /// "otherwise" includes the equal-`due` case, so two same-tick wakes
    /// collapse into a no-op drop. For a value-carrying key (`InputEdge`,
    /// `InterconnectPropagate`), an equal-`due` request still supersedes —
    /// it replaces the pending payload with the new value rather than
    /// keeping whichever happened to be scheduled first, since dropping it
    /// would silently keep a stale value in the queue (spec §4.3's
    /// "Pending → Pending' when a new edge supersedes the pending one").
    pub fn schedule(&mut self, due: Timestamp, key: EventKey, payload: EventPayload) {
        if let Some(&(existing_due, _)) = self.pending.get(&key) {
            if existing_due < due {
                return;
            }
            if existing_due == due && !key.carries_value() {
                return;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending.insert(key, (due, seq));
        self.heap.push(Reverse(HeapEntry {
            due,
            seq,
            key,
            payload,
        }));
    }

    /// Pop and return the earliest event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Event> {
        loop {
            {
                let top = &self.heap.peek()?.0;
                if top.due > now {
                    return None;
                }
            }
            let Reverse(entry) = self.heap.pop().expect("peeked non-empty heap");
            if self.is_current(&entry) {
                self.pending.remove(&entry.key);
                return Some(Event {
                    due: entry.due,
                    seq: entry.seq,
                    key: entry.key,
                    payload: entry.payload,
                });
            }
            // Stale (superseded or canceled) entry; discard and keep looking.
        }
    }

    /// The due time of the next live event, without removing it.
    pub fn peek_next(&mut self) -> Option<Timestamp> {
        loop {
            let entry = {
                let Reverse(top) = self.heap.peek()?;
                top.clone()
            };
            if self.is_current(&entry) {
                return Some(entry.due);
            }
            self.heap.pop();
        }
    }

    /// Remove all pending events targeting `target` (element deletion).
    pub fn cancel_for(&mut self, target: ElementId) {
        self.pending.retain(|key, _| !key.targets_element(target));
    }

    /// Remove the pending entry for `key`, if any.
    pub fn cancel_key(&mut self, key: EventKey) {
        self.pending.remove(&key);
    }

    /// Whether `key` currently has a live entry in the queue.
    pub fn has_pending(&self, key: EventKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// The set of keys currently pending, for invariant checks (spec §8 #2:
    /// "the pending-key index exactly matches the set of events in the
    /// queue").
    pub fn pending_keys(&self) -> impl Iterator<Item = &EventKey> {
        self.pending.keys()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ElementId {
        ElementId(n)
    }

    #[test]
    fn test_fifo_within_same_tick() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(5), EventKey::InputEdge(id(1), 0), EventPayload::InputEdge { value: Value::High });
        q.schedule(Timestamp(5), EventKey::InputEdge(id(2), 0), EventPayload::InputEdge { value: Value::Low });

        let first = q.pop_due(Timestamp(5)).unwrap();
        let second = q.pop_due(Timestamp(5)).unwrap();
        assert_eq!(first.key, EventKey::InputEdge(id(1), 0));
        assert_eq!(second.key, EventKey::InputEdge(id(2), 0));
    }

    #[test]
    fn test_self_wake_collapse_earlier_wins() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(10), EventKey::SelfWake(id(1)), EventPayload::SelfWake);
        q.schedule(Timestamp(7), EventKey::SelfWake(id(1)), EventPayload::SelfWake);

        assert_eq!(q.len(), 1);
        assert_eq!(q.peek_next(), Some(Timestamp(7)));

        let ev = q.pop_due(Timestamp(100)).unwrap();
        assert_eq!(ev.due, Timestamp(7));
        assert!(q.pop_due(Timestamp(100)).is_none());
    }

    #[test]
    fn test_self_wake_collapse_later_dropped() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(7), EventKey::SelfWake(id(1)), EventPayload::SelfWake);
        q.schedule(Timestamp(10), EventKey::SelfWake(id(1)), EventPayload::SelfWake);

        let ev = q.pop_due(Timestamp(100)).unwrap();
        assert_eq!(ev.due, Timestamp(7));
        assert!(q.is_empty());
    }

    #[test]
    fn test_input_edge_keys_do_not_collapse_across_ports() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(1), EventKey::InputEdge(id(1), 0), EventPayload::InputEdge { value: Value::High });
        q.schedule(Timestamp(1), EventKey::InputEdge(id(1), 1), EventPayload::InputEdge { value: Value::High });

        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_equal_due_input_edge_replaces_payload_instead_of_dropping() {
        // a gate whose two inputs both latch in the same tick schedules an
        // interconnect-propagate twice at the same `due`; the second
        // (final, correct) value must win, not be silently discarded.
        let mut q = EventQueue::new();
        q.schedule(
            Timestamp(5),
            EventKey::InputEdge(id(1), 0),
            EventPayload::InputEdge { value: Value::High },
        );
        q.schedule(
            Timestamp(5),
            EventKey::InputEdge(id(1), 0),
            EventPayload::InputEdge { value: Value::Low },
        );

        assert_eq!(q.len(), 1);
        let ev = q.pop_due(Timestamp(5)).unwrap();
        match ev.payload {
            EventPayload::InputEdge { value } => assert_eq!(value, Value::Low),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(q.pop_due(Timestamp(5)).is_none());
    }

    #[test]
    fn test_equal_due_interconnect_propagate_replaces_payload() {
        let mut q = EventQueue::new();
        q.schedule(
            Timestamp(3),
            EventKey::InterconnectPropagate(LineTreeId(1)),
            EventPayload::InterconnectPropagate { value: Value::High },
        );
        q.schedule(
            Timestamp(3),
            EventKey::InterconnectPropagate(LineTreeId(1)),
            EventPayload::InterconnectPropagate { value: Value::Low },
        );

        let ev = q.pop_due(Timestamp(3)).unwrap();
        match ev.payload {
            EventPayload::InterconnectPropagate { value } => assert_eq!(value, Value::Low),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_for_removes_all_of_an_element() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(1), EventKey::SelfWake(id(1)), EventPayload::SelfWake);
        q.schedule(Timestamp(2), EventKey::InputEdge(id(1), 0), EventPayload::InputEdge { value: Value::Low });
        q.schedule(Timestamp(3), EventKey::SelfWake(id(2)), EventPayload::SelfWake);

        q.cancel_for(id(1));

        assert_eq!(q.len(), 1);
        assert!(q.pop_due(Timestamp(100)).is_some());
        assert!(q.pop_due(Timestamp(100)).is_none());
    }

    #[test]
    fn test_pop_due_respects_now() {
        let mut q = EventQueue::new();
        q.schedule(Timestamp(50), EventKey::SelfWake(id(1)), EventPayload::SelfWake);
        assert!(q.pop_due(Timestamp(10)).is_none());
        assert!(q.pop_due(Timestamp(50)).is_some());
    }
}
