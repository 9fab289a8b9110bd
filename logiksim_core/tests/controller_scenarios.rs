//! End-to-end controller scenarios, one per spec §8 walkthrough.

use logiksim_core::config::SimulationConfig;
use logiksim_core::controller::Controller;
use logiksim_core::library::Guid;
use logiksim_core::linetree::Point;
use logiksim_core::metadata::Metadata;
use logiksim_core::protocol::Update;
use logiksim_core::signal::Value;

fn drain(rx: &crossbeam_channel::Receiver<Update>) -> Vec<Update> {
    let mut out = Vec::new();
    while let Ok(u) = rx.try_recv() {
        out.push(u);
    }
    out
}

#[test]
fn scenario_single_and_gate() {
    let (mut ctrl, _tx, rx) = Controller::new(SimulationConfig::default());
    let and = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();

    ctrl.connect(and, 0, false, vec![Point::new(0, 0), Point::new(0, 1)])
        .unwrap();
    ctrl.connect(and, 1, false, vec![Point::new(1, 0), Point::new(1, 1)])
        .unwrap();
    ctrl.connect(and, 0, true, vec![Point::new(2, 0), Point::new(2, 1)])
        .unwrap();
    drain(&rx);

    ctrl.schedule_edge(and, 0, Value::High, 0).unwrap();
    ctrl.schedule_edge(and, 1, Value::High, 0).unwrap();
    ctrl.process(1);

    // Both inputs high should have driven the output tree at least once;
    // we can't observe the output tree's value directly without a probe
    // element, so this mainly asserts the scenario runs to completion
    // without a fatal error update.
    assert!(!drain(&rx).iter().any(|u| matches!(u, Update::Error { .. })));
}

#[test]
fn scenario_interconnect_with_two_sinks() {
    let (mut ctrl, _tx, rx) = Controller::new(SimulationConfig {
        grid_spacing: 1,
        delay_per_gridpoint: 1,
        ..SimulationConfig::default()
    });

    let src = ctrl
        .create_element(Guid::new("core/or"), None, Metadata::new())
        .unwrap();
    let sink_a = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    let sink_b = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    drain(&rx);

    ctrl.connect(src, 0, true, vec![Point::new(0, 0), Point::new(10, 0)])
        .unwrap();
    ctrl.connect(sink_a, 0, false, vec![Point::new(3, 0), Point::new(0, 0)])
        .unwrap();
    ctrl.connect(sink_b, 0, false, vec![Point::new(10, 0), Point::new(7, 0)])
        .unwrap();
    drain(&rx);

    // drive the or-gate's output tree directly to check fan-out delay
    ctrl.schedule_edge(src, 0, Value::High, 0).unwrap();
    ctrl.process(20);

    assert!(ctrl.clock().as_u64() >= 20);
}

#[test]
fn scenario_driver_reattachment_is_rejected_once_set() {
    let (mut ctrl, _tx, _rx) = Controller::new(SimulationConfig::default());
    let a = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    let b = ctrl
        .create_element(Guid::new("core/or"), None, Metadata::new())
        .unwrap();

    ctrl.connect(a, 0, true, vec![Point::new(0, 0), Point::new(5, 0)])
        .unwrap();
    let result = ctrl.connect(b, 0, true, vec![Point::new(0, 0), Point::new(5, 0)]);
    assert!(result.is_err());
}

#[test]
fn scenario_delete_cancels_pending_events() {
    let (mut ctrl, _tx, rx) = Controller::new(SimulationConfig::default());
    let and = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    drain(&rx);

    ctrl.schedule_edge(and, 0, Value::High, 100).unwrap();
    ctrl.delete_element(and).unwrap();
    ctrl.process(200);

    // the element is gone, so dispatching its (now-canceled) event must not
    // panic or resurrect it
    assert!(ctrl.top_level_elements().is_empty());
}

#[test]
fn scenario_merge_two_disjoint_trees_via_bridging_connect() {
    let (mut ctrl, _tx, _rx) = Controller::new(SimulationConfig::default());
    let src = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    let far_sink = ctrl
        .create_element(Guid::new("core/or"), None, Metadata::new())
        .unwrap();
    let bridge_sink = ctrl
        .create_element(Guid::new("core/or"), None, Metadata::new())
        .unwrap();

    // two entirely separate interconnects, built from unrelated ports
    ctrl.connect(src, 0, true, vec![Point::new(0, 0), Point::new(5, 0)])
        .unwrap();
    ctrl.connect(far_sink, 0, false, vec![Point::new(20, 0), Point::new(15, 0)])
        .unwrap();
    assert_eq!(ctrl.tree_count(), 2);

    // a third wire whose path happens to land on a point from each existing
    // tree should fold them into a single shared interconnect
    ctrl.connect(
        bridge_sink,
        0,
        false,
        vec![Point::new(5, 0), Point::new(20, 0)],
    )
    .unwrap();

    assert_eq!(ctrl.tree_count(), 1);
}

#[test]
fn scenario_merge_then_split() {
    let (mut ctrl, _tx, _rx) = Controller::new(SimulationConfig::default());
    let src = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    let sink = ctrl
        .create_element(Guid::new("core/or"), None, Metadata::new())
        .unwrap();

    // build an L-shaped tree in two separate `connect` calls that share a
    // bend point, then attach sink beyond the bend
    ctrl.connect(src, 0, true, vec![Point::new(0, 0), Point::new(0, 5)])
        .unwrap();
    ctrl.connect(
        sink,
        0,
        false,
        vec![Point::new(0, 5), Point::new(5, 5), Point::new(5, 0)],
    )
    .unwrap();

    ctrl.disconnect(sink, 0, false).unwrap();
    // re-attaching after disconnect should succeed against the same tree
    ctrl.connect(
        sink,
        0,
        false,
        vec![Point::new(0, 5), Point::new(5, 5), Point::new(5, 0)],
    )
    .unwrap();
}

#[test]
fn scenario_disconnect_one_input_leaves_sibling_input_connected() {
    // a two-input gate with both inputs wired into the same interconnect;
    // disconnecting one must not silently disconnect the other (spec §6
    // scopes `disconnect` to a single port).
    let (mut ctrl, _tx, rx) = Controller::new(SimulationConfig::default());
    let and = ctrl
        .create_element(Guid::new("core/and"), None, Metadata::new())
        .unwrap();
    drain(&rx);

    ctrl.connect(and, 0, false, vec![Point::new(0, 0), Point::new(0, 5)])
        .unwrap();
    ctrl.connect(and, 1, false, vec![Point::new(0, 5), Point::new(5, 5)])
        .unwrap();
    drain(&rx);

    ctrl.disconnect(and, 0, false).unwrap();

    // port 1 should still be reachable through the (still intact) tree
    ctrl.schedule_edge(and, 1, Value::High, 0).unwrap();
    ctrl.process(5);
    assert!(!drain(&rx).iter().any(|u| matches!(u, Update::Error { .. })));

    // port 0 is gone: reconnecting it must succeed without a stale sink
    // from before the disconnect still occupying the slot
    ctrl.connect(and, 0, false, vec![Point::new(0, 0), Point::new(0, 5)])
        .unwrap();
}
