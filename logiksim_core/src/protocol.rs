//! Wire protocol between an editor/front-end and the controller: the
//! command channel in, and the update channel out (spec §5, §6).
//!
//! `Update` serializes exactly the way the original's tests expect —
//! `{"action": ..., "data": ...}` — see
//! `examples/original_source/src/tests/test_controller.py`, which asserts
//! on calls like `{'action': 'change', 'data': {...}}` coming out of
//! `ctrl.get_channel_out()`.

use crate::element::ElementId;
use crate::error::{CoreError, ErrorKind};
use crate::library::Guid;
use crate::linetree::{LineTreeId, Point};
use crate::metadata::Metadata;
use crate::signal::Value;
use serde::{Deserialize, Serialize};

/// A request sent into the controller's command channel (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum Command {
    CreateElement {
        guid: Guid,
        parent: Option<ElementId>,
        metadata: Metadata,
    },
    DeleteElement {
        element: ElementId,
    },
    UpdateMetadata {
        element: ElementId,
        delta: Metadata,
    },
    Connect {
        element: ElementId,
        port: usize,
        is_output: bool,
        path: Vec<Point>,
    },
    Disconnect {
        element: ElementId,
        port: usize,
        is_output: bool,
    },
    ScheduleEdge {
        element: ElementId,
        port: usize,
        value: Value,
        delay: u64,
    },
    EnumerateComponents,
    QueryProperties,
    SetProperties {
        rate: Option<f64>,
    },
    Quit,
}

/// A notification sent out of the controller's update channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Update {
    Created {
        element: ElementId,
        guid: Guid,
    },
    Deleted {
        element: ElementId,
    },
    Change {
        element: ElementId,
        metadata: Metadata,
    },
    Connected {
        element: ElementId,
        port: usize,
        is_output: bool,
        tree: LineTreeId,
    },
    Disconnected {
        element: ElementId,
        port: usize,
        is_output: bool,
    },
    Enumeration {
        components: Vec<(Guid, crate::library::MetadataSchema)>,
    },
    Properties {
        rate: Option<f64>,
        clock: u64,
        grid_spacing: u32,
        delay_per_gridpoint: u32,
    },
    /// A rejected command or a dropped event (spec §7): `kind` lets a
    /// front-end switch on the failure without matching `message` text, and
    /// `element` names the offending target when the error has one (a
    /// topology error like `MultipleDrivers` names none — its coordinates
    /// are already in `message`).
    Error {
        kind: ErrorKind,
        element: Option<ElementId>,
        message: String,
    },
}

impl Update {
    pub fn from_error(err: &CoreError) -> Self {
        Update::Error {
            kind: err.kind(),
            element: err.target_element(),
            message: err.to_string(),
        }
    }
}
