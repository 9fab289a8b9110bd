//! Core error types.
//!
//! Mirrors the teacher's `CircFormatError` / `CliError` shape: one
//! `thiserror`-derived enum with a variant per failure kind from spec §7,
//! plus a result alias.

use crate::element::ElementId;
use crate::library::Guid;
use crate::linetree::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the simulation core.
///
/// Everything except [`CoreError::Fatal`] is reported (turned into an
/// `error` update, see `protocol::Update`) and the core keeps running.
/// A `Fatal` error means an internal invariant was violated after a
/// command had already passed validation; the core loop stops.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid command: {message}")]
    InvalidCommand {
        message: String,
        /// The command's target element, if it named one — `None` only
        /// when the command had nothing to attach the error to (spec §7:
        /// such errors are logged and dropped rather than emitted).
        element: Option<ElementId>,
    },

    #[error("unknown element: {0}")]
    UnknownElement(ElementId),

    #[error("port {port} out of range for element {element} (has {count} ports)")]
    PortOutOfRange {
        element: ElementId,
        port: usize,
        count: usize,
    },

    #[error("interconnect already has a driver")]
    MultipleDrivers { point: Point },

    #[error("attach point {point:?} is not part of the interconnect")]
    DisjointAttach { point: Point },

    #[error("trees share more than one point, cannot merge unambiguously")]
    AmbiguousMerge,

    #[error("component library has no factory registered for GUID {0}")]
    LibraryMissing(Guid),

    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

/// Convenience alias, matching the teacher's `CircResult<T>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Stable tag for a [`CoreError`] variant, carried on `Update::Error` so a
/// front-end can switch on failure kind instead of matching `message`
/// strings (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCommand,
    UnknownElement,
    PortOutOfRange,
    MultipleDrivers,
    DisjointAttach,
    AmbiguousMerge,
    LibraryMissing,
    Fatal,
}

impl CoreError {
    /// Whether this error should stop the core loop (§7 propagation policy).
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Fatal(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidCommand { .. } => ErrorKind::InvalidCommand,
            CoreError::UnknownElement(_) => ErrorKind::UnknownElement,
            CoreError::PortOutOfRange { .. } => ErrorKind::PortOutOfRange,
            CoreError::MultipleDrivers { .. } => ErrorKind::MultipleDrivers,
            CoreError::DisjointAttach { .. } => ErrorKind::DisjointAttach,
            CoreError::AmbiguousMerge => ErrorKind::AmbiguousMerge,
            CoreError::LibraryMissing(_) => ErrorKind::LibraryMissing,
            CoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// The element this error should be attached to, if any (spec §7:
    /// `UnknownElement`/`PortOutOfRange` are "surfaced with error{kind, id}",
    /// `InvalidCommand` "as a change update ... on the offending target").
    /// Topology errors (`MultipleDrivers`/`DisjointAttach`/`AmbiguousMerge`)
    /// and `LibraryMissing` name no element — spec §7 surfaces those with
    /// the attempted coordinates or GUID instead, already present in
    /// `message`.
    pub fn target_element(&self) -> Option<ElementId> {
        match self {
            CoreError::InvalidCommand { element, .. } => *element,
            CoreError::UnknownElement(id) => Some(*id),
            CoreError::PortOutOfRange { element, .. } => Some(*element),
            _ => None,
        }
    }
}
