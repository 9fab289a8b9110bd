//! # LogikSim Core
//!
//! Core discrete-event simulation kernel for digital logic circuits. This
//! crate provides the clock & event queue, the element/interconnect model,
//! and the controller that drives them; it owns no file format, no
//! schematic canvas, and no process lifecycle beyond start/stop — those
//! are a front-end's concern.
//!
//! ## Architecture
//!
//! - [`signal`] — two-valued logic ([`signal::Value`]) and simulated time
//!   ([`signal::Timestamp`])
//! - [`event`] — the min-priority [`event::EventQueue`], keyed so at most
//!   one event is ever pending per `(target, kind)`
//! - [`library`] — [`library::ComponentLibrary`], the GUID → factory
//!   registry new elements are instantiated from
//! - [`element`] — the [`element::Element`] trait and its built-in
//!   implementations (the boolean gates in [`element::gates`], and
//!   [`element::compound::CompoundElement`] for sub-circuits)
//! - [`linetree`] — [`linetree::LineTree`], the rooted interconnect tree
//!   that fans a driver's value out to its sinks with per-sink delay
//! - [`controller`] — [`controller::Controller`], which owns every element
//!   and interconnect and runs the core loop
//! - [`protocol`] — the [`protocol::Command`] / [`protocol::Update`] wire
//!   types exchanged over the controller's channels
//! - [`error`] — [`error::CoreError`] / [`error::CoreResult`]
//! - [`metadata`] — the opaque, JSON-shaped per-element metadata map
//! - [`config`] — [`config::SimulationConfig`]
//!
//! ## Example
//!
//! ```
//! use logiksim_core::config::SimulationConfig;
//! use logiksim_core::controller::Controller;
//! use logiksim_core::library::Guid;
//! use logiksim_core::metadata::Metadata;
//!
//! let (mut ctrl, _commands, _updates) = Controller::new(SimulationConfig::default());
//! let and_gate = ctrl
//!     .create_element(Guid::new("core/and"), None, Metadata::new())
//!     .expect("core/and is a standard element");
//! ctrl.process(0);
//! ```

pub mod config;
pub mod controller;
pub mod element;
pub mod error;
pub mod event;
pub mod library;
pub mod linetree;
pub mod metadata;
pub mod protocol;
pub mod signal;

pub use config::SimulationConfig;
pub use controller::Controller;
pub use element::{Element, ElementId, ElementResponse};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use event::{Event, EventKey, EventPayload, EventQueue};
pub use library::{ComponentLibrary, Factory, Guid};
pub use linetree::{LineTree, LineTreeId, Point};
pub use metadata::Metadata;
pub use protocol::{Command, Update};
pub use signal::{Timestamp, Value};
