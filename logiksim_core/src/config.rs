//! Runtime configuration for a controller instance (ambient stack, spec
//! extension in `SPEC_FULL.md` §10.3) — the knobs that determine how long
//! and how fast the core loop runs, and the grid units interconnects are
//! measured in.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::controller::Controller`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Stop the core loop once the clock would advance past this tick, if
    /// set. `None` means run until commanded to quit.
    pub max_time: Option<u64>,

    /// Stop the core loop after dispatching this many events, if set.
    pub max_events: Option<u64>,

    /// Ticks of simulated time per wall-clock second when running in
    /// real-time mode; `None` runs as fast as possible.
    pub simulation_rate: Option<f64>,

    /// Grid unit interconnect delays are measured in (spec §4.4: `δ(s)` is
    /// Manhattan length divided by this, times `delay_per_gridpoint`).
    pub grid_spacing: u32,

    /// Ticks of propagation delay per grid point on an interconnect.
    pub delay_per_gridpoint: u32,

    /// Verbose debug logging of every dispatched event.
    pub debug: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_time: None,
            max_events: None,
            simulation_rate: None,
            grid_spacing: 1,
            delay_per_gridpoint: 1,
            debug: false,
        }
    }
}
