//! # AdEx Core
//!
//! Shared types for single-neuron Adaptive Exponential Integrate-and-Fire
//! (AdEx) simulation.
//!
//! ## Model
//!
//! ```text
//! C dV/dt     = -gL (V - EL) + gL ΔT exp((V - VT) / ΔT) - w + I(t)
//! tau_w dw/dt = a (V - EL) - w
//!
//! if V >= V_spike:  V <- V_reset,  w <- w + b
//! ```
//!
//! ## Units
//!
//! | Quantity | Unit |
//! |----------|------|
//! | Time | ms |
//! | Voltage | mV |
//! | Current | pA |
//! | Conductance | nS |
//! | Capacitance | pF |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Common errors
#[derive(Debug, Error)]
pub enum AdexError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Input current length {got} does not match n_steps {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AdexError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdexError>;

/// Time (ms)
pub type Time = f64;

/// Voltage (mV)
pub type Voltage = f64;

/// Current (pA)
pub type Current = f64;

/// Conductance (nS)
pub type Conductance = f64;

/// Capacitance (pF)
pub type Capacitance = f64;

/// Injected current used when none is given (pA)
pub const DEFAULT_INPUT_CURRENT: Current = 200.0;

// ============================================================================
// MODEL PARAMETERS
// ============================================================================

/// Parameters of one AdEx run.
///
/// Defaults describe an adapting regular spiker driven over one second at
/// 0.1 ms resolution. Missing fields in a JSON file fall back to these
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub duration: Time,       // Total simulated time T (ms)
    pub dt: Time,             // Euler step (ms)
    pub c_m: Capacitance,     // Membrane capacitance (pF)
    pub g_l: Conductance,     // Leak conductance (nS)
    pub e_l: Voltage,         // Leak reversal (mV)
    pub v_t: Voltage,         // Effective threshold (mV)
    pub delta_t: Voltage,     // Slope factor (mV)
    pub a: Conductance,       // Subthreshold adaptation (nS)
    pub tau_w: Time,          // Adaptation time constant (ms)
    pub b: Current,           // Spike-triggered adaptation (pA)
    pub v_reset: Voltage,     // Reset potential (mV)
    pub v_spike: Voltage,     // Spike cutoff (mV)
    /// Initial membrane potential (mV), `None` starts at `e_l`
    pub v0: Option<Voltage>,
    pub w0: Current,          // Initial adaptation current (pA)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: 1000.0,
            dt: 0.1,
            c_m: 200.0,
            g_l: 10.0,
            e_l: -70.0,
            v_t: -50.0,
            delta_t: 2.0,
            a: 2.0,
            tau_w: 200.0,
            b: 60.0,
            v_reset: -58.0,
            v_spike: 0.0,
            v0: None,
            w0: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Number of samples on the time grid: `round(T / dt)`
    pub fn n_steps(&self) -> usize {
        (self.duration / self.dt).round() as usize
    }

    /// Time of sample `i` (ms)
    pub fn time_at(&self, i: usize) -> Time {
        i as f64 * self.dt
    }

    pub fn initial_voltage(&self) -> Voltage {
        self.v0.unwrap_or(self.e_l)
    }

    /// Check the invariants the integrator relies on.
    ///
    /// `dt`, `duration`, `delta_t` and `tau_w` must be finite and strictly
    /// positive (NaN is rejected), and the grid must hold at least one
    /// sample.
    pub fn validate(&self) -> Result<()> {
        require_positive("dt", self.dt)?;
        require_positive("duration", self.duration)?;
        require_positive("delta_t", self.delta_t)?;
        require_positive("tau_w", self.tau_w)?;

        if self.n_steps() == 0 {
            return Err(AdexError::invalid(
                "duration",
                format!(
                    "duration {} ms is shorter than half a step (dt = {} ms)",
                    self.duration, self.dt
                ),
            ));
        }

        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&contents)
            .map_err(|e| AdexError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded simulation config");
        Ok(config)
    }

    /// Write this configuration as pretty-printed JSON, creating parent
    /// directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AdexError::ConfigError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(AdexError::invalid(
            name,
            format!("must be finite and > 0, got {}", value),
        ))
    }
}

// ============================================================================
// INPUT CURRENT
// ============================================================================

/// External drive, decided once at the call boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputCurrent {
    /// Same current at every step (pA)
    Constant(Current),
    /// One value per sample, length must equal `n_steps`
    PerStep(Vec<Current>),
}

impl Default for InputCurrent {
    fn default() -> Self {
        Self::Constant(DEFAULT_INPUT_CURRENT)
    }
}

impl From<Current> for InputCurrent {
    fn from(value: Current) -> Self {
        Self::Constant(value)
    }
}

impl From<Vec<Current>> for InputCurrent {
    fn from(values: Vec<Current>) -> Self {
        Self::PerStep(values)
    }
}

impl InputCurrent {
    /// Rectangular pulse of `amplitude` pA on `[start, stop)` ms, zero
    /// elsewhere.
    pub fn dc_pulse(config: &SimulationConfig, amplitude: Current, start: Time, stop: Time) -> Self {
        let values = (0..config.n_steps())
            .map(|i| {
                let t = config.time_at(i);
                if t >= start && t < stop {
                    amplitude
                } else {
                    0.0
                }
            })
            .collect();
        Self::PerStep(values)
    }

    /// Linear ramp from `from` pA at the first sample to `to` pA at the last.
    pub fn ramp(config: &SimulationConfig, from: Current, to: Current) -> Self {
        let n = config.n_steps();
        let span = n.saturating_sub(1).max(1) as f64;
        let values = (0..n)
            .map(|i| from + (to - from) * i as f64 / span)
            .collect();
        Self::PerStep(values)
    }

    /// Reject sequences whose length differs from `n_steps`.
    pub fn check_shape(&self, n_steps: usize) -> Result<()> {
        match self {
            Self::Constant(_) => Ok(()),
            Self::PerStep(values) if values.len() == n_steps => Ok(()),
            Self::PerStep(values) => Err(AdexError::ShapeMismatch {
                expected: n_steps,
                got: values.len(),
            }),
        }
    }

    /// Current at sample `i`. Sequences must already have passed
    /// [`check_shape`](Self::check_shape).
    #[inline]
    pub fn at(&self, i: usize) -> Current {
        match self {
            Self::Constant(value) => *value,
            Self::PerStep(values) => values[i],
        }
    }
}
