//! # ADEX-SIM: Single-Neuron AdEx Simulator
//!
//! Fixed-step simulation of the Adaptive Exponential Integrate-and-Fire
//! neuron (Brette & Gerstner, 2005).
//!
//! Key features:
//! - Explicit Euler integration of the coupled (V, w) system
//! - Spike/reset rule applied as a discrete jump, never as an Euler step
//! - Overflow-safe exponential spike-initiation term
//! - Steady-state firing rate over a trailing window
//! - F-I curve sweeps, sequential or fanned out over rayon
//! - Preset experiments (non-adapting, adapting, bursting)

use adex_core::{Current, InputCurrent, Result, SimulationConfig, Time, Voltage};
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Cap on the exponent of the spike-initiation term, just below
/// `ln(f64::MAX)` so `exp` stays finite.
const EXP_ARG_MAX: f64 = 709.0;

// ============================================================================
// TRACE
// ============================================================================

/// Output of one integration run.
///
/// `t`, `v` and `w` share the same grid: index `i` is time `i * dt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub t: Vec<Time>,
    pub v: Vec<Voltage>,
    pub w: Vec<Current>,
    /// Pre-reset sample times of every detected spike (ms)
    pub spike_times: Vec<Time>,
    /// Simulated duration T (ms)
    pub duration: Time,
}

impl Trace {
    pub fn n_steps(&self) -> usize {
        self.t.len()
    }

    pub fn spike_count(&self) -> usize {
        self.spike_times.len()
    }

    /// Firing rate (Hz) over the last `window` ms of the run
    pub fn firing_rate(&self, window: Time) -> f64 {
        firing_rate(&self.spike_times, self.duration, window)
    }

    pub fn mean_firing_rate(&self) -> f64 {
        mean_firing_rate(&self.spike_times, self.duration)
    }

    pub fn interspike_intervals(&self) -> Vec<Time> {
        interspike_intervals(&self.spike_times)
    }

    pub fn cv_isi(&self) -> f64 {
        cv_isi(&self.spike_times)
    }

    /// Last sampled (V, w)
    pub fn final_state(&self) -> Option<(Voltage, Current)> {
        Some((*self.v.last()?, *self.w.last()?))
    }
}

// ============================================================================
// INTEGRATOR
// ============================================================================

/// Right-hand side of the AdEx system at one sample: `(dV/dt, dw/dt)`.
#[inline]
pub fn derivatives(config: &SimulationConfig, v: Voltage, w: Current, i_ext: Current) -> (f64, f64) {
    let exp_term = ((v - config.v_t) / config.delta_t).min(EXP_ARG_MAX).exp();

    let dv = (-config.g_l * (v - config.e_l)
        + config.g_l * config.delta_t * exp_term
        - w
        + i_ext)
        / config.c_m;
    let dw = (config.a * (v - config.e_l) - w) / config.tau_w;

    (dv, dw)
}

/// Integrate one neuron over `round(T / dt)` samples.
///
/// Each step either applies the spike/reset jump (when the current sample is
/// at or above `v_spike`) or one explicit Euler step. A spike sample is
/// clamped to `v_spike` in the returned trace, and its time is recorded
/// before the reset.
///
/// # Errors
///
/// [`adex_core::AdexError::InvalidParameter`] for non-positive `dt`,
/// `duration`, `delta_t` or `tau_w`; [`adex_core::AdexError::ShapeMismatch`] when a per-step input
/// does not have exactly `n_steps` values. Both are reported before anything
/// is allocated.
pub fn run(config: &SimulationConfig, input: &InputCurrent) -> Result<Trace> {
    config.validate()?;
    let n_steps = config.n_steps();
    input.check_shape(n_steps)?;

    let t: Vec<Time> = (0..n_steps).map(|i| config.time_at(i)).collect();
    let mut v = vec![0.0; n_steps];
    let mut w = vec![0.0; n_steps];
    let mut spike_times = Vec::new();

    v[0] = config.initial_voltage();
    w[0] = config.w0;

    for i in 0..n_steps - 1 {
        if v[i] >= config.v_spike {
            v[i] = config.v_spike;
            v[i + 1] = config.v_reset;
            w[i + 1] = w[i] + config.b;
            spike_times.push(t[i]);
            trace!(t = t[i], w = w[i + 1], "spike");
            continue;
        }

        let (dv, dw) = derivatives(config, v[i], w[i], input.at(i));

        // Runaway growth saturates at the cutoff; the next step resets it.
        let v_next = v[i] + config.dt * dv;
        v[i + 1] = if v_next.is_finite() { v_next } else { config.v_spike };
        w[i + 1] = w[i] + config.dt * dw;
    }

    debug!(
        n_steps,
        spikes = spike_times.len(),
        v_final = v[n_steps - 1],
        w_final = w[n_steps - 1],
        "integration finished"
    );

    Ok(Trace {
        t,
        v,
        w,
        spike_times,
        duration: config.duration,
    })
}

// ============================================================================
// RATE ESTIMATION
// ============================================================================

/// Steady-state firing rate (Hz) over the trailing window
/// `(duration - window, duration]`.
///
/// A non-positive (or NaN) `window` means "no window" and yields `0.0`, as
/// does an empty spike list.
pub fn firing_rate(spike_times: &[Time], duration: Time, window: Time) -> f64 {
    if spike_times.is_empty() {
        return 0.0;
    }
    if !(window > 0.0) {
        return 0.0;
    }

    let window_start = duration - window;
    let n_spikes = spike_times
        .iter()
        .filter(|&&s| s > window_start && s <= duration)
        .count();

    n_spikes as f64 / (window / 1000.0)
}

/// Whole-run rate (Hz)
pub fn mean_firing_rate(spike_times: &[Time], duration: Time) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    spike_times.len() as f64 / (duration / 1000.0)
}

pub fn interspike_intervals(spike_times: &[Time]) -> Vec<Time> {
    spike_times.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Coefficient of variation of the inter-spike intervals
pub fn cv_isi(spike_times: &[Time]) -> f64 {
    if spike_times.len() < 2 {
        return 0.0;
    }

    let isis = interspike_intervals(spike_times);
    let mean = isis.iter().sum::<f64>() / isis.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = isis.iter()
        .map(|&x| (x - mean).powi(2))
        .sum::<f64>() / isis.len() as f64;

    variance.sqrt() / mean
}

// ============================================================================
// F-I SWEEPS
// ============================================================================

/// One point of an F-I curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiPoint {
    pub current: Current,   // Injected current (pA)
    pub rate: f64,          // Steady-state rate (Hz)
    pub spike_count: usize, // Spikes over the whole run
}

/// Firing rate against injected current, in sweep order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiCurve {
    /// Trailing window used for every rate (ms)
    pub window: Time,
    pub points: Vec<FiPoint>,
}

impl FiCurve {
    pub fn currents(&self) -> Array1<f64> {
        self.points.iter().map(|p| p.current).collect()
    }

    pub fn rates(&self) -> Array1<f64> {
        self.points.iter().map(|p| p.rate).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// `n` evenly spaced currents from `start` to `stop`, both included
pub fn linspace_currents(start: Current, stop: Current, n: usize) -> Vec<Current> {
    Array1::linspace(start, stop, n).to_vec()
}

fn fi_point(config: &SimulationConfig, current: Current, window: Time) -> Result<FiPoint> {
    let trace = run(config, &InputCurrent::Constant(current))?;
    Ok(FiPoint {
        current,
        rate: trace.firing_rate(window),
        spike_count: trace.spike_count(),
    })
}

/// Sweep constant currents with one shared config.
///
/// The config is checked once up front; an invalid config aborts the sweep
/// before any point runs.
pub fn fi_curve(config: &SimulationConfig, currents: &[Current], window: Time) -> Result<FiCurve> {
    fi_curve_with_progress(config, currents, window, |_| {})
}

/// Same as [`fi_curve`], calling `on_point` after each point completes.
pub fn fi_curve_with_progress<F>(
    config: &SimulationConfig,
    currents: &[Current],
    window: Time,
    mut on_point: F,
) -> Result<FiCurve>
where
    F: FnMut(&FiPoint),
{
    config.validate()?;

    let mut points = Vec::with_capacity(currents.len());
    for &current in currents {
        let point = fi_point(config, current, window)?;
        info!(current, rate = point.rate, spikes = point.spike_count, "F-I point");
        on_point(&point);
        points.push(point);
    }

    Ok(FiCurve { window, points })
}

/// Parallel [`fi_curve`]. Every point is an independent run, so the output
/// is identical to the sequential sweep, in the same order.
pub fn fi_curve_parallel(config: &SimulationConfig, currents: &[Current], window: Time) -> Result<FiCurve> {
    config.validate()?;

    let points = currents
        .par_iter()
        .map(|&current| fi_point(config, current, window))
        .collect::<Result<Vec<_>>>()?;
    info!(points = points.len(), window, "parallel F-I sweep finished");

    Ok(FiCurve { window, points })
}

/// Sweep arbitrary (possibly time-varying) inputs with one shared config.
///
/// A config error aborts the whole sweep. A bad input only fails its own
/// slot; the remaining inputs still run.
pub fn sweep_inputs(
    config: &SimulationConfig,
    inputs: &[InputCurrent],
    window: Time,
) -> Result<Vec<Result<f64>>> {
    config.validate()?;

    let rates = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| match run(config, input) {
            Ok(trace) => Ok(trace.firing_rate(window)),
            Err(e) => {
                warn!(index, error = %e, "sweep point failed");
                Err(e)
            }
        })
        .collect();

    Ok(rates)
}

// ============================================================================
// EXPERIMENTS
// ============================================================================

/// Standard single-neuron experiments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Experiment {
    /// EIF-like spiking without adaptation (a = 0, b = 0)
    NonAdapting,
    /// Regular spiker with spike-frequency adaptation
    Adapting,
    /// Strong, slow adaptation; a starting point for burst exploration
    Bursting,
}

impl Experiment {
    pub fn all() -> &'static [Self] {
        &[Self::NonAdapting, Self::Adapting, Self::Bursting]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NonAdapting => "non-adapting",
            Self::Adapting => "adapting",
            Self::Bursting => "bursting",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|e| e.name() == name)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::NonAdapting => "AdEx: Non-adapting EIF (a=0, b=0)",
            Self::Adapting => "AdEx: Spike-Frequency Adaptation",
            Self::Bursting => "AdEx: Example bursting regime",
        }
    }

    /// Output file name without extension
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::NonAdapting => "adex_non_adapting",
            Self::Adapting => "adex_adapting",
            Self::Bursting => "adex_bursting",
        }
    }

    pub fn config(&self) -> SimulationConfig {
        match self {
            Self::NonAdapting => SimulationConfig {
                duration: 1000.0,
                dt: 0.1,
                a: 0.0,
                b: 0.0,
                ..Default::default()
            },
            Self::Adapting => SimulationConfig {
                duration: 1000.0,
                dt: 0.1,
                a: 2.0,
                tau_w: 200.0,
                b: 60.0,
                ..Default::default()
            },
            Self::Bursting => SimulationConfig {
                duration: 1500.0,
                dt: 0.1,
                a: 4.0,
                tau_w: 300.0,
                b: 120.0,
                delta_t: 2.0,
                ..Default::default()
            },
        }
    }

    pub fn input(&self) -> InputCurrent {
        match self {
            Self::NonAdapting | Self::Adapting => InputCurrent::Constant(250.0),
            Self::Bursting => InputCurrent::Constant(200.0),
        }
    }

    pub fn run(&self) -> Result<Trace> {
        let trace = run(&self.config(), &self.input())?;
        info!(experiment = self.name(), spikes = trace.spike_count(), "experiment finished");
        Ok(trace)
    }
}

/// F-I protocol for an adapting neuron: long runs so adaptation settles,
/// rate taken over the final window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiProtocol {
    pub config: SimulationConfig,
    pub currents: Vec<Current>,
    pub window: Time,
}

impl Default for FiProtocol {
    fn default() -> Self {
        Self {
            config: SimulationConfig {
                duration: 2000.0,
                dt: 0.1,
                a: 2.0,
                tau_w: 200.0,
                b: 60.0,
                ..Default::default()
            },
            currents: linspace_currents(0.0, 400.0, 21),
            window: 500.0,
        }
    }
}

impl FiProtocol {
    pub fn run(&self) -> Result<FiCurve> {
        fi_curve(&self.config, &self.currents, self.window)
    }

    pub fn run_parallel(&self) -> Result<FiCurve> {
        fi_curve_parallel(&self.config, &self.currents, self.window)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use adex_core::AdexError;

    fn short_config(duration: Time) -> SimulationConfig {
        SimulationConfig { duration, ..Default::default() }
    }

    #[test]
    fn test_reference_scenario() {
        let config = short_config(500.0);
        let trace = run(&config, &InputCurrent::Constant(250.0)).unwrap();

        assert_eq!(trace.n_steps(), 5000);
        assert_eq!(trace.v.len(), 5000);
        assert_eq!(trace.w.len(), 5000);
        assert!((trace.t[4999] - 499.9).abs() < 1e-9);
        assert!(trace.spike_count() >= 1);

        for &s in &trace.spike_times {
            assert!(s < 500.0);
            let k = (s / config.dt).round();
            assert!((k * config.dt - s).abs() < 1e-9, "spike {} is off the grid", s);
        }
        for pair in trace.spike_times.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_time_grid() {
        let trace = run(&short_config(10.0), &InputCurrent::default()).unwrap();
        for (i, &t) in trace.t.iter().enumerate() {
            assert!((t - i as f64 * 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_spike_reset_rule() {
        let config = short_config(500.0);
        let trace = run(&config, &InputCurrent::Constant(250.0)).unwrap();

        for &s in &trace.spike_times {
            let i = (s / config.dt).round() as usize;
            assert_eq!(trace.v[i], config.v_spike);
            assert_eq!(trace.v[i + 1], config.v_reset);
            assert!((trace.w[i + 1] - (trace.w[i] + config.b)).abs() < 1e-12);
        }

        // Every other sample stays below the cutoff except possibly the last,
        // which is never examined by the spike rule.
        let spike_idx: Vec<usize> = trace.spike_times.iter()
            .map(|&s| (s / config.dt).round() as usize)
            .collect();
        for i in 0..trace.n_steps() - 1 {
            if !spike_idx.contains(&i) {
                assert!(trace.v[i] < config.v_spike);
            }
        }
    }

    #[test]
    fn test_spike_at_first_step() {
        let config = SimulationConfig {
            duration: 10.0,
            v0: Some(5.0),
            w0: 3.0,
            ..Default::default()
        };
        let trace = run(&config, &InputCurrent::Constant(0.0)).unwrap();

        assert_eq!(trace.spike_times[0], 0.0);
        assert_eq!(trace.v[0], config.v_spike);
        assert_eq!(trace.v[1], config.v_reset);
        assert_eq!(trace.w[1], 3.0 + config.b);
    }

    #[test]
    fn test_initial_conditions() {
        let trace = run(&short_config(5.0), &InputCurrent::Constant(0.0)).unwrap();
        assert_eq!(trace.v[0], -70.0);
        assert_eq!(trace.w[0], 0.0);

        let config = SimulationConfig { duration: 5.0, v0: Some(-65.0), w0: 12.0, ..Default::default() };
        let trace = run(&config, &InputCurrent::Constant(0.0)).unwrap();
        assert_eq!(trace.v[0], -65.0);
        assert_eq!(trace.w[0], 12.0);
    }

    #[test]
    fn test_single_sample_run() {
        let config = SimulationConfig { duration: 0.1, v0: Some(5.0), ..Default::default() };
        let trace = run(&config, &InputCurrent::Constant(0.0)).unwrap();
        assert_eq!(trace.n_steps(), 1);
        assert_eq!(trace.v, vec![5.0]);
        assert!(trace.spike_times.is_empty());
    }

    #[test]
    fn test_runs_every_step() {
        // Subthreshold drive never spikes, so every sample comes from an Euler step.
        let config = short_config(200.0);
        let trace = run(&config, &InputCurrent::Constant(100.0)).unwrap();

        assert_eq!(trace.spike_count(), 0);
        assert!(trace.v.iter().skip(1).all(|&v| v != 0.0));
        assert!(trace.v[trace.n_steps() - 1] > trace.v[0]);
        assert!(trace.w[trace.n_steps() - 1] > 0.0);
    }

    #[test]
    fn test_resting_state_is_stationary() {
        // At EL with no drive only the tiny exponential term moves V.
        let config = short_config(100.0);
        let (dv, dw) = derivatives(&config, config.e_l, 0.0, 0.0);
        let expected = config.g_l * config.delta_t * (-10.0f64).exp() / config.c_m;
        assert!((dv - expected).abs() < 1e-15);
        assert_eq!(dw, 0.0);
    }

    #[test]
    fn test_non_adapting_keeps_w() {
        let config = SimulationConfig { a: 0.0, b: 0.0, ..Default::default() };
        let trace = run(&config, &InputCurrent::Constant(250.0)).unwrap();

        assert!(trace.spike_count() > 0);
        assert!(trace.w.iter().all(|&w| w == config.w0));
    }

    #[test]
    fn test_spike_count_monotone_in_current() {
        let config = SimulationConfig::default();
        let counts: Vec<usize> = [0.0, 100.0, 200.0, 300.0, 400.0, 500.0]
            .iter()
            .map(|&i| run(&config, &InputCurrent::Constant(i)).unwrap().spike_count())
            .collect();

        assert_eq!(counts[0], 0);
        for pair in counts.windows(2) {
            assert!(pair[1] >= pair[0], "F-I not monotone: {:?}", counts);
        }
        assert!(counts[5] > counts[0]);
    }

    #[test]
    fn test_idempotent() {
        let config = short_config(300.0);
        let input = InputCurrent::Constant(300.0);
        let first = run(&config, &input).unwrap();
        let second = run(&config, &input).unwrap();

        let bits = |xs: &[f64]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first.v), bits(&second.v));
        assert_eq!(bits(&first.w), bits(&second.w));
        assert_eq!(first.spike_times, second.spike_times);
    }

    #[test]
    fn test_shape_contract() {
        let config = short_config(100.0);
        let n = config.n_steps();

        match run(&config, &InputCurrent::PerStep(vec![250.0; n - 1])) {
            Err(AdexError::ShapeMismatch { expected, got }) => {
                assert_eq!(expected, n);
                assert_eq!(got, n - 1);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }

        let per_step = run(&config, &InputCurrent::PerStep(vec![250.0; n])).unwrap();
        let constant = run(&config, &InputCurrent::Constant(250.0)).unwrap();
        assert_eq!(per_step, constant);
    }

    #[test]
    fn test_invalid_parameters() {
        let bad = [
            SimulationConfig { dt: 0.0, ..Default::default() },
            SimulationConfig { duration: 0.0, ..Default::default() },
            SimulationConfig { delta_t: -2.0, ..Default::default() },
            SimulationConfig { tau_w: 0.0, ..Default::default() },
        ];
        for config in &bad {
            assert!(matches!(
                run(config, &InputCurrent::default()),
                Err(AdexError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_time_varying_input() {
        let config = short_config(300.0);
        let pulse = InputCurrent::dc_pulse(&config, 400.0, 100.0, 200.0);
        let trace = run(&config, &pulse).unwrap();

        assert!(trace.spike_count() > 0);
        assert!(trace.spike_times.iter().all(|&s| s > 100.0 && s < 220.0));
    }

    #[test]
    fn test_exponential_overflow_saturates() {
        // exp((500 - VT) / 0.5) overflows even after the exponent is capped.
        let config = SimulationConfig {
            duration: 5.0,
            delta_t: 0.5,
            v0: Some(500.0),
            v_spike: 1.0e6,
            ..Default::default()
        };
        let trace = run(&config, &InputCurrent::Constant(0.0)).unwrap();

        assert!(trace.v.iter().all(|v| v.is_finite()));
        assert!(trace.w.iter().all(|w| w.is_finite()));
        assert!((trace.spike_times[0] - 0.1).abs() < 1e-12);
        assert_eq!(trace.v[1], config.v_spike);
        assert_eq!(trace.v[2], config.v_reset);
    }

    #[test]
    fn test_default_trace_is_finite() {
        let trace = run(&SimulationConfig::default(), &InputCurrent::Constant(500.0)).unwrap();
        assert!(trace.v.iter().chain(trace.w.iter()).all(|x| x.is_finite()));
    }

    #[test]
    fn test_firing_rate_window() {
        let spikes = [100.0, 200.0, 300.0, 400.0, 490.0];
        assert!((firing_rate(&spikes, 500.0, 500.0) - 10.0).abs() < 1e-9);
        assert!((firing_rate(&spikes, 500.0, 100.0) - 10.0).abs() < 1e-9);
        assert!((firing_rate(&spikes, 500.0, 250.0) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_firing_rate_degenerate() {
        assert_eq!(firing_rate(&[], 500.0, 500.0), 0.0);
        assert_eq!(firing_rate(&[10.0, 20.0], 500.0, 0.0), 0.0);
        assert_eq!(firing_rate(&[10.0, 20.0], 500.0, -100.0), 0.0);
        assert_eq!(firing_rate(&[10.0, 20.0], 500.0, f64::NAN), 0.0);
        // Spikes past the end of the run do not count.
        assert_eq!(firing_rate(&[600.0], 500.0, 500.0), 0.0);
    }

    #[test]
    fn test_spike_statistics() {
        let regular: Vec<f64> = (0..10).map(|i| i as f64 * 10.0).collect();
        assert!(cv_isi(&regular) < 0.01);
        assert_eq!(interspike_intervals(&regular).len(), 9);

        let irregular = vec![0.0, 5.0, 20.0, 22.0, 50.0];
        assert!(cv_isi(&irregular) > 0.5);
        assert_eq!(interspike_intervals(&irregular), vec![5.0, 15.0, 2.0, 28.0]);

        assert_eq!(cv_isi(&[1.0]), 0.0);
        assert!(interspike_intervals(&[1.0]).is_empty());

        assert!((mean_firing_rate(&regular, 1000.0) - 10.0).abs() < 1e-12);
        assert_eq!(mean_firing_rate(&regular, 0.0), 0.0);
    }

    #[test]
    fn test_trace_helpers() {
        let trace = run(&short_config(500.0), &InputCurrent::Constant(250.0)).unwrap();
        assert_eq!(trace.firing_rate(500.0), firing_rate(&trace.spike_times, 500.0, 500.0));
        assert_eq!(trace.interspike_intervals().len(), trace.spike_count().saturating_sub(1));

        let (v, w) = trace.final_state().unwrap();
        assert_eq!(v, trace.v[4999]);
        assert_eq!(w, trace.w[4999]);
    }

    #[test]
    fn test_linspace_currents() {
        let currents = linspace_currents(0.0, 400.0, 21);
        assert_eq!(currents.len(), 21);
        assert_eq!(currents[0], 0.0);
        assert!((currents[1] - 20.0).abs() < 1e-9);
        assert!((currents[20] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_fi_curve_order_and_parallel() {
        let config = short_config(300.0);
        let currents = linspace_currents(0.0, 400.0, 5);

        let sequential = fi_curve(&config, &currents, 100.0).unwrap();
        let parallel = fi_curve_parallel(&config, &currents, 100.0).unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(sequential.len(), 5);
        assert_eq!(sequential.currents().to_vec(), currents);
        assert_eq!(sequential.points[0].rate, 0.0);
        assert!(sequential.rates().iter().all(|&r| r >= 0.0));
    }

    #[test]
    fn test_fi_curve_progress_callback() {
        let config = short_config(50.0);
        let mut seen = Vec::new();
        fi_curve_with_progress(&config, &[0.0, 300.0], 50.0, |p| seen.push(p.current)).unwrap();
        assert_eq!(seen, vec![0.0, 300.0]);
    }

    #[test]
    fn test_fi_curve_aborts_on_bad_config() {
        let config = SimulationConfig { tau_w: 0.0, ..Default::default() };
        assert!(fi_curve(&config, &[100.0, 200.0], 500.0).is_err());
        assert!(fi_curve_parallel(&config, &[100.0, 200.0], 500.0).is_err());
    }

    #[test]
    fn test_sweep_inputs_isolates_failures() {
        let config = short_config(200.0);
        let n = config.n_steps();
        let inputs = vec![
            InputCurrent::Constant(300.0),
            InputCurrent::PerStep(vec![300.0; n - 1]),
            InputCurrent::PerStep(vec![300.0; n]),
        ];

        let rates = sweep_inputs(&config, &inputs, 200.0).unwrap();
        assert_eq!(rates.len(), 3);
        assert!(matches!(rates[1], Err(AdexError::ShapeMismatch { .. })));
        assert_eq!(rates[0].as_ref().unwrap(), rates[2].as_ref().unwrap());

        let bad = SimulationConfig { dt: -0.1, ..Default::default() };
        assert!(sweep_inputs(&bad, &inputs, 200.0).is_err());
    }

    #[test]
    fn test_experiment_presets() {
        let non_adapting = Experiment::NonAdapting.config();
        assert_eq!((non_adapting.a, non_adapting.b), (0.0, 0.0));

        let bursting = Experiment::Bursting.config();
        assert_eq!(bursting.duration, 1500.0);
        assert_eq!((bursting.a, bursting.tau_w, bursting.b), (4.0, 300.0, 120.0));
        assert_eq!(Experiment::Bursting.input(), InputCurrent::Constant(200.0));

        for &e in Experiment::all() {
            assert_eq!(Experiment::from_name(e.name()), Some(e));
            assert!(e.config().validate().is_ok());
        }
        assert_eq!(Experiment::from_name("chattering"), None);
    }

    #[test]
    fn test_adaptation_slows_firing() {
        let plain = Experiment::NonAdapting.run().unwrap();
        let adapting = Experiment::Adapting.run().unwrap();

        assert!(plain.spike_count() > adapting.spike_count());
        // Without adaptation every reset starts from the same state.
        assert!(plain.cv_isi() < 1e-6);

        let isis = adapting.interspike_intervals();
        assert!(isis.len() >= 2);
        assert!(isis[0] < isis[isis.len() - 1]);
    }

    #[test]
    fn test_fi_protocol_defaults() {
        let protocol = FiProtocol::default();
        assert_eq!(protocol.config.duration, 2000.0);
        assert_eq!(protocol.window, 500.0);
        assert_eq!(protocol.currents.len(), 21);
    }
}
