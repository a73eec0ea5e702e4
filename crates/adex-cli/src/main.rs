//! # AdEx CLI
//!
//! Command-line interface for single-neuron AdEx simulation.
//!
//! Writes plain-text data (CSV traces, whitespace F-I tables) for an
//! external plotting tool.

use adex_core::{InputCurrent, SimulationConfig};
use adex_sim::{Experiment, FiCurve, FiProtocol, Trace};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "adex")]
#[command(author = "Yatrogenesis")]
#[command(version = "0.1.0")]
#[command(about = "Adaptive exponential integrate-and-fire neuron simulator", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one neuron under constant current
    Run {
        /// JSON parameter file (defaults are used for missing fields)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Injected current (pA)
        #[arg(short = 'i', long, default_value_t = adex_core::DEFAULT_INPUT_CURRENT)]
        current: f64,
        /// Override simulated time (ms)
        #[arg(long)]
        duration: Option<f64>,
        /// Override time step (ms)
        #[arg(long)]
        dt: Option<f64>,
        /// Write the trace as CSV (spike times go next to it)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep constant currents and report the steady-state rate
    FiCurve {
        /// JSON parameter file (defaults to the adapting 2 s protocol)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// First current (pA)
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Last current (pA)
        #[arg(long, default_value_t = 400.0)]
        stop: f64,
        /// Number of currents
        #[arg(long, default_value_t = 21)]
        points: usize,
        /// Trailing window for the rate (ms)
        #[arg(short, long, default_value_t = 500.0)]
        window: f64,
        /// Spread sweep points across threads
        #[arg(long)]
        parallel: bool,
        /// Write the two-column table here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the standard experiments and write their data files
    Experiments {
        /// Output directory
        #[arg(short, long, default_value = "plots")]
        output_dir: PathBuf,
        /// Run a single experiment (non-adapting, adapting, bursting, fi-curve)
        #[arg(long, conflicts_with = "interactive")]
        only: Option<String>,
        /// Pick the experiment from a menu
        #[arg(long)]
        interactive: bool,
        /// Run the F-I sweep in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Print the default parameters as JSON
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// What the `experiments` subcommand should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    All,
    Single(Experiment),
    FiCurve,
}

const FI_CURVE_NAME: &str = "fi-curve";
const FI_TABLE_FILE: &str = "adex_fi_curve_data.txt";

fn parse_selection(name: &str) -> anyhow::Result<Selection> {
    match name {
        "all" => Ok(Selection::All),
        FI_CURVE_NAME => Ok(Selection::FiCurve),
        other => match Experiment::from_name(other) {
            Some(experiment) => Ok(Selection::Single(experiment)),
            None => bail!("unknown experiment `{}`", other),
        },
    }
}

fn selection_names() -> Vec<&'static str> {
    let mut names = vec!["all"];
    names.extend(Experiment::all().iter().map(|e| e.name()));
    names.push(FI_CURVE_NAME);
    names
}

fn pick_selection() -> anyhow::Result<Selection> {
    use dialoguer::{theme::ColorfulTheme, FuzzySelect};

    let names = selection_names();
    let index = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Experiment")
        .items(&names[..])
        .default(0)
        .interact()?;
    parse_selection(names[index])
}

fn load_config(path: Option<&Path>, fallback: SimulationConfig) -> anyhow::Result<SimulationConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SimulationConfig::from_json(path)
                .with_context(|| format!("failed to load config {}", path.display()))
        }
        None => Ok(fallback),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { config, current, duration, dt, output } => {
            let mut config = load_config(config.as_deref(), SimulationConfig::default())?;
            if let Some(duration) = duration {
                config.duration = duration;
            }
            if let Some(dt) = dt {
                config.dt = dt;
            }

            let trace = adex_sim::run(&config, &InputCurrent::Constant(current))?;
            print_summary(&trace);

            if let Some(path) = output {
                write_trace(&path, &trace, None)?;
            }
        }

        Commands::FiCurve { config, start, stop, points, window, parallel, output } => {
            let config = load_config(config.as_deref(), FiProtocol::default().config)?;
            let protocol = FiProtocol {
                config,
                currents: adex_sim::linspace_currents(start, stop, points),
                window,
            };

            let curve = run_fi_protocol(&protocol, parallel)?;
            let table = format_fi_table(&curve);
            match output {
                Some(path) => {
                    write_file(&path, &table)?;
                    println!("{} {}", "Saved F-I data:".green().bold(), path.display());
                }
                None => print!("{}", table),
            }
        }

        Commands::Experiments { output_dir, only, interactive, parallel } => {
            let selection = if interactive {
                pick_selection()?
            } else {
                match only.as_deref() {
                    Some(name) => parse_selection(name)?,
                    None => Selection::All,
                }
            };

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("failed to create {}", output_dir.display()))?;
            run_experiments(selection, &output_dir, parallel)?;
            println!("{}", "All experiments completed.".green().bold());
        }

        Commands::Config { output } => {
            let config = SimulationConfig::default();
            match output {
                Some(path) => {
                    config.to_json(&path)?;
                    println!("{} {}", "Wrote default config:".green().bold(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}

// ============================================================================
// EXPERIMENT DRIVER
// ============================================================================

fn run_experiments(selection: Selection, output_dir: &Path, parallel: bool) -> anyhow::Result<()> {
    let experiments: &[Experiment] = match selection {
        Selection::All => Experiment::all(),
        Selection::Single(ref experiment) => std::slice::from_ref(experiment),
        Selection::FiCurve => &[],
    };

    for experiment in experiments {
        println!("{} {}", "Running".green().bold(), experiment.name().cyan());
        let trace = experiment.run()?;
        println!("  {}: {} spikes", experiment.title(), trace.spike_count());

        let path = output_dir.join(format!("{}.csv", experiment.file_stem()));
        write_trace(&path, &trace, Some(experiment.title()))?;
    }

    if matches!(selection, Selection::All | Selection::FiCurve) {
        println!("{} {}", "Running".green().bold(), FI_CURVE_NAME.cyan());
        let curve = run_fi_protocol(&FiProtocol::default(), parallel)?;
        let path = output_dir.join(FI_TABLE_FILE);
        write_file(&path, &format_fi_table(&curve))?;
        println!("  Saved F-I data: {}", path.display());
    }

    Ok(())
}

fn run_fi_protocol(protocol: &FiProtocol, parallel: bool) -> anyhow::Result<FiCurve> {
    if parallel {
        return Ok(protocol.run_parallel()?);
    }

    let bar = ProgressBar::new(protocol.currents.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let curve = adex_sim::fi_curve_with_progress(
        &protocol.config,
        &protocol.currents,
        protocol.window,
        |point| {
            bar.set_message(format!("I_ext = {:.1} pA, rate = {:.2} Hz", point.current, point.rate));
            bar.inc(1);
        },
    );
    bar.finish_and_clear();

    Ok(curve?)
}

fn print_summary(trace: &Trace) {
    let last = trace.t.last().copied().unwrap_or(0.0);
    println!(
        "{} {:.1} ms with {} spikes",
        "Simulated".green().bold(),
        last,
        trace.spike_count()
    );
    if !trace.spike_times.is_empty() {
        let times: Vec<String> = trace.spike_times.iter().map(|t| format!("{:.1}", t)).collect();
        println!("  Spike times (ms): {}", times.join(" ").cyan());
        println!("  Mean rate: {:.2} Hz, ISI CV: {:.3}", trace.mean_firing_rate(), trace.cv_isi());
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// CSV with one row per sample, optionally preceded by a `# title` line
fn format_trace_csv(trace: &Trace, title: Option<&str>) -> String {
    let mut out = String::with_capacity(trace.n_steps() * 32);
    if let Some(title) = title {
        let _ = writeln!(out, "# {}", title);
    }
    out.push_str("t_ms,V_mV,w_pA\n");
    for ((t, v), w) in trace.t.iter().zip(&trace.v).zip(&trace.w) {
        let _ = writeln!(out, "{},{},{}", t, v, w);
    }
    out
}

fn format_spike_times(spikes: &[f64]) -> String {
    spikes.iter().map(|t| format!("{}\n", t)).collect()
}

/// Two-column table, `%.3f` precision, header marked with `#`
fn format_fi_table(curve: &FiCurve) -> String {
    let mut out = String::from("# I_ext_pA  firing_rate_Hz\n");
    for point in &curve.points {
        let _ = writeln!(out, "{:.3} {:.3}", point.current, point.rate);
    }
    out
}

fn spikes_path(trace_path: &Path) -> PathBuf {
    let stem = trace_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".into());
    trace_path.with_file_name(format!("{}_spikes.txt", stem))
}

fn write_trace(path: &Path, trace: &Trace, title: Option<&str>) -> anyhow::Result<()> {
    write_file(path, &format_trace_csv(trace, title))?;
    let spikes = spikes_path(path);
    write_file(&spikes, &format_spike_times(&trace.spike_times))?;
    println!("{} {}", "Saved:".green(), path.display());
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
