//! `echelon` -- run a supply-chain scenario and report fill rates.

use clap::{Parser, ValueEnum};
use echelon_core::engine::{SimError, Simulator};
use echelon_core::policy::{BaseStock, ControlPolicy, NoControl, ReleaseAll};
use echelon_core::serialize::SerializeError;
use echelon_core::sim::RunConfig;
use echelon_data::{DataLoadError, load_scenario, save_scenario, update_scenario};
use echelon_stats::{FillRateStats, StatsConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "echelon",
    about = "Multi-echelon supply-chain simulation",
    version
)]
struct Cli {
    /// Scenario file (.json, .ron or .toml)
    scenario: PathBuf,

    /// Number of loops; overrides the scenario's `run` table
    #[arg(short, long)]
    loops: Option<u32>,

    /// Periods per loop; overrides the scenario's `run` table
    #[arg(short, long)]
    periods: Option<u64>,

    /// Emit end-of-period snapshot events
    #[arg(long)]
    snapshots: bool,

    /// Replenishment control policy
    #[arg(long, value_enum, default_value_t = Control::BaseStock)]
    control: Control,

    /// Periods in the rolling fill-rate window
    #[arg(long, default_value = "12")]
    window: usize,

    /// Write the final state back as a scenario file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write a binary state snapshot after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn,echelon=info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Control {
    /// Order up to each node's `base_stock` level
    BaseStock,
    /// Never order
    #[value(name = "none")]
    Off,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Data(#[from] DataLoadError),
    #[error(transparent)]
    Simulation(#[from] SimError),
    #[error(transparent)]
    Snapshot(#[from] SerializeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let scenario = load_scenario(&cli.scenario)?;

    let base = scenario.run.clone().unwrap_or_default();
    let config = RunConfig::new(
        cli.loops.unwrap_or(base.loops),
        cli.periods.unwrap_or(base.periods_per_loop),
    )
    .with_snapshots(cli.snapshots || base.emit_snapshots);

    let control: Box<dyn ControlPolicy> = match cli.control {
        Control::BaseStock => Box::new(BaseStock::new()),
        Control::Off => Box::new(NoControl),
    };
    let stats = FillRateStats::new(StatsConfig {
        window_periods: cli.window,
        ..StatsConfig::default()
    });

    let mut sim = Simulator::new(scenario.chain, config, control, Box::new(ReleaseAll), stats)?;
    let summary = sim.run()?;
    let period = sim.period();
    let (chain, mut stats) = sim.into_parts();
    stats.flush();

    print_report(&stats);
    println!(
        "\n{} periods over {} loops, state hash {:016x}",
        summary.periods, summary.loops, summary.state_hash
    );

    if let Some(path) = &cli.snapshot {
        std::fs::write(path, chain.serialize(period)?)?;
        info!(file = %path.display(), period, "wrote snapshot");
    }

    if let Some(path) = &cli.save {
        let mut data = scenario.data;
        update_scenario(&mut data, &chain);
        save_scenario(path, &data)?;
        info!(file = %path.display(), "saved final state");
    }
    Ok(())
}

fn print_report(stats: &FillRateStats) {
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
        "node", "requested", "satisfied", "backorder", "fill", "window", "lines"
    );
    for node in stats.nodes() {
        let Some(totals) = stats.totals(node) else {
            continue;
        };
        println!(
            "{:<16} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
            node.as_str(),
            totals.requested,
            totals.satisfied,
            totals.backordered,
            percent(totals.fill_rate()),
            percent(stats.window_fill_rate(node)),
            percent(totals.line_fill_rate()),
        );
    }

    let totals = stats.chain_totals();
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>8} {:>8} {:>8}",
        "total",
        totals.requested,
        totals.satisfied,
        totals.backordered,
        percent(totals.fill_rate()),
        "",
        percent(totals.line_fill_rate()),
    );
}

fn percent(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0))
}
