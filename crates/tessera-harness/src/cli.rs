use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tessera_layout::EngineConfig;

use crate::error::Result;
use crate::golden::{render_grid, render_legend};
use crate::logging::init_logging;
use crate::scenario::{ReplayOptions, Scenario, replay, verify};
use crate::storm::run_storm;

#[derive(Debug, Parser)]
#[command(
    name = "tessera-harness",
    about = "Headless replay and fuzzing for the Tessera grid engine",
    version
)]
pub struct Cli {
    /// Tracing filter directive (overrides TESSERA_LOG).
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a scenario file and print the resulting layout.
    Replay(ReplayArgs),

    /// Run a seeded random op storm with invariant checks.
    Storm(StormArgs),

    /// Print the breakpoint table in effect.
    Breakpoints(BreakpointsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    pub scenario: PathBuf,

    /// Engine config (TOML, or JSON by extension).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Viewport width in pixels; overrides the scenario's.
    #[arg(long)]
    pub viewport: Option<u32>,

    /// Persist to this directory instead of memory.
    #[arg(long = "store-dir")]
    pub store_dir: Option<PathBuf>,

    /// Fail unless the final checksum matches; overrides the scenario's.
    #[arg(long)]
    pub expect: Option<String>,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StormArgs {
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value_t = 500)]
    pub steps: usize,

    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the generated ops as a replayable scenario.
    #[arg(long)]
    pub dump: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct BreakpointsArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Commands::Replay(args) => run_replay(args, out),
        Commands::Storm(args) => run_storm_command(args, out),
        Commands::Breakpoints(args) => run_breakpoints(args, out),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config = EngineConfig::from_file(path)?;
    let problems = config.validate();
    if problems.is_empty() {
        Ok(config)
    } else {
        for problem in &problems {
            tracing::warn!(target: "tessera.harness", path = %path.display(), problem = %problem, "config problem");
        }
        Ok(config.sanitize())
    }
}

fn run_replay(args: ReplayArgs, out: &mut impl Write) -> Result<()> {
    let scenario = Scenario::from_file(&args.scenario)?;
    let options = ReplayOptions {
        config: load_config(args.config.as_deref())?,
        viewport: args.viewport,
        store_dir: args.store_dir,
    };
    let report = replay(&scenario, &options)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "scenario {}: {}/{} ops applied, revision {}",
            report.name,
            report.applied(),
            report.steps.len(),
            report.revision
        )?;
        writeln!(
            out,
            "active breakpoint {} ({} columns)",
            report.active_breakpoint, report.active_columns
        )?;
        writeln!(out, "items:")?;
        for item in &report.items {
            writeln!(
                out,
                "  {} {} {}x{}@({},{})",
                item.id, item.kind, item.w, item.h, item.x, item.y
            )?;
        }
        for bp in options.config.breakpoint_table().iter() {
            let Some(entries) = report.layouts.get(&bp.name) else {
                continue;
            };
            let marker = if bp.name == report.active_breakpoint { " *" } else { "" };
            writeln!(out, "[{}] {} columns{marker}", bp.name, bp.columns)?;
            write!(out, "{}", render_grid(entries, bp.columns))?;
        }
        write!(out, "legend:\n{}", render_legend(report.active_layout()))?;
        writeln!(out, "checksum {}", report.checksum)?;
    }

    match args.expect.as_deref().or(scenario.expect.as_deref()) {
        Some(expected) => verify(&report, expected),
        None => Ok(()),
    }
}

fn run_storm_command(args: StormArgs, out: &mut impl Write) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let report = run_storm(args.seed, args.steps, &config)?;
    writeln!(
        out,
        "storm seed {}: {} steps, {} applied, {} items",
        report.seed, report.steps, report.applied, report.items
    )?;
    writeln!(out, "checksum {}", report.checksum)?;

    if let Some(path) = args.dump {
        std::fs::write(&path, report.to_scenario().to_json_pretty()?)?;
        writeln!(out, "scenario written to {}", path.display())?;
    }
    Ok(())
}

fn run_breakpoints(args: BreakpointsArgs, out: &mut impl Write) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    writeln!(out, "canonical columns: {}", config.columns)?;
    for bp in config.breakpoint_table().iter() {
        let max_h = bp
            .max_h
            .map_or_else(|| format!("{} (default)", config.default_max_h), |h| h.to_string());
        writeln!(
            out,
            "{:<6} min_width {:>5}  columns {:>3}  max_h {}",
            bp.name, bp.min_width, bp.columns, max_h
        )?;
    }
    Ok(())
}
