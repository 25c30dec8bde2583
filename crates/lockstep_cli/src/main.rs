use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lockstep_core::config::parse_duration;
use lockstep_core::{
    compare, new_seed, replay_file, resolve_log_path, run_batch, BatchReport, DirectorySink,
    EventLog, Gen56Rng, Generation, InputLog, LockstepConfig, NullSink, ProtocolLine, RunOptions,
    Seed,
};
use lockstep_regression::{Roster, ScriptedCandidate, ScriptedReference};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(version, about = "Run and inspect lockstep battle sessions")]
struct Cli {
    /// Loads run and normalization settings from a TOML file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch of live sessions; exits with the number of failures.
    Run(RunArgs),
    /// Replay one recorded input log (a path or a seed id).
    Replay(ReplayArgs),
    /// Summarize recorded input logs (files, directories or seed ids).
    Inspect(InspectArgs),
    /// Mint session seeds the way a batch run would.
    Seeds(SeedsArgs),
    /// Compare a reference protocol chunk against candidate JSON lines.
    Compare(CompareArgs),
}

/// Flags override the `[run]` section of the config file.
#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    cycles: Option<usize>,
    #[arg(long = "gen")]
    generation: Option<u8>,
    #[arg(long)]
    seed: Option<Seed>,
    #[arg(long)]
    max_failures: Option<usize>,
    /// Keep starting rounds for this long, e.g. `30s` or `5m`.
    #[arg(long)]
    duration: Option<String>,
    /// Also write the batch report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn options(&self, config: &LockstepConfig) -> Result<RunOptions> {
        let mut options = config.run_options()?;
        if let Some(duration) = &self.duration {
            options.duration = Some(parse_duration(duration)?);
            if config.run.cycles.is_none() {
                options.cycles = 1;
            }
        }
        if let Some(cycles) = self.cycles {
            options.cycles = cycles;
        }
        if let Some(generation) = self.generation {
            options.generation = Some(Generation::new(generation)?);
        }
        if let Some(max_failures) = self.max_failures {
            options.max_failures = max_failures;
        }
        options.seed = self.seed.or(options.seed);
        Ok(options)
    }
}

#[derive(Args)]
struct ReplayArgs {
    target: String,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(required = true)]
    targets: Vec<String>,
}

#[derive(Args)]
struct SeedsArgs {
    #[arg(long)]
    seed: Option<Seed>,
    #[arg(long, default_value_t = 10)]
    count: usize,
}

#[derive(Args)]
struct CompareArgs {
    #[arg(long)]
    reference: PathBuf,
    #[arg(long)]
    candidate: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LockstepConfig::from_path(path)?,
        None => LockstepConfig::default(),
    };
    init_tracing(cli.debug || (cli.config.is_some() && config.run.debug_enabled()));

    match cli.command {
        Commands::Run(args) => {
            let report = handle_run(&args, &config)?;
            let code = report.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Replay(args) => handle_replay(args, &config),
        Commands::Inspect(args) => handle_inspect(args, &config),
        Commands::Seeds(args) => handle_seeds(args, &config),
        Commands::Compare(args) => handle_compare(args, &config),
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

fn handle_run(args: &RunArgs, config: &LockstepConfig) -> Result<BatchReport> {
    let options = args.options(config)?;
    let mut sink = DirectorySink::new(config.logs_dir());
    let report = run_batch::<ScriptedReference, ScriptedCandidate>(
        &options,
        &config.rules(),
        &mut Roster::default(),
        &mut sink,
    )?;

    let json = serde_json::to_string_pretty(&report)?;
    println!("{json}");
    if let Some(path) = &args.report {
        fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;
    }
    for failure in &report.failures {
        info!(target: "lockstep.cli", seed = %failure.seed, "reproduce with: {}", failure.reproduce);
    }
    Ok(report)
}

fn handle_replay(args: ReplayArgs, config: &LockstepConfig) -> Result<()> {
    let path = resolve_log_path(&config.logs_dir(), &args.target);
    let outcome = replay_file::<ScriptedReference, ScriptedCandidate>(
        &path,
        &config.rules(),
        &mut NullSink,
    )?;
    println!(
        "{}: {} turns, {:?} ({:?}), random state {}",
        path.display(),
        outcome.turns,
        outcome.result.outcome,
        outcome.phase,
        outcome.random_state
    );
    Ok(())
}

fn handle_inspect(args: InspectArgs, config: &LockstepConfig) -> Result<()> {
    let logs_dir = config.logs_dir();
    for target in &args.targets {
        let path = resolve_log_path(&logs_dir, target);
        debug!(target: "lockstep.cli", target_id = %target, path = %path.display(), "inspecting");
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_input_log(entry.path()) {
                    print_summary(entry.path())?;
                }
            }
        } else {
            print_summary(&path)?;
        }
    }
    Ok(())
}

fn is_input_log(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".input.log"))
}

fn print_summary(path: &Path) -> Result<()> {
    let log = InputLog::from_path(path)?;
    let header = log.header();
    println!(
        "{}: {} seed={} ({}) {} vs {}, {} decisions",
        path.display(),
        header.format,
        header.seed,
        header.seed.to_hex(),
        header.players.p1.name,
        header.players.p2.name,
        log.decisions()
    );
    Ok(())
}

fn handle_seeds(args: SeedsArgs, config: &LockstepConfig) -> Result<()> {
    let configured = config.run_options()?.seed;
    let seed = args
        .seed
        .or(configured)
        .unwrap_or_else(Seed::random);
    let mut prng = Gen56Rng::new(seed);
    println!("# minted from {seed}");
    for _ in 0..args.count {
        let minted = new_seed(&mut prng);
        println!("{minted}\t{}", minted.log_name());
    }
    Ok(())
}

fn handle_compare(args: CompareArgs, config: &LockstepConfig) -> Result<()> {
    let chunk = fs::read_to_string(&args.reference)
        .with_context(|| format!("failed to read {}", args.reference.display()))?;
    let data = fs::read_to_string(&args.candidate)
        .with_context(|| format!("failed to read {}", args.candidate.display()))?;
    let lines: Vec<ProtocolLine> = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a JSON array of lines", args.candidate.display()))?;

    let reference = EventLog::Raw(chunk);
    let candidate = EventLog::Parsed(lines);
    match compare(&config.rules(), &reference, &candidate) {
        Ok(()) => {
            println!("streams match");
            Ok(())
        }
        Err(mismatch) => anyhow::bail!("{mismatch}"),
    }
}
