//! Batches of randomized sessions and single-log replays.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::choice::PerPlayer;
use crate::error::LockstepError;
use crate::input_log::InputLog;
use crate::policy::{Policy, RandomPolicy};
use crate::prng::{new_seed, Gen56Rng, Generation, Prng, Seed};
use crate::protocol::NormalizationRules;
use crate::report::{BatchReport, FailureSink, FailureSummary};
use crate::session::{Session, SessionOutcome};
use crate::simulator::{BattleSetup, PlayerSpec, Simulator, SimulatorError};

pub const DEFAULT_CYCLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Sessions per generation per round.
    pub cycles: usize,
    pub max_failures: usize,
    /// Restrict the batch to one generation; every supported one otherwise.
    pub generation: Option<Generation>,
    /// Keep starting rounds until this much time has passed.
    pub duration: Option<Duration>,
    pub debug: bool,
    pub seed: Option<Seed>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            max_failures: 1,
            generation: None,
            duration: None,
            debug: true,
            seed: None,
        }
    }
}

/// Produces both players' teams for a session.
pub trait TeamSource {
    fn generate(
        &mut self,
        generation: Generation,
        seed: Seed,
    ) -> Result<PerPlayer<PlayerSpec>, SimulatorError>;
}

/// Runs live sessions with random policies until the configured cycles (and
/// duration) are spent or `max_failures` sessions failed.
pub fn run_batch<R, C>(
    options: &RunOptions,
    rules: &NormalizationRules,
    teams: &mut dyn TeamSource,
    sink: &mut dyn FailureSink,
) -> Result<BatchReport, LockstepError>
where
    R: Simulator,
    C: Simulator,
{
    let seed = options.seed.unwrap_or_else(|| {
        let seed = Seed::random();
        info!(target: "lockstep.batch", seed = %seed, "no seed given, drew one");
        seed
    });
    let mut prng = Gen56Rng::new(seed);
    let run_id = format!("batch-{}", Utc::now().format("%Y%m%dT%H%M%S"));
    let mut report = BatchReport::new(run_id, seed);
    let generations: Vec<Generation> = match options.generation {
        Some(generation) => vec![generation],
        None => Generation::all().collect(),
    };

    let started = Instant::now();
    loop {
        for &generation in &generations {
            for _ in 0..options.cycles {
                let session_seed = prng.seed();
                let players = teams.generate(generation, new_seed(&mut prng))?;
                let mut p1 = RandomPolicy::new(new_seed(&mut prng));
                let mut p2 = RandomPolicy::new(new_seed(&mut prng));
                let setup = BattleSetup::new(generation, session_seed, players)
                    .with_debug(options.debug);

                match play_one::<R, C>(setup, rules, &mut p1, &mut p2, sink) {
                    Ok(_) => report.record_pass(),
                    Err(err) => {
                        warn!(
                            target: "lockstep.batch",
                            generation = generation.num(),
                            seed = %session_seed,
                            error = %err,
                            "session failed"
                        );
                        report.record_failure(FailureSummary::new(
                            generation,
                            session_seed,
                            err.to_string(),
                        ));
                        if report.summary.failures >= options.max_failures {
                            return Ok(report);
                        }
                    }
                }
            }
        }
        let more_time = options
            .duration
            .is_some_and(|duration| started.elapsed() < duration);
        if !more_time {
            break;
        }
    }

    info!(
        target: "lockstep.batch",
        sessions = report.summary.sessions,
        failures = report.summary.failures,
        "batch complete"
    );
    Ok(report)
}

fn play_one<R: Simulator, C: Simulator>(
    setup: BattleSetup,
    rules: &NormalizationRules,
    p1: &mut dyn Policy,
    p2: &mut dyn Policy,
    sink: &mut dyn FailureSink,
) -> Result<SessionOutcome, LockstepError> {
    let session = Session::<R, C>::new(setup, rules.clone())?;
    session.play_live(PerPlayer::new(p1, p2), sink)
}

/// Replays one recorded input log.
pub fn replay_file<R, C>(
    path: &Path,
    rules: &NormalizationRules,
    sink: &mut dyn FailureSink,
) -> Result<SessionOutcome>
where
    R: Simulator,
    C: Simulator,
{
    let log = InputLog::from_path(path)?;
    let session = Session::<R, C>::new(log.setup(), rules.clone())?;
    let outcome = session
        .play_replay(&log, sink)
        .with_context(|| format!("replay of {} diverged", path.display()))?;
    Ok(outcome)
}
