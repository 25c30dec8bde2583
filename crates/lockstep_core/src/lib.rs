//! Differential lockstep testing of a candidate battle engine against a
//! reference simulator.

pub mod batch;
pub mod choice;
pub mod config;
pub mod error;
pub mod input_log;
pub mod policy;
pub mod prng;
pub mod protocol;
pub mod report;
pub mod resolver;
pub mod session;
pub mod simulator;

pub use batch::{replay_file, run_batch, RunOptions, TeamSource};
pub use choice::{Choice, ChoiceKind, MalformedChoiceError, PerPlayer, Player};
pub use config::LockstepConfig;
pub use error::{ConfigError, DesyncError, Divergence, LockstepError, ResolveError};
pub use input_log::{resolve_log_path, InputLog, LogHeader, Replayer};
pub use policy::{Policy, RandomPolicy};
pub use prng::{new_seed, Gen12Rng, Gen34Rng, Gen56Rng, Generation, Prng, Rng, Seed};
pub use protocol::{
    compare, normalize, parse_chunk, parse_line, FieldRule, NormalizationRules, ProtocolLine,
    ProtocolMismatch, ReorderRule,
};
pub use report::{
    BatchReport, BatchSummary, DirectorySink, FailureReport, FailureSink, FailureSummary, MemorySink,
    NullSink, ReportStatus, REPRODUCE_COMMAND,
};
pub use resolver::resolve;
pub use session::{Frame, Mode, Phase, Session, SessionOutcome, Sides};
pub use simulator::{
    BattleSetup, EventLog, Outcome, PlayerSpec, Request, RequestMove, RequestState, Simulator,
    SimulatorError, StruggleSlot, TurnResult,
};
