//! Recorded reference input logs and the replayer that re-derives choice
//! pairs from them.
//!
//! A log starts with a header naming the format, seed and both players,
//! followed by one decision line per submitted choice. The reference omits
//! the passes a waiting player never sends and rewrites move slots into move
//! ids, so decisions are matched against the options the simulators offer
//! rather than parsed as plain choices.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::choice::{Choice, ChoiceKind, PerPlayer, Player};
use crate::error::{ConfigError, DesyncError};
use crate::prng::{Generation, Seed};
use crate::simulator::{BattleSetup, PlayerSpec, STRUGGLE};

pub const LOG_EXTENSION: &str = "input.log";

const ADMINISTRATIVE: &[&str] = &[">version", ">start", ">player"];

#[derive(Debug, Deserialize)]
struct StartLine {
    formatid: String,
    seed: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub format: String,
    pub generation: Generation,
    pub seed: Seed,
    pub players: PerPlayer<PlayerSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLog {
    header: LogHeader,
    lines: Vec<String>,
}

impl InputLog {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        let header = parse_header(&lines)?;
        Ok(Self { header, lines })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read input log {}", path.display()))?;
        let log = Self::parse(&text)
            .with_context(|| format!("failed to parse input log {}", path.display()))?;
        Ok(log)
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of non-administrative lines.
    pub fn decisions(&self) -> usize {
        self.lines.iter().filter(|l| !is_administrative(l)).count()
    }

    pub fn setup(&self) -> BattleSetup {
        BattleSetup {
            format: self.header.format.clone(),
            generation: self.header.generation,
            seed: self.header.seed,
            players: self.header.players.clone(),
            debug: false,
        }
    }
}

fn parse_header(lines: &[String]) -> Result<LogHeader, ConfigError> {
    let malformed = |line: usize, reason: String| ConfigError::MalformedHeader { line, reason };

    let mut start: Option<StartLine> = None;
    let mut players: PerPlayer<Option<PlayerSpec>> = PerPlayer::default();
    for (index, line) in lines.iter().enumerate() {
        if let Some(json) = line.strip_prefix(">start ") {
            let parsed: StartLine =
                serde_json::from_str(json).map_err(|e| malformed(index + 1, e.to_string()))?;
            start = Some(parsed);
        } else if let Some(rest) = line.strip_prefix(">player ") {
            let (id, json) = rest
                .split_once(' ')
                .ok_or_else(|| malformed(index + 1, "player line has no spec".into()))?;
            let player: Player = id
                .parse()
                .map_err(|_| malformed(index + 1, format!("unknown player '{id}'")))?;
            let spec: PlayerSpec =
                serde_json::from_str(json).map_err(|e| malformed(index + 1, e.to_string()))?;
            *players.get_mut(player) = Some(spec);
        } else if !is_administrative(line) {
            break;
        }
    }

    let start = start.ok_or_else(|| malformed(1, "missing >start line".into()))?;
    let generation = Generation::from_format_id(&start.formatid)?;
    let seed = Seed::from_words(&start.seed)?;
    let (Some(p1), Some(p2)) = (players.p1, players.p2) else {
        return Err(malformed(1, "missing >player line".into()));
    };
    Ok(LogHeader {
        format: start.formatid,
        generation,
        seed,
        players: PerPlayer::new(p1, p2),
    })
}

fn is_administrative(line: &str) -> bool {
    line.trim().is_empty() || ADMINISTRATIVE.iter().any(|prefix| line.starts_with(prefix))
}

/// Maps a recorded-session id to `<logs_dir>/<id>.input.log` when that file
/// exists; anything else is taken as a path.
pub fn resolve_log_path(logs_dir: &Path, id: &str) -> PathBuf {
    let candidate = logs_dir.join(format!("{id}.{LOG_EXTENSION}"));
    if candidate.exists() {
        candidate
    } else {
        PathBuf::from(id)
    }
}

struct Decision {
    player: Player,
    kind: ChoiceKind,
    token: Option<String>,
}

fn parse_decision(line: &str) -> Option<Decision> {
    let rest = line.strip_prefix('>')?;
    let (player, body) = rest.split_once(' ')?;
    let player: Player = player.parse().ok()?;
    if body == "pass" {
        return Some(Decision {
            player,
            kind: ChoiceKind::Pass,
            token: None,
        });
    }
    let (kind, token) = body.split_once(' ')?;
    match kind {
        "move" => Some(Decision {
            player,
            kind: ChoiceKind::Move,
            token: Some(token.to_owned()),
        }),
        "switch" if matches!(token, "2" | "3" | "4" | "5" | "6") => Some(Decision {
            player,
            kind: ChoiceKind::Switch,
            token: Some(token.to_owned()),
        }),
        _ => None,
    }
}

fn move_data(token: &str, moves: &[String]) -> Result<u8, DesyncError> {
    let data = if token == "recharge" {
        1
    } else if token == STRUGGLE {
        return Ok(0);
    } else if let Ok(slot) = token.parse::<u8>() {
        slot
    } else {
        moves
            .iter()
            .position(|id| id == token)
            .map_or(0, |i| i as u8 + 1)
    };
    if data == 0 {
        return Err(DesyncError::InvalidChoiceData {
            token: token.to_owned(),
        });
    }
    Ok(data)
}

fn forced_pass(options: &[Choice]) -> bool {
    options.is_empty() || options == [Choice::PASS]
}

/// Cursor over the decision lines of one [`InputLog`].
#[derive(Debug, Default, Clone)]
pub struct Replayer {
    cursor: usize,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self, log: &InputLog) -> bool {
        self.cursor >= log.lines().len()
    }

    /// Consumes lines until both players have a choice that is one of their
    /// current `options`. `moves` are the active battlers' move ids in slot
    /// order, used to translate recorded ids back to slots.
    pub fn next_pair(
        &mut self,
        log: &InputLog,
        options: &PerPlayer<Vec<Choice>>,
        moves: &PerPlayer<Vec<String>>,
    ) -> Result<PerPlayer<Choice>, DesyncError> {
        let mut chosen: PerPlayer<Option<Choice>> =
            PerPlayer::from_fn(|p| forced_pass(options.get(p)).then_some(Choice::PASS));
        let lines = log.lines();

        while self.cursor < lines.len() && (chosen.p1.is_none() || chosen.p2.is_none()) {
            let index = self.cursor;
            let line = &lines[index];
            if is_administrative(line) {
                self.cursor += 1;
                continue;
            }
            let decision = parse_decision(line).ok_or_else(|| DesyncError::UnexpectedInput {
                index,
                line: line.clone(),
            })?;
            let player = decision.player;
            let choice = match (decision.kind, decision.token.as_deref()) {
                (ChoiceKind::Move, Some(token)) => {
                    Choice::move_slot(move_data(token, moves.get(player))?)
                }
                (ChoiceKind::Switch, Some(token)) => {
                    let slot = token.parse::<u8>().map_err(|_| DesyncError::InvalidChoiceData {
                        token: token.to_owned(),
                    })?;
                    Choice::switch_slot(slot)
                }
                _ => Choice::PASS,
            };

            if let Some(existing) = *chosen.get(player) {
                return Err(DesyncError::DuplicateChoice {
                    player,
                    existing,
                    found: choice,
                });
            }

            let offered = options.get(player);
            match offered.as_slice() {
                [forced] if forced.kind == ChoiceKind::Move => {
                    if choice.kind != ChoiceKind::Move {
                        return Err(DesyncError::ForcedMoveViolation {
                            player,
                            found: choice,
                        });
                    }
                    *chosen.get_mut(player) = Some(*forced);
                }
                _ if offered.contains(&choice) => *chosen.get_mut(player) = Some(choice),
                _ => trace!(
                    target: "lockstep.replay",
                    index,
                    player = %player,
                    choice = %choice,
                    "skipping unavailable choice"
                ),
            }
            self.cursor += 1;
        }

        match (chosen.p1, chosen.p2) {
            (Some(p1), Some(p2)) => {
                debug!(
                    target: "lockstep.replay",
                    cursor = self.cursor,
                    p1 = %p1,
                    p2 = %p2,
                    "replayed choices"
                );
                Ok(PerPlayer::new(p1, p2))
            }
            (p1, p2) => {
                let unresolved = Player::ALL
                    .into_iter()
                    .zip([p1, p2])
                    .filter_map(|(player, choice)| choice.is_none().then_some(player))
                    .collect();
                Err(DesyncError::Exhausted { unresolved })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = concat!(
        ">version 1.0.0\n",
        ">start {\"formatid\":\"gen1customgame\",\"seed\":[1,2,3,4]}\n",
        ">player p1 {\"name\":\"Player A\",\"team\":\"Mew|100|tackle\"}\n",
        ">player p2 {\"name\":\"Player B\",\"team\":\"Ditto|100|splash\"}\n",
    );

    fn log(decisions: &[&str]) -> InputLog {
        let mut text = HEADER.to_owned();
        text.push_str(&decisions.join("\n"));
        InputLog::parse(&text).unwrap()
    }

    fn moves(n: u8) -> Vec<Choice> {
        (1..=n).map(Choice::move_slot).collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn options(p1: Vec<Choice>, p2: Vec<Choice>) -> PerPlayer<Vec<Choice>> {
        PerPlayer::new(p1, p2)
    }

    fn no_ids() -> PerPlayer<Vec<String>> {
        PerPlayer::default()
    }

    #[test]
    fn header_describes_the_battle() {
        let log = log(&[">p1 move 1", ">p2 move 1"]);
        let header = log.header();
        assert_eq!("gen1customgame", header.format);
        assert_eq!(1, header.generation.num());
        assert_eq!(Seed([1, 2, 3, 4]), header.seed);
        assert_eq!("Player B", header.players.p2.name);
        assert_eq!(2, log.decisions());
        assert_eq!(header.seed, log.setup().seed);
    }

    #[test]
    fn malformed_headers_are_config_errors() {
        assert!(matches!(
            InputLog::parse(">start {nope}\n"),
            Err(ConfigError::MalformedHeader { line: 1, .. })
        ));
        assert!(matches!(
            InputLog::parse(">p1 move 1\n"),
            Err(ConfigError::MalformedHeader { .. })
        ));
        let bad_seed = ">start {\"formatid\":\"gen1customgame\",\"seed\":[1,2,3]}\n";
        assert_eq!(
            Err(ConfigError::SeedArity { found: 3 }),
            InputLog::parse(bad_seed)
        );
    }

    #[test]
    fn waiting_players_pass_without_consuming_input() {
        let log = log(&[">p2 switch 3", ">p1 move 1"]);
        let mut replayer = Replayer::new();
        let pair = replayer
            .next_pair(&log, &options(vec![Choice::PASS], vec![Choice::switch_slot(3)]), &no_ids())
            .unwrap();
        assert_eq!(PerPlayer::new(Choice::PASS, Choice::switch_slot(3)), pair);
        assert_eq!(5, replayer.cursor());
        assert!(!replayer.is_exhausted(&log));
    }

    #[test]
    fn move_ids_and_keywords_become_slots() {
        let log = log(&[">p1 move thunderbolt", ">p2 move recharge"]);
        let mut replayer = Replayer::new();
        let moves_by_id = PerPlayer::new(ids(&["tackle", "thunderbolt"]), Vec::new());
        let pair = replayer
            .next_pair(&log, &options(moves(2), moves(2)), &moves_by_id)
            .unwrap();
        assert_eq!(PerPlayer::new(Choice::move_slot(2), Choice::move_slot(1)), pair);
        assert!(replayer.is_exhausted(&log));
    }

    #[test]
    fn struggle_token_is_slot_zero() {
        let log = log(&[">p1 move struggle", ">p2 move 0"]);
        let mut replayer = Replayer::new();
        let opts = options(vec![Choice::move_slot(0), Choice::switch_slot(2)], moves(1));
        let err = replayer.next_pair(&log, &opts, &no_ids()).unwrap_err();
        assert_eq!(
            DesyncError::InvalidChoiceData {
                token: "0".to_owned()
            },
            err
        );
    }

    #[test]
    fn forced_move_takes_the_offered_option() {
        let log = log(&[">p1 move 3", ">p2 move 1"]);
        let mut replayer = Replayer::new();
        let opts = options(vec![Choice::move_slot(0)], moves(1));
        let pair = replayer.next_pair(&log, &opts, &no_ids()).unwrap();
        assert_eq!(Choice::move_slot(0), pair.p1);

        let log = self::log(&[">p1 switch 2"]);
        let err = Replayer::new().next_pair(&log, &opts, &no_ids()).unwrap_err();
        assert_eq!(
            DesyncError::ForcedMoveViolation {
                player: Player::P1,
                found: Choice::switch_slot(2)
            },
            err
        );
    }

    #[test]
    fn unavailable_choices_are_skipped() {
        let log = log(&[">p1 move 4", ">p1 move 2", ">p2 move 1"]);
        let pair = Replayer::new()
            .next_pair(&log, &options(moves(2), moves(1)), &no_ids())
            .unwrap();
        assert_eq!(Choice::move_slot(2), pair.p1);
    }

    #[test]
    fn second_choice_for_a_player_is_a_desync() {
        let log = log(&[">p1 move 1", ">p1 move 2"]);
        let err = Replayer::new()
            .next_pair(&log, &options(moves(2), moves(1)), &no_ids())
            .unwrap_err();
        assert_eq!(
            DesyncError::DuplicateChoice {
                player: Player::P1,
                existing: Choice::move_slot(1),
                found: Choice::move_slot(2)
            },
            err
        );

        // p2 was offered nothing yet the transcript has a decision for them.
        let log = self::log(&[">p2 move 1"]);
        let err = Replayer::new()
            .next_pair(&log, &options(moves(1), Vec::new()), &no_ids())
            .unwrap_err();
        assert!(matches!(err, DesyncError::DuplicateChoice { player: Player::P2, .. }));
    }

    #[test]
    fn running_out_of_input_names_the_unresolved_players() {
        let log = log(&[">p1 move 1"]);
        let err = Replayer::new()
            .next_pair(&log, &options(moves(1), moves(1)), &no_ids())
            .unwrap_err();
        assert_eq!(
            DesyncError::Exhausted {
                unresolved: vec![Player::P2]
            },
            err
        );
        assert_eq!("unable to resolve choices for p2", err.to_string());
    }

    #[test]
    fn garbage_lines_are_unexpected() {
        let log = log(&[">p3 move 1"]);
        let err = Replayer::new()
            .next_pair(&log, &options(moves(1), moves(1)), &no_ids())
            .unwrap_err();
        assert_eq!(
            DesyncError::UnexpectedInput {
                index: 4,
                line: ">p3 move 1".to_owned()
            },
            err
        );
    }

    #[test]
    fn ids_resolve_to_recorded_file_names() {
        let dir = std::env::temp_dir().join(format!("lockstep-logs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0x1.input.log"), HEADER).unwrap();
        assert_eq!(dir.join("0x1.input.log"), resolve_log_path(&dir, "0x1"));
        assert_eq!(PathBuf::from("other.log"), resolve_log_path(&dir, "other.log"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
