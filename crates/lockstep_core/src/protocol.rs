//! Parsing and normalized comparison of the `|name|arg|...` battle protocol.
//!
//! The reference side is parsed from raw text; the candidate side usually
//! arrives already structured. Before comparing, a fixed set of rules smooths
//! over differences that are known and accepted:
//!
//! - cosmetic reference-only events in the denylist are dropped
//! - a silent status event the candidate emits just before a switch is moved
//!   after it
//! - `[from]` on a reference `move` is dropped when the candidate did not
//!   attribute the move
//! - `[of]` on reference `-damage`/`-heal` is dropped unless `[from]` names a
//!   source the candidate tracks

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulator::EventLog;

pub const DEFAULT_DENYLIST: &[&str] = &[
    "", "t:", "gametype", "gen", "tier", "rule", "player", "teamsize", "teampreview", "j", "l",
    "c", "chat", "raw", "html", "debug", "upkeep", "inactive", "inactiveoff", "-message", "-hint",
];
pub const DEFAULT_TRACKED_SOURCES: &[&str] = &["drain", "Recoil"];
pub const DEFAULT_REORDER_STATUSES: &[&str] = &["psn"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolLine {
    pub args: Vec<String>,
    #[serde(default)]
    pub kw_args: BTreeMap<String, String>,
}

impl ProtocolLine {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kw_args: BTreeMap::new(),
        }
    }

    /// Adds a keyword argument; an empty value marks a flag such as `[silent]`.
    pub fn with_kw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kw_args.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn kw(&self, key: &str) -> Option<&str> {
        self.kw_args.get(key).map(String::as_str)
    }

    pub fn has_kw(&self, key: &str) -> bool {
        self.kw_args.contains_key(key)
    }
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|{}", self.args.join("|"))?;
        for (key, value) in &self.kw_args {
            if value.is_empty() {
                write!(f, "|[{key}]")?;
            } else {
                write!(f, "|[{key}] {value}")?;
            }
        }
        Ok(())
    }
}

/// Parses one protocol line. Text without a leading pipe is not protocol.
pub fn parse_line(line: &str) -> Option<ProtocolLine> {
    let body = line.strip_prefix('|')?;
    let mut args: Vec<String> = body.split('|').map(str::to_owned).collect();
    let mut kw_args = BTreeMap::new();
    while args.len() > 1 {
        let Some((key, value)) = args.last().and_then(|arg| split_keyword(arg)) else {
            break;
        };
        args.pop();
        kw_args.insert(key, value);
    }
    Some(ProtocolLine { args, kw_args })
}

/// Keyword arguments the battle protocol attaches to events. Other bracketed
/// text, like a `[Gen 1] Custom Game` tier name, stays positional.
pub const KEYWORDS: &[&str] = &[
    "anim", "block", "broken", "consumed", "damage", "eat", "fatigue", "from", "heavy",
    "identify", "miss", "msg", "notarget", "number", "of", "ohko", "prepare", "silent", "spread",
    "still", "upkeep", "weak", "wisher", "zeffect",
];

fn split_keyword(arg: &str) -> Option<(String, String)> {
    let inner = arg.strip_prefix('[')?;
    let (key, value) = inner.split_once(']')?;
    if !KEYWORDS.contains(&key) {
        return None;
    }
    Some((key.to_owned(), value.trim().to_owned()))
}

pub fn parse_chunk(chunk: &str) -> Vec<ProtocolLine> {
    chunk.lines().filter_map(parse_line).collect()
}

/// Field suppression applied to reference events of one name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum FieldRule {
    /// Drop `[from]` when the paired candidate event omits it.
    CausalAttribution,
    /// Drop `[of]` unless `[from]` is one of the tracked sources.
    DamageSource { tracked: BTreeSet<String> },
}

/// Moves a silent status event of one of `statuses` after an immediately
/// following switch event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderRule {
    pub status_event: String,
    pub switch_event: String,
    pub statuses: BTreeSet<String>,
}

impl ReorderRule {
    pub fn silent_status_before_switch<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status_event: "-status".into(),
            switch_event: "switch".into(),
            statuses: statuses.into_iter().map(Into::into).collect(),
        }
    }

    fn applies(&self, first: &ProtocolLine, second: &ProtocolLine) -> bool {
        first.name() == self.status_event
            && first.arg(2).is_some_and(|s| self.statuses.contains(s))
            && first.has_kw("silent")
            && second.name() == self.switch_event
    }

    /// Swaps until no pair matches. Statuses only ever move right past
    /// switches, so this terminates.
    fn apply(&self, lines: &mut [ProtocolLine]) {
        loop {
            let mut swapped = false;
            for i in 1..lines.len() {
                if self.applies(&lines[i - 1], &lines[i]) {
                    lines.swap(i - 1, i);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizationRules {
    denylist: BTreeSet<String>,
    reorder: Option<ReorderRule>,
    fields: BTreeMap<String, FieldRule>,
}

impl NormalizationRules {
    pub fn new(
        denylist: impl IntoIterator<Item = String>,
        reorder: Option<ReorderRule>,
        fields: BTreeMap<String, FieldRule>,
    ) -> Self {
        Self {
            denylist: denylist.into_iter().collect(),
            reorder,
            fields,
        }
    }

    /// Rules with no normalization at all: streams must match exactly.
    pub fn strict() -> Self {
        Self::new(Vec::new(), None, BTreeMap::new())
    }

    pub fn builtin() -> Self {
        let tracked: BTreeSet<String> = DEFAULT_TRACKED_SOURCES
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let mut fields = BTreeMap::new();
        fields.insert("move".to_owned(), FieldRule::CausalAttribution);
        for name in ["-damage", "-heal"] {
            fields.insert(
                name.to_owned(),
                FieldRule::DamageSource {
                    tracked: tracked.clone(),
                },
            );
        }
        Self::new(
            DEFAULT_DENYLIST.iter().map(|s| (*s).to_owned()),
            Some(ReorderRule::silent_status_before_switch(
                DEFAULT_REORDER_STATUSES.iter().copied(),
            )),
            fields,
        )
    }

    pub fn is_filtered(&self, name: &str) -> bool {
        self.denylist.contains(name)
    }

    pub fn field_rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    pub fn reorder(&self) -> Option<&ReorderRule> {
        self.reorder.as_ref()
    }
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    pub expected: Vec<ProtocolLine>,
    pub actual: Vec<ProtocolLine>,
}

/// Applies every rule to a reference (`expected`) and candidate (`actual`)
/// stream. Normalizing an already normalized pair changes nothing.
pub fn normalize(
    rules: &NormalizationRules,
    expected: &[ProtocolLine],
    actual: &[ProtocolLine],
) -> Normalized {
    let mut actual = actual.to_vec();
    if let Some(reorder) = rules.reorder() {
        reorder.apply(&mut actual);
    }

    let mut expected: Vec<ProtocolLine> = expected
        .iter()
        .filter(|line| !rules.is_filtered(line.name()))
        .cloned()
        .collect();
    for (index, line) in expected.iter_mut().enumerate() {
        suppress_fields(rules, line, actual.get(index));
    }

    Normalized { expected, actual }
}

fn suppress_fields(rules: &NormalizationRules, line: &mut ProtocolLine, paired: Option<&ProtocolLine>) {
    match rules.field_rule(line.name()) {
        Some(FieldRule::CausalAttribution) => {
            if line.has_kw("from") && !paired.is_some_and(|p| p.has_kw("from")) {
                line.kw_args.remove("from");
            }
        }
        Some(FieldRule::DamageSource { tracked }) => {
            if line.kw("from").is_some_and(|from| !tracked.contains(from)) {
                line.kw_args.remove("of");
            }
        }
        None => {}
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "protocol mismatch at event {index}: expected {}, found {}\n--- reference ---\n{reference}\n--- candidate ---\n{candidate}",
    describe(.expected),
    describe(.actual)
)]
pub struct ProtocolMismatch {
    pub index: usize,
    pub expected: Option<ProtocolLine>,
    pub actual: Option<ProtocolLine>,
    pub reference: String,
    pub candidate: String,
}

fn describe(line: &Option<ProtocolLine>) -> String {
    line.as_ref()
        .map_or_else(|| "<nothing>".to_owned(), |l| format!("'{l}'"))
}

/// Compares one turn of output event by event after normalization.
pub fn compare(
    rules: &NormalizationRules,
    reference: &EventLog,
    candidate: &EventLog,
) -> Result<(), Box<ProtocolMismatch>> {
    let Normalized { expected, actual } = normalize(rules, &reference.lines(), &candidate.lines());
    for index in 0..expected.len().max(actual.len()) {
        let (e, a) = (expected.get(index), actual.get(index));
        if e != a {
            return Err(Box::new(ProtocolMismatch {
                index,
                expected: e.cloned(),
                actual: a.cloned(),
                reference: reference.render(),
                candidate: candidate.render(),
            }));
        }
    }
    Ok(())
}
