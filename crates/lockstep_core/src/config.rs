use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{self, Context, Result};
use serde::Deserialize;

use crate::batch::{RunOptions, DEFAULT_CYCLES};
use crate::prng::{Generation, Seed};
use crate::protocol::{
    FieldRule, NormalizationRules, ReorderRule, DEFAULT_DENYLIST, DEFAULT_REORDER_STATUSES,
    DEFAULT_TRACKED_SOURCES,
};

pub const DEFAULT_LOGS_DIR: &str = "logs";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LockstepConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

impl LockstepConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let cfg: LockstepConfig = toml::from_str(data)?;
        Ok(cfg)
    }

    pub fn run_options(&self) -> Result<RunOptions> {
        self.run.options()
    }

    pub fn rules(&self) -> NormalizationRules {
        self.normalization.rules()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.report
            .as_ref()
            .and_then(|r| r.logs_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR))
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RunConfig {
    #[serde(default)]
    pub cycles: Option<usize>,
    #[serde(default)]
    pub max_failures: Option<usize>,
    #[serde(default)]
    pub gen: Option<u8>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub seed: Option<String>,
}

impl RunConfig {
    pub fn debug_enabled(&self) -> bool {
        self.debug.unwrap_or(true)
    }

    pub fn options(&self) -> Result<RunOptions> {
        let duration = self.duration.as_deref().map(parse_duration).transpose()?;
        let generation = self.gen.map(Generation::new).transpose()?;
        let seed = self
            .seed
            .as_deref()
            .map(str::parse::<Seed>)
            .transpose()?;
        // A timed run repeats whole rounds, so each round defaults to one cycle.
        let cycles = self
            .cycles
            .unwrap_or(if duration.is_some() { 1 } else { DEFAULT_CYCLES });
        Ok(RunOptions {
            cycles,
            max_failures: self.max_failures.unwrap_or(1),
            generation,
            duration,
            debug: self.debug_enabled(),
            seed,
        })
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct NormalizationConfig {
    #[serde(default)]
    pub denylist: Option<Vec<String>>,
    #[serde(default)]
    pub reorder: ReorderConfig,
    #[serde(default)]
    pub attribution: Toggle,
    #[serde(default)]
    pub damage_sources: DamageSourceConfig,
}

impl NormalizationConfig {
    pub fn rules(&self) -> NormalizationRules {
        let denylist = self
            .denylist
            .clone()
            .unwrap_or_else(|| DEFAULT_DENYLIST.iter().map(|s| (*s).to_owned()).collect());

        let reorder = self.reorder.enabled().then(|| {
            ReorderRule::silent_status_before_switch(match &self.reorder.statuses {
                Some(statuses) => statuses.clone(),
                None => owned(DEFAULT_REORDER_STATUSES),
            })
        });

        let mut fields = BTreeMap::new();
        if self.attribution.enabled() {
            fields.insert("move".to_owned(), FieldRule::CausalAttribution);
        }
        if self.damage_sources.enabled() {
            let tracked: BTreeSet<String> = match &self.damage_sources.tracked {
                Some(tracked) => tracked.iter().cloned().collect(),
                None => owned(DEFAULT_TRACKED_SOURCES).into_iter().collect(),
            };
            for name in ["-damage", "-heal"] {
                fields.insert(
                    name.to_owned(),
                    FieldRule::DamageSource {
                        tracked: tracked.clone(),
                    },
                );
            }
        }

        NormalizationRules::new(denylist, reorder, fields)
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Toggle {
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl Toggle {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReorderConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub statuses: Option<Vec<String>>,
}

impl ReorderConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DamageSourceConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tracked: Option<Vec<String>>,
}

impl DamageSourceConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
}

/// Parses `250ms`, `30s`, `5m`, `2h`; a bare number is milliseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    if number.is_empty() {
        anyhow::bail!("invalid duration {input:?} (missing number)");
    }
    let value: u64 = number
        .parse()
        .with_context(|| format!("invalid duration number in {input:?}"))?;
    let duration = match unit {
        "" | "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(60 * 60)),
        _ => anyhow::bail!("invalid duration unit {unit:?} (expected ms|s|m|h)"),
    };
    Ok(duration)
}
