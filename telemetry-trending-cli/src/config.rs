//! Configuration loading and parsing
//!
//! The trending configuration replaces hard-coded mnemonic tables: every
//! condition group names the mnemonics to trend and the recipe for the
//! condition they are filtered by.

use crate::loader::MnemonicData;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use telemetry_trending::{LampSettings, Relation, SampleValue, SubCondition};

/// Main application configuration (loaded from trending.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Mnemonics trended without any condition
    #[serde(default)]
    pub passthrough: Vec<String>,
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroupConfig>,
    pub lamp: Option<LampConfig>,
    #[serde(default)]
    pub wheels: Vec<WheelConfig>,
    #[serde(default)]
    pub nominal_wheels: Vec<NominalWheelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Series shorter than this get no summary statistics
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            min_data_points: default_min_data_points(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("trending-output")
}

fn default_min_data_points() -> usize {
    3
}

/// A set of mnemonics extracted under one condition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionGroupConfig {
    pub name: String,
    pub mnemonics: Vec<String>,
    /// Recipes ANDed into the group condition; empty means always true
    #[serde(default)]
    pub conditions: Vec<ConditionRecipe>,
}

/// How to build one sub-condition from a loaded mnemonic
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionRecipe {
    pub mnemonic: String,
    pub relation: Relation,
    pub value: SampleValue,
    /// Defaults to string comparison for equal/unequal
    pub compare_as_string: Option<bool>,
}

impl ConditionRecipe {
    /// Build the sub-condition against the loaded streams
    pub fn build<'a>(&self, data: &'a MnemonicData) -> Result<SubCondition<'a>> {
        let reference = data.require(&self.mnemonic)?;
        Ok(SubCondition::new(
            reference,
            self.relation,
            self.value.clone(),
            self.compare_as_string.unwrap_or(true),
        ))
    }
}

/// Channels of the calibration lamp assembly
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LampConfig {
    pub flag: String,
    pub selector: String,
    pub current: String,
    pub voltage: String,
    #[serde(flatten)]
    pub settings: LampSettings,
}

/// Channels of one tracked mechanism
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WheelConfig {
    pub name: String,
    pub move_status: String,
    pub position: String,
    pub value: String,
}

/// A mechanism whose readings are matched against nominal values per position
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NominalWheelConfig {
    pub name: String,
    /// Reported position label
    pub position: String,
    /// Position sensor reading (ratio)
    pub ratio: String,
    /// When the sensor reading is valid, e.g. supply voltage above threshold
    #[serde(default)]
    pub conditions: Vec<ConditionRecipe>,
    /// Nominal reading per position label
    pub nominals: BTreeMap<String, f64>,
}

/// Configuration problems found after parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Duplicate condition group name: {0}")]
    DuplicateGroup(String),

    #[error("Duplicate wheel name: {0}")]
    DuplicateWheel(String),

    #[error("Condition group {0} has no mnemonics")]
    EmptyGroup(String),

    #[error("Wheel {0} has no nominal values")]
    EmptyNominals(String),
}

impl AppConfig {
    /// Check that group and wheel names are unique and nothing is left empty
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut groups = HashSet::new();
        for group in &self.condition_groups {
            if !groups.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            if group.mnemonics.is_empty() {
                return Err(ConfigError::EmptyGroup(group.name.clone()));
            }
        }

        // Both kinds of wheel report into the same map
        let mut wheels = HashSet::new();
        for wheel in &self.wheels {
            if !wheels.insert(wheel.name.as_str()) {
                return Err(ConfigError::DuplicateWheel(wheel.name.clone()));
            }
        }
        for wheel in &self.nominal_wheels {
            if !wheels.insert(wheel.name.as_str()) {
                return Err(ConfigError::DuplicateWheel(wheel.name.clone()));
            }
            if wheel.nominals.is_empty() {
                return Err(ConfigError::EmptyNominals(wheel.name.clone()));
            }
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}
