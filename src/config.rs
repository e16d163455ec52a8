//! Pipeline configuration loaded from YAML.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes. Without `--config` the defaults describe the marketplace sales
//! export layout (`Date`, `Amount`, `Category`, `Status`, `ship-state`, ...).

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data::default_missing_tokens,
    io_utils::{self, DecodePolicy},
};

pub const DEFAULT_TOP_REGIONS: usize = 10;
pub const DEFAULT_OUTPUT_PREFIX: &str = "cleaned_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnBindings,
    pub cleaning: CleaningOptions,
    pub top_regions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnBindings::default(),
            cleaning: CleaningOptions::default(),
            top_regions: DEFAULT_TOP_REGIONS,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading configuration {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing configuration {path:?}"))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self)?;
        fs::write(path, serialized).with_context(|| format!("Writing configuration {path:?}"))
    }
}

/// Header names of the canonical columns the aggregator reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnBindings {
    pub date: String,
    pub amount: String,
    pub quantity: String,
    pub category: String,
    pub status: String,
    pub region: String,
    pub fulfilment: String,
}

impl Default for ColumnBindings {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            amount: "Amount".to_string(),
            quantity: "Qty".to_string(),
            category: "Category".to_string(),
            status: "Status".to_string(),
            region: "ship-state".to_string(),
            fulfilment: "Fulfilled-by".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub output_prefix: String,
    pub primary_encoding: String,
    pub fallback_encoding: String,
    pub missing_tokens: Vec<String>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            primary_encoding: "utf-8".to_string(),
            fallback_encoding: "iso-8859-1".to_string(),
            missing_tokens: default_missing_tokens(),
        }
    }
}

impl CleaningOptions {
    /// Builds the decode policy, letting `primary_override` replace the
    /// configured primary encoding.
    pub fn decode_policy(&self, primary_override: Option<&str>) -> Result<DecodePolicy> {
        let primary =
            io_utils::resolve_encoding(Some(primary_override.unwrap_or(&self.primary_encoding)))?;
        let fallback = io_utils::resolve_encoding(Some(&self.fallback_encoding))?;
        Ok(DecodePolicy::new(primary, fallback))
    }
}
