//! Defaults loaded from `--config <file.json>`.
//!
//! Every section is optional; command-line flags override what the file sets.
//!
//! ```json
//! {
//!   "lm":    { "variance_method": "ml", "conf_level": 0.9 },
//!   "glm":   { "family": "poisson", "irls": { "max_iterations": 50 } },
//!   "study": { "n": 15, "replicates": 500, "seed": 1 },
//!   "plot":  { "width": 800, "height": 600 }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rustylm_core::{GlmOptions, LmOptions, StudyConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub lm: LmOptions,
    pub glm: GlmOptions,
    pub study: StudyConfig,
    pub plot: PlotConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

pub fn load(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}
