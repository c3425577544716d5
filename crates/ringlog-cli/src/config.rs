use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ringlog_core::record::DEFAULT_TAG;
use ringlog_core::DEFAULT_NAME;
use ringlog_types::RingConfig;
use serde::{Deserialize, Serialize};

use crate::cli::StoreArgs;

/// File picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "ringlog.toml";

/// Settings read from `ringlog.toml`. Every key is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub dir: PathBuf,
    pub name: String,
    pub capacity: u32,
    pub line_width: u32,
    pub tag: String,
    pub debug_level: u8,
}

impl Default for CliConfig {
    fn default() -> Self {
        let ring = RingConfig::default();
        Self {
            dir: PathBuf::from("."),
            name: DEFAULT_NAME.to_string(),
            capacity: ring.capacity,
            line_width: ring.line_width,
            tag: DEFAULT_TAG.to_string(),
            debug_level: 0,
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Load `explicit`, else [`CONFIG_FILE`] if it exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).is_file() => Self::load(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    /// Command-line flags take precedence over the file.
    pub fn apply(&mut self, args: &StoreArgs) {
        if let Some(dir) = &args.dir {
            self.dir = dir.clone();
        }
        if let Some(name) = &args.name {
            self.name = name.clone();
        }
        if let Some(capacity) = args.capacity {
            self.capacity = capacity;
        }
        if let Some(line_width) = args.line_width {
            self.line_width = line_width;
        }
        if let Some(level) = args.debug_level {
            self.debug_level = level;
        }
    }

    pub fn ring_config(&self) -> RingConfig {
        RingConfig::new(self.capacity, self.line_width)
    }
}
