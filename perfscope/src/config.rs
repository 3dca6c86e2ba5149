//! Session configuration
//!
//! Every field has a default, so an empty JSON object (or no config file at
//! all) yields the stock behaviour. CLI flags override whatever was loaded.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Program used to dump symbols from the profiled binary and debug libraries
    pub nm_program: String,

    /// Kernel symbol file, `None` disables kernel symbols
    pub kernel_symbols: Option<PathBuf>,

    /// Root under which separate debug objects for mapped libraries live,
    /// `None` disables the lookup
    pub debug_library_root: Option<PathBuf>,

    /// Call tree nodes whose share of total inclusive time falls below this
    /// fraction are pruned
    pub prune_threshold: f64,

    /// Heat map bucket width in milliseconds
    pub heat_map_bucket_ms: u64,

    /// Width of the placeholder region registered around an unmapped address
    pub unresolved_region_width: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            nm_program: "nm".to_string(),
            kernel_symbols: Some(PathBuf::from("/proc/kallsyms")),
            debug_library_root: Some(PathBuf::from("/usr/lib/debug")),
            prune_threshold: 0.0001,
            heat_map_bucket_ms: 10,
            unresolved_region_width: 200,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid config JSON
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse config from a JSON string
    ///
    /// # Errors
    /// Returns an error if the text is not valid config JSON
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
