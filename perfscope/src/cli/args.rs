//! CLI argument definitions

use crate::config::SessionConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which views to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    Flat,
    Graph,
    Tree,
    Heatmap,
    All,
}

impl View {
    #[must_use]
    pub fn includes(self, other: View) -> bool {
        self == View::All || self == other
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "perfscope",
    version,
    about = "Analyze perf record files: flat profile, call graph, call tree and heat map",
    after_help = "\
EXAMPLES:
    perfscope perf.data --binary ./myapp              Flat profile with application symbols
    perfscope perf.data --binary ./myapp --view tree  Pruned call tree
    perfscope perf.data --no-kernel --export out.json Write every view as JSON"
)]
pub struct Args {
    /// perf record file (format version 2)
    #[arg(value_name = "PERF_FILE")]
    pub perf_file: PathBuf,

    /// Profiled application binary, symbols read with nm
    #[arg(short, long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// nm program used for symbol dumps
    #[arg(long, value_name = "PATH")]
    pub nm: Option<String>,

    /// Kernel symbol file
    #[arg(long, value_name = "PATH", conflicts_with = "no_kernel")]
    pub kallsyms: Option<PathBuf>,

    /// Do not load kernel symbols
    #[arg(long)]
    pub no_kernel: bool,

    /// Root of separate debug objects for mapped libraries
    #[arg(long, value_name = "PATH", conflicts_with = "no_debug_libs")]
    pub debug_root: Option<PathBuf>,

    /// Do not look for debug objects of mapped libraries
    #[arg(long)]
    pub no_debug_libs: bool,

    /// JSON config file; flags given here take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Views to print
    #[arg(long, value_enum, default_value_t = View::Flat)]
    pub view: View,

    /// Rows to print per view (0 = all)
    #[arg(long, default_value = "20", value_name = "N")]
    pub top: usize,

    /// Write every view to a JSON report
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress printed views (useful with --export)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Layer CLI flags over a loaded (or default) config
    #[must_use]
    pub fn apply_to(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(nm) = &self.nm {
            config.nm_program.clone_from(nm);
        }
        if self.no_kernel {
            config.kernel_symbols = None;
        } else if let Some(path) = &self.kallsyms {
            config.kernel_symbols = Some(path.clone());
        }
        if self.no_debug_libs {
            config.debug_library_root = None;
        } else if let Some(path) = &self.debug_root {
            config.debug_library_root = Some(path.clone());
        }
        config
    }
}
