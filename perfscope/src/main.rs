//! # perfscope - Main Entry Point
//!
//! Loads a perf record file, resolves symbols and prints the requested
//! views. `--export` additionally writes every view as a JSON report.
//! Set `RUST_LOG=perfscope=info` to follow the pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use perfscope::cli::{Args, TextReport};
use perfscope::config::SessionConfig;
use perfscope::export::ReportExporter;
use perfscope::session::ProfileSession;
use perfscope::SessionLog;
use std::fs::File;
use std::io::{BufWriter, Write};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version also arrive here and are not failures.
            let code = if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    let config = args.apply_to(config);

    let mut builder = ProfileSession::builder().config(config).logger(SessionLog::forwarding());
    if let Some(binary) = &args.binary {
        builder = builder.binary(binary);
    }

    let session = builder
        .load(&args.perf_file)
        .with_context(|| format!("Failed to load {}", args.perf_file.display()))?;

    info!(
        "{} v{}: {} records, {} functions",
        session.name(),
        session.version(),
        session.records().len(),
        session.function_table().len()
    );

    if !args.quiet {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        TextReport::new(&session, args.top)
            .write(&mut out, args.view)
            .context("Failed to write report")?;
        out.flush()?;
    }

    if let Some(export_path) = &args.export {
        let file = File::create(export_path)
            .with_context(|| format!("Failed to create {}", export_path.display()))?;
        ReportExporter::new(&session)
            .export(BufWriter::new(file))
            .with_context(|| format!("Failed to export report to {}", export_path.display()))?;
        if !args.quiet {
            println!("saved: {}", export_path.display());
        }
    }

    Ok(())
}
