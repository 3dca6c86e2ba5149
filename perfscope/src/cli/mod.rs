//! Command-line front end: argument parsing and text output

pub mod args;
pub mod report;

pub use args::{Args, View};
pub use report::TextReport;
