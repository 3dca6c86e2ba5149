//! Plain-text rendering of session views for the terminal
//!
//! ```text
//! FLAT PROFILE (4 samples)
//!   self%   self  incl%   incl  calls  function
//!   50.00      2  50.00      2      4  leaf
//!   25.00      1  75.00      3      4  work
//! ```

use super::args::View;
use crate::analysis::CallTreeNode;
use crate::domain::FunctionId;
use crate::session::ProfileSession;
use std::io::{self, Write};

/// Renders the selected views of a session
pub struct TextReport<'a> {
    session: &'a ProfileSession,
    /// Rows per view, 0 for all
    top: usize,
}

impl<'a> TextReport<'a> {
    #[must_use]
    pub fn new(session: &'a ProfileSession, top: usize) -> Self {
        Self { session, top }
    }

    fn limit(&self, len: usize) -> usize {
        if self.top == 0 {
            len
        } else {
            self.top.min(len)
        }
    }

    fn name(&self, id: FunctionId) -> &str {
        self.session.function_table().name(id)
    }

    /// Write every view `view` selects
    ///
    /// # Errors
    /// Returns an error if writing fails
    pub fn write<W: Write>(&self, out: &mut W, view: View) -> io::Result<()> {
        if view.includes(View::Flat) {
            self.write_flat_profile(out)?;
        }
        if view.includes(View::Graph) {
            self.write_call_graph(out)?;
        }
        if view.includes(View::Tree) {
            self.write_call_tree(out)?;
        }
        if view.includes(View::Heatmap) {
            self.write_heat_map(out)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if writing fails
    pub fn write_flat_profile<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let profile = self.session.flat_profile();
        let rows = profile.by_self_time();
        let rows: Vec<_> = rows.into_iter().filter(|r| r.inclusive_time > 0).collect();

        writeln!(out, "FLAT PROFILE ({} samples)", profile.total_self_time())?;
        writeln!(out, "  {:>6} {:>6} {:>6} {:>6} {:>6}  function", "self%", "self", "incl%", "incl", "calls")?;
        for row in &rows[..self.limit(rows.len())] {
            writeln!(
                out,
                "  {:>6.2} {:>6} {:>6.2} {:>6} {:>6}  {}",
                row.self_time_pct,
                row.self_time,
                row.inclusive_time_pct,
                row.inclusive_time,
                row.call_count,
                self.name(row.function_id)
            )?;
        }
        writeln!(out)
    }

    /// # Errors
    /// Returns an error if writing fails
    pub fn write_call_graph<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut edges: Vec<_> = self.session.call_graph().edges().collect();
        edges.sort_by(|a, b| b.weight.cmp(&a.weight));

        writeln!(out, "CALL GRAPH ({} edges)", edges.len())?;
        for edge in &edges[..self.limit(edges.len())] {
            writeln!(
                out,
                "  {:>6}  {} -> {}",
                edge.weight,
                self.name(edge.caller),
                self.name(edge.callee)
            )?;
        }
        writeln!(out)
    }

    /// # Errors
    /// Returns an error if writing fails
    pub fn write_call_tree<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let tree = self.session.call_tree();
        writeln!(out, "CALL TREE ({} nodes)", tree.len())?;

        let mut printed = 0;
        let mut stack: Vec<(&CallTreeNode, usize)> =
            tree.roots().values().rev().filter_map(|&id| tree.node(id)).map(|n| (n, 0)).collect();

        while let Some((node, depth)) = stack.pop() {
            if self.top != 0 && printed >= self.top {
                break;
            }
            writeln!(
                out,
                "  {:indent$}{} ({} samples, {:.2}%)",
                "",
                self.name(node.function_id),
                node.sample_count,
                node.inclusive_time_pct,
                indent = depth * 2
            )?;
            printed += 1;
            stack.extend(
                node.children.values().rev().filter_map(|&id| tree.node(id)).map(|n| (n, depth + 1)),
            );
        }
        writeln!(out)
    }

    /// # Errors
    /// Returns an error if writing fails
    pub fn write_heat_map<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let heat_map = self.session.heat_map();
        writeln!(
            out,
            "HEAT MAP ({} buckets of {} ms)",
            heat_map.bucket_count(),
            heat_map.bucket_width_ms
        )?;

        // Empty buckets are not stored and not listed
        for (&index, bucket) in heat_map.buckets.iter().take(self.limit(heat_map.buckets.len())) {
            let offset_ms = index.saturating_mul(heat_map.bucket_width_ms);
            let hottest = bucket.iter().max_by_key(|(_, cell)| cell.self_samples);
            match hottest {
                Some((&id, cell)) if cell.self_samples > 0 => writeln!(
                    out,
                    "  {:>8} ms  {:>4} samples  hottest: {}",
                    offset_ms,
                    bucket.values().map(|c| c.self_samples).sum::<u64>(),
                    self.name(id)
                )?,
                _ => writeln!(out, "  {:>8} ms  {:>4} samples", offset_ms, 0)?,
            }
        }
        writeln!(out)
    }
}
