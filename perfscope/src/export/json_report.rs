use crate::analysis::{CallGraphEdge, CallTree, CallTreeNode, FlatProfileRecord, HeatMap};
use crate::domain::{ExportError, FunctionId};
use crate::session::ProfileSession;
use crate::symbolization::FunctionEntry;
use serde::Serialize;
use std::io::Write;

/// Report document root
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    tool: &'static str,
    version: &'static str,
    functions: Vec<FunctionRow<'a>>,
    flat_profile: &'a [FlatProfileRecord],
    call_graph: Vec<CallGraphEdge>,
    call_tree: Vec<TreeNode>,
    heat_map: &'a HeatMap,
}

#[derive(Debug, Serialize)]
struct FunctionRow<'a> {
    id: FunctionId,
    #[serde(flatten)]
    entry: &'a FunctionEntry,
}

/// Call tree node with its children nested inline
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeNode {
    function_id: FunctionId,
    inclusive_time: u64,
    inclusive_time_pct: f64,
    sample_count: u64,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(node: &CallTreeNode) -> Self {
        Self {
            function_id: node.function_id,
            inclusive_time: node.inclusive_time,
            inclusive_time_pct: node.inclusive_time_pct,
            sample_count: node.sample_count,
            children: Vec::new(),
        }
    }
}

/// Nest the arena into owned trees without recursion
fn nested_forest(tree: &CallTree) -> Vec<TreeNode> {
    // Post-order over the arena: children are finished before their parent.
    let mut finished: Vec<Option<TreeNode>> = tree.nodes().iter().map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = tree.roots().values().map(|id| (id.0, false)).collect();

    while let Some((index, expanded)) = stack.pop() {
        let node = &tree.nodes()[index];
        if expanded {
            let mut built = TreeNode::leaf(node);
            built.children =
                node.children.values().filter_map(|child| finished[child.0].take()).collect();
            finished[index] = Some(built);
        } else {
            stack.push((index, true));
            stack.extend(node.children.values().map(|child| (child.0, false)));
        }
    }

    tree.roots().values().filter_map(|id| finished[id.0].take()).collect()
}

/// Writes a session's views as one JSON document
pub struct ReportExporter<'a> {
    session: &'a ProfileSession,
}

impl<'a> ReportExporter<'a> {
    #[must_use]
    pub fn new(session: &'a ProfileSession) -> Self {
        Self { session }
    }

    /// Serialize the report to `writer`
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let session = self.session;
        let report = Report {
            tool: session.name(),
            version: session.version(),
            functions: session
                .function_table()
                .iter()
                .map(|(id, entry)| FunctionRow { id, entry })
                .collect(),
            flat_profile: session.flat_profile().rows(),
            call_graph: session.call_graph().edges().collect(),
            call_tree: nested_forest(session.call_tree()),
            heat_map: session.heat_map(),
        };

        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the report into a string
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn export_to_string(&self) -> Result<String, ExportError> {
        let mut buffer = Vec::new();
        self.export(&mut buffer)?;
        String::from_utf8(buffer).map_err(|err| ExportError::SerializationFailed(err.to_string()))
    }
}
