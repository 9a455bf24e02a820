use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::tree::TreeNode;
use super::GenealogyEngine;
use crate::error::{Result, SeedError};
use crate::lot::LotStatus;
use crate::store::LotStore;

const CSV_HEADER: [&str; 7] = [
    "Parent ID",
    "Parent Level",
    "Child ID",
    "Child Level",
    "Quantity",
    "Production Date",
    "Status",
];

/// Output format for [`GenealogyEngine::export_genealogy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON tree.
    Json,
    /// One row per parent -> child edge.
    Csv,
    /// Graphviz digraph.
    Dot,
}

impl ExportFormat {
    /// Lowercase format name.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Dot => "dot",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "dot" => Ok(ExportFormat::Dot),
            _ => Err(SeedError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl<S: LotStore + ?Sized> GenealogyEngine<S> {
    /// Render the tree under `lot_id` (configured depth limit) in `format`.
    ///
    /// # Errors
    ///
    /// [`SeedError::LotNotFound`] when the lot does not exist.
    #[instrument(skip(self))]
    pub fn export_genealogy(&self, lot_id: &str, format: ExportFormat) -> Result<String> {
        let tree = self
            .get_tree(lot_id)?
            .ok_or_else(|| SeedError::LotNotFound(lot_id.to_string()))?;

        let out = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&tree)?,
            ExportFormat::Csv => to_csv(&tree)?,
            ExportFormat::Dot => to_dot(&tree),
        };
        debug!(nodes = tree.node_count(), bytes = out.len(), "Exported genealogy");
        Ok(out)
    }
}

fn to_csv(tree: &TreeNode) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for (parent, child) in tree.edges() {
        let quantity = child.quantity.to_string();
        let produced = child.production_date.to_string();
        writer.write_record([
            parent.id.as_str(),
            parent.level.as_str(),
            child.id.as_str(),
            child.level.as_str(),
            quantity.as_str(),
            produced.as_str(),
            child.status.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| {
        let inner = e.error();
        SeedError::Io(std::io::Error::new(inner.kind(), inner.to_string()))
    })?;
    String::from_utf8(bytes)
        .map_err(|e| SeedError::InvalidOperation(format!("csv output is not UTF-8: {}", e)))
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dot_color(status: LotStatus) -> &'static str {
    match status {
        LotStatus::Certified => "green",
        LotStatus::Rejected => "red",
        _ => "black",
    }
}

fn to_dot(tree: &TreeNode) -> String {
    let mut out = String::from("digraph genealogy {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [shape=box];\n");

    let mut nodes = vec![tree];
    while let Some(node) = nodes.pop() {
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n{}\\n{} kg\", color={}];",
            dot_escape(&node.id),
            dot_escape(&node.id),
            node.level,
            node.quantity,
            dot_color(node.status)
        );
        nodes.extend(node.children.iter().rev());
    }

    for (parent, child) in tree.edges() {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\";",
            dot_escape(&parent.id),
            dot_escape(&child.id)
        );
    }

    out.push_str("}\n");
    out
}
