//! Tree Outline
//!
//! Renders every node of a settings tree with its name, node type, position
//! within its parent and full path, indented by depth.

use std::fmt::Write as _;

use serde::Serialize;
use shim_types::{Setting, join_path};

/// One visited node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    /// Setting name; list elements are unnamed
    pub name: Option<String>,
    pub node_type: &'static str,
    /// Position within the parent
    pub index: usize,
    pub path: String,
    pub depth: usize,
}

/// Depth-first, pre-order list of every node below `root`
pub fn nodes(root: &Setting) -> Vec<NodeInfo> {
    let mut out = Vec::new();
    visit(root, "", 0, &mut out);
    out
}

fn visit(node: &Setting, path: &str, depth: usize, out: &mut Vec<NodeInfo>) {
    for (index, (name, child)) in node.children().into_iter().enumerate() {
        let segment = match name {
            Some(name) => name.to_string(),
            None => format!("[{index}]"),
        };
        let child_path = join_path(path, &segment);
        out.push(NodeInfo {
            name: name.map(str::to_string),
            node_type: child.kind_name(),
            index,
            path: child_path.clone(),
            depth,
        });
        if child.is_aggregate() {
            visit(child, &child_path, depth + 1, out);
        }
    }
}

/// Indented text rendering of [`nodes`]
pub fn outline(root: &Setting) -> String {
    let mut out = String::new();
    for node in nodes(root) {
        let indent = "  ".repeat(node.depth);
        let name = node.name.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "{indent}name = {name}, type = {}, index = {}, path = {}",
            node.node_type, node.index, node.path
        );
    }
    out
}
