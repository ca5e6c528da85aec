//! Error-tolerant parsing: measure how much of a tree is ERROR / MISSING.

use tree_sitter::Node;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorStats {
    pub error_nodes: usize,
    pub total_nodes: usize,
}

impl ErrorStats {
    /// Share of nodes that are ERROR or MISSING.
    pub fn ratio(&self) -> f64 {
        if self.total_nodes == 0 {
            return 0.0;
        }
        self.error_nodes as f64 / self.total_nodes as f64
    }
}

/// Count ERROR and MISSING nodes with a cursor walk (no recursion).
pub fn count_errors(root: Node) -> ErrorStats {
    let mut stats = ErrorStats::default();
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        stats.total_nodes += 1;
        if node.is_error() || node.is_missing() {
            stats.error_nodes += 1;
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return stats;
            }
        }
    }
}

/// Check if a node is inside an ERROR subtree.
pub fn is_in_error(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.is_error() {
            return true;
        }
        current = parent.parent();
    }
    false
}
