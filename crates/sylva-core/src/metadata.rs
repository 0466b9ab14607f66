use serde::{Deserialize, Serialize};

use crate::span::SpanRange;

/// Semantic classification of a node, distinct from its structural `type`.
///
/// The spellings here are part of the wire contract and of the node-id
/// format, so the serde names are the canonical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Class,
    Function,
    Method,
    Import,
    SmallStmt,
    Stmt,
    Node,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Import => "import",
            NodeKind::SmallStmt => "smallstmt",
            NodeKind::Stmt => "stmt",
            NodeKind::Node => "node",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(NodeKind::Class),
            "function" => Some(NodeKind::Function),
            "method" => Some(NodeKind::Method),
            "import" => Some(NodeKind::Import),
            "smallstmt" => Some(NodeKind::SmallStmt),
            "stmt" => Some(NodeKind::Stmt),
            "node" => Some(NodeKind::Node),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight description of one CST node, sent to clients in place of the
/// tree itself.
///
/// `code` is populated only when a caller explicitly asks for the source
/// slice; everything else is computed at index time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualname: Option<String>,
    #[serde(flatten)]
    pub span: SpanRange,
    pub children_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl NodeMetadata {
    /// Stable node-id string:
    /// `{kind}:{qualname|""}:{type}:{start_line}:{start_col}-{end_line}:{end_col}`.
    pub fn format_node_id(
        kind: NodeKind,
        qualname: Option<&str>,
        node_type: &str,
        span: &SpanRange,
    ) -> String {
        format!(
            "{}:{}:{}:{}",
            kind.as_str(),
            qualname.unwrap_or(""),
            node_type,
            span
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_format_matches_contract() {
        let span = SpanRange::new(2, 5, 3, 17);
        let id = NodeMetadata::format_node_id(NodeKind::Method, Some("A.f"), "FunctionDef", &span);
        assert_eq!(id, "method:A.f:FunctionDef:2:5-3:17");

        let id = NodeMetadata::format_node_id(NodeKind::Stmt, None, "If", &span);
        assert_eq!(id, "stmt::If:2:5-3:17");
    }

    #[test]
    fn metadata_serializes_without_empty_fields() {
        let meta = NodeMetadata {
            node_id: "stmt::If:1:1-2:1".into(),
            node_type: "If".into(),
            kind: NodeKind::Stmt,
            name: None,
            qualname: None,
            span: SpanRange::new(1, 1, 2, 1),
            children_count: 0,
            children_ids: vec![],
            parent_id: None,
            code: None,
        };
        let value = serde_json::to_value(&meta).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("type"));
        assert!(obj.contains_key("start_line"));
        assert!(!obj.contains_key("name"));
        assert!(!obj.contains_key("children_ids"));
        assert_eq!(obj["kind"], "stmt");
    }
}
