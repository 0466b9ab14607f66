use serde::{Deserialize, Serialize};

/// Replacement/insertion code, given either as a single string or as a list
/// of line strings. The two forms are equivalent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_lines: Option<Vec<String>>,
}

impl CodeInput {
    pub fn from_str(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            code_lines: None,
        }
    }

    /// Normalized text form. `None` when neither field was given; an empty
    /// string still means "delete" for replace operations.
    pub fn text(&self) -> Option<String> {
        match (&self.code, &self.code_lines) {
            (Some(code), _) => Some(code.clone()),
            (None, Some(lines)) => Some(lines.join("\n")),
            (None, None) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().map_or(true, |t| t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Before,
    After,
}

/// One mutation in a `modify` batch.
///
/// Batches are all-or-nothing: every operation is validated against the
/// pre-batch index before any of them is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TreeOperation {
    Replace {
        node_id: String,
        #[serde(flatten)]
        code: CodeInput,
    },
    ReplaceRange {
        start_node_id: String,
        end_node_id: String,
        #[serde(flatten)]
        code: CodeInput,
    },
    Insert {
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_node_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_node_id: Option<String>,
        position: InsertPosition,
        #[serde(flatten)]
        code: CodeInput,
    },
    Delete {
        node_id: String,
    },
}

impl TreeOperation {
    /// Short name used in error messages and per-op summaries.
    pub fn action(&self) -> &'static str {
        match self {
            TreeOperation::Replace { .. } => "replace",
            TreeOperation::ReplaceRange { .. } => "replace_range",
            TreeOperation::Insert { .. } => "insert",
            TreeOperation::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_round_trip_through_wire_shape() {
        let json = serde_json::json!({
            "action": "replace",
            "node_id": "function:f:FunctionDef:1:1-2:5",
            "code": "def f():\n    return 2\n",
        });
        let op: TreeOperation = serde_json::from_value(json).unwrap();
        match &op {
            TreeOperation::Replace { node_id, code } => {
                assert_eq!(node_id, "function:f:FunctionDef:1:1-2:5");
                assert!(code.text().unwrap().contains("return 2"));
            }
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn code_lines_are_equivalent_to_code() {
        let json = serde_json::json!({
            "action": "insert",
            "parent_node_id": "node::Module:1:1-3:1",
            "position": "after",
            "code_lines": ["import os", "import sys"],
        });
        let op: TreeOperation = serde_json::from_value(json).unwrap();
        match op {
            TreeOperation::Insert { code, position, .. } => {
                assert_eq!(position, InsertPosition::After);
                assert_eq!(code.text().unwrap(), "import os\nimport sys");
            }
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn missing_code_is_reported_empty() {
        let input = CodeInput::default();
        assert!(input.text().is_none());
        assert!(input.is_empty());
    }
}
