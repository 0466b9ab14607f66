//! Node index construction: walk the parse tree depth-first and build the
//! record, metadata, and parent maps in document order.
//!
//! Only named grammar nodes are indexed. Node ids are deterministic for a
//! given tree: the same file loaded twice with the same options yields the
//! same id strings.

use indexmap::IndexMap;
use sylva_core::{NodeKind, NodeMetadata, SpanRange};
use tree_sitter::{Node, Tree};

use crate::tree::{IndexOptions, NodeRecord};

pub struct BuiltIndex {
    pub node_map: IndexMap<String, NodeRecord>,
    pub metadata_map: IndexMap<String, NodeMetadata>,
    pub parent_map: IndexMap<String, Option<String>>,
}

/// Grammar kinds that are simple (one-line) statements.
const SMALL_STATEMENTS: &[&str] = &[
    "expression_statement",
    "return_statement",
    "pass_statement",
    "break_statement",
    "continue_statement",
    "raise_statement",
    "assert_statement",
    "global_statement",
    "nonlocal_statement",
    "delete_statement",
    "exec_statement",
    "print_statement",
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

/// Grammar kinds that are compound statements.
const COMPOUND_STATEMENTS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "match_statement",
    "decorated_definition",
];

/// Structural display type for a grammar kind. The spellings follow the
/// statement-line vocabulary clients already know; unknown kinds fall back
/// to CamelCase.
pub fn display_type(ts_kind: &str) -> String {
    match ts_kind {
        "module" => "Module".into(),
        "class_definition" => "ClassDef".into(),
        "function_definition" => "FunctionDef".into(),
        "decorated_definition" => "Decorated".into(),
        "if_statement" => "If".into(),
        "for_statement" => "For".into(),
        "while_statement" => "While".into(),
        "with_statement" => "With".into(),
        "try_statement" => "Try".into(),
        "match_statement" => "Match".into(),
        "return_statement" => "Return".into(),
        "pass_statement" => "Pass".into(),
        "break_statement" => "Break".into(),
        "continue_statement" => "Continue".into(),
        "raise_statement" => "Raise".into(),
        "assert_statement" => "Assert".into(),
        "global_statement" => "Global".into(),
        "nonlocal_statement" => "Nonlocal".into(),
        "delete_statement" => "Del".into(),
        "import_statement" => "Import".into(),
        "import_from_statement" => "ImportFrom".into(),
        "future_import_statement" => "ImportFrom".into(),
        "expression_statement" => "SimpleStatementLine".into(),
        "block" => "IndentedBlock".into(),
        "identifier" => "Name".into(),
        "assignment" => "Assign".into(),
        "augmented_assignment" => "AugAssign".into(),
        other => camel_case(other),
    }
}

fn camel_case(kind: &str) -> String {
    kind.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn kind_of(ts_kind: &str, in_class: bool) -> NodeKind {
    match ts_kind {
        "class_definition" => NodeKind::Class,
        "function_definition" => {
            if in_class {
                NodeKind::Method
            } else {
                NodeKind::Function
            }
        }
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            NodeKind::Import
        }
        k if SMALL_STATEMENTS.contains(&k) => NodeKind::SmallStmt,
        k if COMPOUND_STATEMENTS.contains(&k) => NodeKind::Stmt,
        _ => NodeKind::Node,
    }
}

fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "class_definition" | "function_definition" => {
            let name = node.child_by_field_name("name")?;
            source
                .get(name.start_byte()..name.end_byte())
                .map(|s| s.to_string())
        }
        "identifier" => source
            .get(node.start_byte()..node.end_byte())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn node_qualname(
    ts_kind: &str,
    name: Option<&str>,
    class_stack: &[String],
    func_stack: &[String],
) -> Option<String> {
    let join = |parts: Vec<&str>| -> Option<String> {
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        }
    };
    match (ts_kind, name) {
        ("class_definition", Some(name)) => {
            let mut parts: Vec<&str> = class_stack.iter().map(String::as_str).collect();
            parts.push(name);
            join(parts)
        }
        ("function_definition", Some(name)) => {
            let mut parts: Vec<&str> = class_stack.iter().map(String::as_str).collect();
            parts.extend(func_stack.iter().map(String::as_str));
            parts.push(name);
            join(parts)
        }
        _ => {
            let mut parts: Vec<&str> = class_stack.iter().map(String::as_str).collect();
            parts.extend(func_stack.iter().map(String::as_str));
            join(parts)
        }
    }
}

fn span_of(node: Node<'_>) -> SpanRange {
    let start = node.start_position();
    let end = node.end_position();
    SpanRange::new(
        start.row as u32 + 1,
        start.column as u32 + 1,
        end.row as u32 + 1,
        end.column as u32 + 1,
    )
}

struct Walker<'a> {
    source: &'a str,
    options: &'a IndexOptions,
    type_filter: Option<Vec<String>>,
    class_stack: Vec<String>,
    func_stack: Vec<String>,
    node_map: IndexMap<String, NodeRecord>,
    metadata_map: IndexMap<String, NodeMetadata>,
    parent_map: IndexMap<String, Option<String>>,
}

impl Walker<'_> {
    fn visit(&mut self, node: Node<'_>, depth: usize, parent_id: Option<&str>) {
        if self
            .options
            .max_depth
            .is_some_and(|max_depth| depth > max_depth)
        {
            return;
        }

        let ts_kind = node.kind();
        let node_type = display_type(ts_kind);
        let indexed = self
            .type_filter
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| *t == node_type.to_lowercase()));

        let mut own_id: Option<String> = None;
        if indexed {
            let kind = kind_of(ts_kind, !self.class_stack.is_empty());
            let name = node_name(node, self.source);
            let qualname =
                node_qualname(ts_kind, name.as_deref(), &self.class_stack, &self.func_stack);
            let span = span_of(node);
            let node_id =
                NodeMetadata::format_node_id(kind, qualname.as_deref(), &node_type, &span);

            self.node_map.insert(
                node_id.clone(),
                NodeRecord {
                    start_byte: node.start_byte(),
                    end_byte: node.end_byte(),
                    ts_kind,
                },
            );
            self.parent_map
                .insert(node_id.clone(), parent_id.map(|p| p.to_string()));
            self.metadata_map.insert(
                node_id.clone(),
                NodeMetadata {
                    node_id: node_id.clone(),
                    node_type,
                    kind,
                    name,
                    qualname,
                    span,
                    children_count: 0,
                    children_ids: Vec::new(),
                    parent_id: parent_id.map(|p| p.to_string()),
                    code: None,
                },
            );
            own_id = Some(node_id);
        }

        let entered_class = ts_kind == "class_definition";
        let entered_func = ts_kind == "function_definition";
        if entered_class {
            if let Some(name) = node_name(node, self.source) {
                self.class_stack.push(name);
            }
        } else if entered_func {
            if let Some(name) = node_name(node, self.source) {
                self.func_stack.push(name);
            }
        }

        // Children of a filtered-out node chain up to the nearest indexed
        // ancestor so the parent/children invariant holds under filters.
        let child_parent = own_id.as_deref().or(parent_id);
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                if child.is_named() {
                    self.visit(child, depth + 1, child_parent);
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }

        if entered_class {
            self.class_stack.pop();
        } else if entered_func {
            self.func_stack.pop();
        }
    }
}

/// Build the three maps for a parsed tree. Document order (DFS pre-order)
/// is preserved by the index maps and is part of the query contract.
pub fn build_index(source: &str, tree: &Tree, options: &IndexOptions) -> BuiltIndex {
    let type_filter = options
        .node_types
        .as_ref()
        .map(|types| types.iter().map(|t| t.to_lowercase()).collect());

    let mut walker = Walker {
        source,
        options,
        type_filter,
        class_stack: Vec::new(),
        func_stack: Vec::new(),
        node_map: IndexMap::new(),
        metadata_map: IndexMap::new(),
        parent_map: IndexMap::new(),
    };
    walker.visit(tree.root_node(), 0, None);

    let Walker {
        node_map,
        mut metadata_map,
        parent_map,
        ..
    } = walker;

    // Second pass: fill children lists from the parent links so that every
    // parent_id points at a node whose children_ids contains the child.
    let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
    for (id, parent) in &parent_map {
        if let Some(parent) = parent {
            children.entry(parent.clone()).or_default().push(id.clone());
        }
    }
    for (id, meta) in metadata_map.iter_mut() {
        let ids = children.shift_remove(id).unwrap_or_default();
        meta.children_count = ids.len();
        if options.include_children {
            meta.children_ids = ids;
        }
    }

    BuiltIndex {
        node_map,
        metadata_map,
        parent_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::CstTree;
    use sylva_core::NodeKind;

    const SAMPLE: &str = "class A:\n    def f(self):\n        return 1\n";

    fn load(source: &str) -> CstTree {
        CstTree::from_source("/tmp/sample.py", source.to_string(), IndexOptions::all()).unwrap()
    }

    #[test]
    fn ids_are_deterministic_across_loads() {
        let a = load(SAMPLE);
        let b = load(SAMPLE);
        let ids_a: Vec<_> = a.metadata_map.keys().collect();
        let ids_b: Vec<_> = b.metadata_map.keys().collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn method_kind_and_qualname() {
        let tree = load(SAMPLE);
        let f = tree
            .metadata_map
            .values()
            .find(|m| m.node_type == "FunctionDef")
            .unwrap();
        assert_eq!(f.kind, NodeKind::Method);
        assert_eq!(f.qualname.as_deref(), Some("A.f"));
        assert_eq!(f.name.as_deref(), Some("f"));
    }

    #[test]
    fn return_statement_is_a_smallstmt_inside_the_method_scope() {
        let tree = load(SAMPLE);
        let ret = tree
            .metadata_map
            .values()
            .find(|m| m.node_type == "Return")
            .unwrap();
        assert_eq!(ret.kind, NodeKind::SmallStmt);
        assert_eq!(ret.qualname.as_deref(), Some("A.f"));
        assert_eq!(ret.span.start_line, 3);
        assert_eq!(ret.span.end_line, 3);
    }

    #[test]
    fn nested_function_qualname_includes_outer_function() {
        let tree = load("def outer():\n    def inner():\n        pass\n");
        let inner = tree
            .metadata_map
            .values()
            .find(|m| m.name.as_deref() == Some("inner") && m.node_type == "FunctionDef")
            .unwrap();
        assert_eq!(inner.kind, NodeKind::Function);
        assert_eq!(inner.qualname.as_deref(), Some("outer.inner"));
    }

    #[test]
    fn parent_and_children_are_mutually_consistent() {
        let tree = load(SAMPLE);
        for (id, meta) in &tree.metadata_map {
            if let Some(parent_id) = &meta.parent_id {
                let parent = tree.metadata_map.get(parent_id).expect("parent indexed");
                assert!(
                    parent.children_ids.contains(id),
                    "{parent_id} does not list {id}"
                );
            }
        }
    }

    #[test]
    fn empty_source_yields_single_module_node() {
        let tree = load("");
        assert_eq!(tree.node_count(), 1);
        let module = tree.metadata_map.values().next().unwrap();
        assert_eq!(module.node_type, "Module");
        assert_eq!(module.children_count, 0);
    }

    #[test]
    fn type_filter_reparents_to_nearest_indexed_ancestor() {
        let tree = CstTree::from_source(
            "/tmp/s.py",
            SAMPLE.to_string(),
            IndexOptions {
                node_types: Some(vec!["Module".into(), "FunctionDef".into()]),
                max_depth: None,
                include_children: true,
            },
        )
        .unwrap();
        let f = tree
            .metadata_map
            .values()
            .find(|m| m.node_type == "FunctionDef")
            .expect("function indexed");
        let parent = f.parent_id.as_ref().expect("has parent");
        assert_eq!(tree.metadata_map[parent].node_type, "Module");
    }

    #[test]
    fn max_depth_prunes_subtrees() {
        let tree = CstTree::from_source(
            "/tmp/s.py",
            SAMPLE.to_string(),
            IndexOptions {
                node_types: None,
                max_depth: Some(1),
                include_children: true,
            },
        )
        .unwrap();
        assert!(tree
            .metadata_map
            .values()
            .all(|m| m.node_type == "Module" || m.node_type == "ClassDef"));
    }

    #[test]
    fn display_type_falls_back_to_camel_case() {
        assert_eq!(display_type("binary_operator"), "BinaryOperator");
        assert_eq!(display_type("call"), "Call");
    }
}
