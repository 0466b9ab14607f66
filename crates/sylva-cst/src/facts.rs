//! Extraction of per-file entity rows from a tree, for replay into the row
//! store after a save.

use itertools::Itertools;
use serde_json::json;
use sylva_core::{
    ClassFact, FileFacts, FunctionFact, ImportFact, MethodFact, NodeKind, UsageFact,
};

use crate::tree::CstTree;

/// Collect the entities a saved file contributes to the row store.
pub fn collect_file_facts(tree: &CstTree) -> FileFacts {
    let mut facts = FileFacts {
        cst_source: Some(tree.source().to_string()),
        ..FileFacts::default()
    };

    for meta in tree.metadata_map.values() {
        match meta.kind {
            NodeKind::Class => {
                if let (Some(name), Some(qualname)) = (&meta.name, &meta.qualname) {
                    facts.classes.push(ClassFact {
                        name: name.clone(),
                        qualname: qualname.clone(),
                        start_line: meta.span.start_line,
                        end_line: meta.span.end_line,
                    });
                }
            }
            NodeKind::Function => {
                if let (Some(name), Some(qualname)) = (&meta.name, &meta.qualname) {
                    facts.functions.push(FunctionFact {
                        name: name.clone(),
                        qualname: qualname.clone(),
                        start_line: meta.span.start_line,
                        end_line: meta.span.end_line,
                    });
                }
            }
            NodeKind::Method => {
                if let (Some(name), Some(qualname)) = (&meta.name, &meta.qualname) {
                    let class_name = qualname
                        .rsplit_once('.')
                        .map(|(head, _)| head.to_string())
                        .unwrap_or_default();
                    facts.methods.push(MethodFact {
                        class_name,
                        name: name.clone(),
                        qualname: qualname.clone(),
                        start_line: meta.span.start_line,
                        end_line: meta.span.end_line,
                    });
                }
            }
            NodeKind::Import => {
                if let Some(code) = tree.node_code(&meta.node_id) {
                    facts
                        .imports
                        .extend(parse_import(code, meta.span.start_line));
                }
            }
            NodeKind::Node if meta.node_type == "Name" => {
                if let Some(name) = &meta.name {
                    facts.usages.push(UsageFact {
                        name: name.clone(),
                        line: meta.span.start_line,
                        col: meta.span.start_col,
                    });
                }
            }
            _ => {}
        }
    }

    facts.ast_json = Some(structural_json(tree));
    facts
}

/// Split one import statement into (module, name) rows.
///
/// `import a.b, c` yields two rows with an empty module; `from x import
/// y, z` yields rows with module `x`.
fn parse_import(code: &str, line: u32) -> Vec<ImportFact> {
    let code = code.trim();
    if let Some(rest) = code.strip_prefix("from ") {
        let Some((module, names)) = rest.split_once(" import ") else {
            return Vec::new();
        };
        names
            .split(',')
            .map(|name| name.trim().split_whitespace().next().unwrap_or("").to_string())
            .filter(|name| !name.is_empty())
            .map(|name| ImportFact {
                module: module.trim().to_string(),
                name,
                line,
            })
            .collect()
    } else if let Some(names) = code.strip_prefix("import ") {
        names
            .split(',')
            .map(|name| name.trim().split_whitespace().next().unwrap_or("").to_string())
            .filter(|name| !name.is_empty())
            .map(|name| ImportFact {
                module: String::new(),
                name,
                line,
            })
            .collect()
    } else {
        Vec::new()
    }
}

/// Nested structural view of the module, stored as the file's AST row.
fn structural_json(tree: &CstTree) -> serde_json::Value {
    fn node_json(tree: &CstTree, node_id: &str) -> serde_json::Value {
        let meta = &tree.metadata_map[node_id];
        let children = tree
            .children_of(node_id)
            .into_iter()
            .map(|child| node_json(tree, child))
            .collect_vec();
        json!({
            "type": meta.node_type,
            "kind": meta.kind,
            "name": meta.name,
            "start_line": meta.span.start_line,
            "end_line": meta.span.end_line,
            "children": children,
        })
    }

    match tree.metadata_map.keys().next() {
        Some(root) => node_json(tree, root),
        None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CstTree, IndexOptions};

    #[test]
    fn collects_classes_methods_functions_and_imports() {
        let source = "import os\nfrom sys import argv, path\n\nclass A:\n    def f(self):\n        return 1\n\ndef g():\n    pass\n";
        let tree =
            CstTree::from_source("/tmp/f.py", source.to_string(), IndexOptions::all()).unwrap();
        let facts = collect_file_facts(&tree);

        assert_eq!(facts.classes.len(), 1);
        assert_eq!(facts.classes[0].qualname, "A");
        assert_eq!(facts.methods.len(), 1);
        assert_eq!(facts.methods[0].class_name, "A");
        assert_eq!(facts.methods[0].name, "f");
        assert_eq!(facts.functions.len(), 1);
        assert_eq!(facts.functions[0].name, "g");

        let import_names: Vec<&str> = facts.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(import_names, vec!["os", "argv", "path"]);
        assert_eq!(facts.imports[1].module, "sys");

        assert_eq!(facts.cst_source.as_deref(), Some(source));
        let ast = facts.ast_json.unwrap();
        assert_eq!(ast["type"], "Module");
    }

    #[test]
    fn import_with_alias_keeps_the_imported_name() {
        let rows = parse_import("import numpy as np", 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "numpy");
    }
}
