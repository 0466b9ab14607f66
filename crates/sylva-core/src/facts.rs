use serde::{Deserialize, Serialize};

/// Per-file entity rows replayed into the row store after a save.
///
/// The store does not interpret these beyond persisting them; the save
/// pipeline tells it "this file now has these entities" and the previous
/// rows for the file are replaced wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFacts {
    pub classes: Vec<ClassFact>,
    pub functions: Vec<FunctionFact>,
    pub methods: Vec<MethodFact>,
    pub imports: Vec<ImportFact>,
    pub usages: Vec<UsageFact>,
    /// Serialized structural tree of the module, stored in `ast_trees`.
    pub ast_json: Option<serde_json::Value>,
    /// Full source text, stored in `cst_trees`.
    pub cst_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassFact {
    pub name: String,
    pub qualname: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    pub qualname: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodFact {
    pub class_name: String,
    pub name: String,
    pub qualname: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFact {
    /// Module path for `from X import …`, empty for bare `import X`.
    pub module: String,
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageFact {
    pub name: String,
    pub line: u32,
    pub col: u32,
}

impl FileFacts {
    pub fn entity_count(&self) -> usize {
        self.classes.len()
            + self.functions.len()
            + self.methods.len()
            + self.imports.len()
            + self.usages.len()
    }
}
