//! The entity types the core writes, and their column sets.
//!
//! The store does not own the analytical semantics of these tables; it only
//! persists rows for them. Column lists are the authority for what generic
//! CRUD accepts.

use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Projects,
    Datasets,
    Files,
    AstTrees,
    CstTrees,
    Classes,
    Functions,
    Methods,
    Imports,
    Usages,
    Issues,
    CodeDuplicates,
    VectorIndex,
}

impl Entity {
    pub const ALL: &'static [Entity] = &[
        Entity::Projects,
        Entity::Datasets,
        Entity::Files,
        Entity::AstTrees,
        Entity::CstTrees,
        Entity::Classes,
        Entity::Functions,
        Entity::Methods,
        Entity::Imports,
        Entity::Usages,
        Entity::Issues,
        Entity::CodeDuplicates,
        Entity::VectorIndex,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Entity::Projects => "projects",
            Entity::Datasets => "datasets",
            Entity::Files => "files",
            Entity::AstTrees => "ast_trees",
            Entity::CstTrees => "cst_trees",
            Entity::Classes => "classes",
            Entity::Functions => "functions",
            Entity::Methods => "methods",
            Entity::Imports => "imports",
            Entity::Usages => "usages",
            Entity::Issues => "issues",
            Entity::CodeDuplicates => "code_duplicates",
            Entity::VectorIndex => "vector_index",
        }
    }

    pub fn parse(name: &str) -> Result<Self, DbError> {
        Entity::ALL
            .iter()
            .copied()
            .find(|e| e.table() == name)
            .ok_or_else(|| DbError::UnknownEntity(name.to_string()))
    }

    /// True when the primary key is a caller-visible text id (UUID) rather
    /// than an autoincrement integer.
    pub fn text_primary_key(&self) -> bool {
        matches!(self, Entity::Projects | Entity::Datasets)
    }

    /// Mutable columns, excluding the primary key.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Entity::Projects => &["root_path", "name"],
            Entity::Datasets => &["project_id", "name"],
            Entity::Files => &[
                "project_id",
                "dataset_id",
                "path",
                "content_hash",
                "lines",
                "last_modified",
                "has_docstring",
                "deleted",
                "original_path",
            ],
            Entity::AstTrees => &["file_id", "project_id", "ast_json"],
            Entity::CstTrees => &["file_id", "project_id", "source"],
            Entity::Classes => &[
                "file_id",
                "project_id",
                "name",
                "qualname",
                "start_line",
                "end_line",
            ],
            Entity::Functions => &[
                "file_id",
                "project_id",
                "name",
                "qualname",
                "start_line",
                "end_line",
            ],
            Entity::Methods => &[
                "file_id",
                "project_id",
                "class_name",
                "name",
                "qualname",
                "start_line",
                "end_line",
            ],
            Entity::Imports => &["file_id", "project_id", "module", "name", "line"],
            Entity::Usages => &["file_id", "project_id", "name", "line", "col"],
            Entity::Issues => &["file_id", "project_id", "severity", "message", "line"],
            Entity::CodeDuplicates => &[
                "project_id",
                "file_a",
                "file_b",
                "span_a",
                "span_b",
                "similarity",
            ],
            Entity::VectorIndex => &[
                "file_id",
                "project_id",
                "chunk_start",
                "chunk_end",
                "embedding",
            ],
        }
    }

    pub fn check_columns<'a>(
        &self,
        names: impl Iterator<Item = &'a str>,
    ) -> Result<(), DbError> {
        let allowed = self.columns();
        for name in names {
            if !allowed.contains(&name) {
                return Err(DbError::UnknownColumn {
                    entity: self.table(),
                    column: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_parses_by_table_name() {
        for entity in Entity::ALL {
            assert_eq!(Entity::parse(entity.table()).unwrap(), *entity);
        }
        assert!(Entity::parse("widgets").is_err());
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = Entity::Files
            .check_columns(["path", "sparkle"].into_iter())
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn { .. }));
    }
}
