//! Declared schema and sync-on-attach.
//!
//! On open, missing tables are created. When a declared column is missing
//! from a live table the store file is backed up first and the column is
//! added; destructive reshapes stay outside this core.

use std::path::Path;

use rusqlite::Connection;

use crate::error::DbError;

pub const PRAGMAS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;
    PRAGMA synchronous = NORMAL;
"#;

pub struct TableSpec {
    pub name: &'static str,
    pub create_sql: &'static str,
    /// Column name/type pairs used for additive migration.
    pub columns: &'static [(&'static str, &'static str)],
}

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "projects",
        create_sql: "CREATE TABLE projects (
            id TEXT PRIMARY KEY,
            root_path TEXT NOT NULL,
            name TEXT
        )",
        columns: &[("id", "TEXT"), ("root_path", "TEXT"), ("name", "TEXT")],
    },
    TableSpec {
        name: "datasets",
        create_sql: "CREATE TABLE datasets (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        columns: &[("id", "TEXT"), ("project_id", "TEXT"), ("name", "TEXT")],
    },
    TableSpec {
        name: "files",
        create_sql: "CREATE TABLE files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            dataset_id TEXT,
            path TEXT NOT NULL,
            content_hash TEXT,
            lines INTEGER,
            last_modified REAL,
            has_docstring INTEGER DEFAULT 0,
            deleted INTEGER DEFAULT 0,
            original_path TEXT
        )",
        columns: &[
            ("id", "INTEGER"),
            ("project_id", "TEXT"),
            ("dataset_id", "TEXT"),
            ("path", "TEXT"),
            ("content_hash", "TEXT"),
            ("lines", "INTEGER"),
            ("last_modified", "REAL"),
            ("has_docstring", "INTEGER"),
            ("deleted", "INTEGER"),
            ("original_path", "TEXT"),
        ],
    },
    TableSpec {
        name: "ast_trees",
        create_sql: "CREATE TABLE ast_trees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            ast_json TEXT
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("ast_json", "TEXT"),
        ],
    },
    TableSpec {
        name: "cst_trees",
        create_sql: "CREATE TABLE cst_trees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            source TEXT
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("source", "TEXT"),
        ],
    },
    TableSpec {
        name: "classes",
        create_sql: "CREATE TABLE classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            name TEXT NOT NULL,
            qualname TEXT,
            start_line INTEGER,
            end_line INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("name", "TEXT"),
            ("qualname", "TEXT"),
            ("start_line", "INTEGER"),
            ("end_line", "INTEGER"),
        ],
    },
    TableSpec {
        name: "functions",
        create_sql: "CREATE TABLE functions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            name TEXT NOT NULL,
            qualname TEXT,
            start_line INTEGER,
            end_line INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("name", "TEXT"),
            ("qualname", "TEXT"),
            ("start_line", "INTEGER"),
            ("end_line", "INTEGER"),
        ],
    },
    TableSpec {
        name: "methods",
        create_sql: "CREATE TABLE methods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            class_name TEXT,
            name TEXT NOT NULL,
            qualname TEXT,
            start_line INTEGER,
            end_line INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("class_name", "TEXT"),
            ("name", "TEXT"),
            ("qualname", "TEXT"),
            ("start_line", "INTEGER"),
            ("end_line", "INTEGER"),
        ],
    },
    TableSpec {
        name: "imports",
        create_sql: "CREATE TABLE imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            module TEXT,
            name TEXT,
            line INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("module", "TEXT"),
            ("name", "TEXT"),
            ("line", "INTEGER"),
        ],
    },
    TableSpec {
        name: "usages",
        create_sql: "CREATE TABLE usages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            project_id TEXT,
            name TEXT,
            line INTEGER,
            col INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("name", "TEXT"),
            ("line", "INTEGER"),
            ("col", "INTEGER"),
        ],
    },
    TableSpec {
        name: "issues",
        create_sql: "CREATE TABLE issues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER,
            project_id TEXT,
            severity TEXT,
            message TEXT,
            line INTEGER
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("severity", "TEXT"),
            ("message", "TEXT"),
            ("line", "INTEGER"),
        ],
    },
    TableSpec {
        name: "code_duplicates",
        create_sql: "CREATE TABLE code_duplicates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT,
            file_a INTEGER,
            file_b INTEGER,
            span_a TEXT,
            span_b TEXT,
            similarity REAL
        )",
        columns: &[
            ("id", "INTEGER"),
            ("project_id", "TEXT"),
            ("file_a", "INTEGER"),
            ("file_b", "INTEGER"),
            ("span_a", "TEXT"),
            ("span_b", "TEXT"),
            ("similarity", "REAL"),
        ],
    },
    TableSpec {
        name: "vector_index",
        create_sql: "CREATE TABLE vector_index (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER,
            project_id TEXT,
            chunk_start INTEGER,
            chunk_end INTEGER,
            embedding BLOB
        )",
        columns: &[
            ("id", "INTEGER"),
            ("file_id", "INTEGER"),
            ("project_id", "TEXT"),
            ("chunk_start", "INTEGER"),
            ("chunk_end", "INTEGER"),
            ("embedding", "BLOB"),
        ],
    },
];

/// Bring the live schema up to the declared one.
pub fn sync_schema(conn: &Connection, db_path: &Path) -> Result<(), DbError> {
    for spec in TABLES {
        if !table_exists(conn, spec.name)? {
            conn.execute(spec.create_sql, [])?;
            tracing::debug!(table = spec.name, "created table");
            continue;
        }
        let live = live_columns(conn, spec.name)?;
        let missing: Vec<&(&str, &str)> = spec
            .columns
            .iter()
            .filter(|(name, _)| !live.iter().any(|l| l == name))
            .collect();
        if missing.is_empty() {
            continue;
        }
        backup_before_migrate(db_path)?;
        for (name, ty) in missing {
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {name} {ty}", spec.name),
                [],
            )?;
            tracing::warn!(table = spec.name, column = name, "added missing column");
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, DbError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn live_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn backup_before_migrate(db_path: &Path) -> Result<(), DbError> {
    if !db_path.exists() {
        return Ok(());
    }
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let backup = db_path.with_extension(format!("premigrate.{stamp}.bak"));
    std::fs::copy(db_path, &backup)
        .map_err(|e| DbError::Schema(format!("schema backup failed: {e}")))?;
    tracing::warn!(backup = %backup.display(), "backed up store before schema migration");
    Ok(())
}
