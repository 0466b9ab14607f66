//! The store actor: a pinned writer thread owning the sqlite connection,
//! serving typed CRUD, transactions, and the save pipeline's row updates
//! from a request queue.
//!
//! `StoreHandle` is the public face: cloneable, cheap, async. Every call is
//! shipped to the writer thread over an mpsc channel and answered on a
//! oneshot, which linearizes all reads and writes on one store.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map as JsonMap, Value};
use sylva_core::FileFacts;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::DbError;
use crate::schema;

/// The file row upserted on every save.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub project_id: String,
    pub dataset_id: Option<String>,
    pub path: String,
    pub content_hash: Option<String>,
    pub lines: i64,
    pub last_modified: f64,
    pub has_docstring: bool,
}

type Responder<T> = oneshot::Sender<Result<T, DbError>>;

enum StoreMessage {
    Create {
        entity: Entity,
        values: JsonMap<String, Value>,
        resp: Responder<Value>,
    },
    Get {
        entity: Entity,
        id: Value,
        resp: Responder<Option<Value>>,
    },
    Update {
        entity: Entity,
        id: Value,
        values: JsonMap<String, Value>,
        resp: Responder<()>,
    },
    Delete {
        entity: Entity,
        id: Value,
        hard: bool,
        resp: Responder<()>,
    },
    List {
        entity: Entity,
        filters: JsonMap<String, Value>,
        limit: Option<i64>,
        offset: Option<i64>,
        resp: Responder<Vec<Value>>,
    },
    Search {
        entity: Entity,
        filters: JsonMap<String, Value>,
        resp: Responder<Vec<Value>>,
    },
    Begin {
        resp: Responder<Uuid>,
    },
    Commit {
        txn_id: Uuid,
        resp: Responder<()>,
    },
    Rollback {
        txn_id: Uuid,
        resp: Responder<()>,
    },
    EnsureProject {
        project_id: String,
        root_path: String,
        name: Option<String>,
        dataset: Option<(String, String)>,
        resp: Responder<()>,
    },
    UpsertFile {
        row: FileRow,
        resp: Responder<i64>,
    },
    ReplayFacts {
        file_id: i64,
        project_id: String,
        facts: Box<FileFacts>,
        resp: Responder<Value>,
    },
    QuickCheck {
        resp: Responder<()>,
    },
    Status {
        resp: Responder<Value>,
    },
    Shutdown,
}

/// Handle to the store actor. Cloneable and cheap to pass around.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreMessage>,
    db_path: PathBuf,
}

impl StoreHandle {
    /// Open (or create) a store file, sync the schema, and spawn the writer
    /// thread.
    pub fn open(db_path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(schema::PRAGMAS)?;
        schema::sync_schema(&conn, db_path)?;

        let (tx, rx) = mpsc::channel(128);
        let store = Store {
            conn,
            active_txn: None,
            db_path: db_path.to_path_buf(),
        };
        std::thread::Builder::new()
            .name("sylva-store".into())
            .spawn(move || store.run(rx))
            .map_err(|e| DbError::Channel(format!("failed to spawn store thread: {e}")))?;

        Ok(Self {
            tx,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> StoreMessage,
    ) -> Result<T, DbError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| DbError::Channel("store actor is gone".into()))?;
        rx.await
            .map_err(|_| DbError::Channel("store actor dropped the request".into()))?
    }

    pub async fn create(
        &self,
        entity: Entity,
        values: JsonMap<String, Value>,
    ) -> Result<Value, DbError> {
        self.request(|resp| StoreMessage::Create {
            entity,
            values,
            resp,
        })
        .await
    }

    pub async fn get(&self, entity: Entity, id: Value) -> Result<Option<Value>, DbError> {
        self.request(|resp| StoreMessage::Get { entity, id, resp }).await
    }

    pub async fn update(
        &self,
        entity: Entity,
        id: Value,
        values: JsonMap<String, Value>,
    ) -> Result<(), DbError> {
        self.request(|resp| StoreMessage::Update {
            entity,
            id,
            values,
            resp,
        })
        .await
    }

    pub async fn delete(&self, entity: Entity, id: Value, hard: bool) -> Result<(), DbError> {
        self.request(|resp| StoreMessage::Delete {
            entity,
            id,
            hard,
            resp,
        })
        .await
    }

    pub async fn list(
        &self,
        entity: Entity,
        filters: JsonMap<String, Value>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Value>, DbError> {
        self.request(|resp| StoreMessage::List {
            entity,
            filters,
            limit,
            offset,
            resp,
        })
        .await
    }

    pub async fn search(
        &self,
        entity: Entity,
        filters: JsonMap<String, Value>,
    ) -> Result<Vec<Value>, DbError> {
        self.request(|resp| StoreMessage::Search {
            entity,
            filters,
            resp,
        })
        .await
    }

    pub async fn begin_transaction(&self) -> Result<Uuid, DbError> {
        self.request(|resp| StoreMessage::Begin { resp }).await
    }

    pub async fn commit_transaction(&self, txn_id: Uuid) -> Result<(), DbError> {
        self.request(|resp| StoreMessage::Commit { txn_id, resp }).await
    }

    pub async fn rollback_transaction(&self, txn_id: Uuid) -> Result<(), DbError> {
        self.request(|resp| StoreMessage::Rollback { txn_id, resp }).await
    }

    /// Projects and datasets are created implicitly when first referenced.
    pub async fn ensure_project(
        &self,
        project_id: &str,
        root_path: &str,
        name: Option<&str>,
        dataset: Option<(&str, &str)>,
    ) -> Result<(), DbError> {
        let project_id = project_id.to_string();
        let root_path = root_path.to_string();
        let name = name.map(|s| s.to_string());
        let dataset = dataset.map(|(id, name)| (id.to_string(), name.to_string()));
        self.request(|resp| StoreMessage::EnsureProject {
            project_id,
            root_path,
            name,
            dataset,
            resp,
        })
        .await
    }

    pub async fn upsert_file(&self, row: FileRow) -> Result<i64, DbError> {
        self.request(|resp| StoreMessage::UpsertFile { row, resp }).await
    }

    pub async fn replay_file_facts(
        &self,
        file_id: i64,
        project_id: &str,
        facts: FileFacts,
    ) -> Result<Value, DbError> {
        let project_id = project_id.to_string();
        self.request(|resp| StoreMessage::ReplayFacts {
            file_id,
            project_id,
            facts: Box::new(facts),
            resp,
        })
        .await
    }

    pub async fn quick_check(&self) -> Result<(), DbError> {
        self.request(|resp| StoreMessage::QuickCheck { resp }).await
    }

    pub async fn status(&self) -> Result<Value, DbError> {
        self.request(|resp| StoreMessage::Status { resp }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(StoreMessage::Shutdown).await;
    }
}

struct Store {
    conn: Connection,
    active_txn: Option<Uuid>,
    db_path: PathBuf,
}

impl Store {
    fn run(mut self, mut rx: mpsc::Receiver<StoreMessage>) {
        while let Some(message) = rx.blocking_recv() {
            match message {
                StoreMessage::Create {
                    entity,
                    values,
                    resp,
                } => {
                    let _ = resp.send(self.create(entity, &values));
                }
                StoreMessage::Get { entity, id, resp } => {
                    let _ = resp.send(self.get(entity, &id));
                }
                StoreMessage::Update {
                    entity,
                    id,
                    values,
                    resp,
                } => {
                    let _ = resp.send(self.update(entity, &id, &values));
                }
                StoreMessage::Delete {
                    entity,
                    id,
                    hard,
                    resp,
                } => {
                    let _ = resp.send(self.delete(entity, &id, hard));
                }
                StoreMessage::List {
                    entity,
                    filters,
                    limit,
                    offset,
                    resp,
                } => {
                    let _ = resp.send(self.select(entity, &filters, limit, offset, false));
                }
                StoreMessage::Search {
                    entity,
                    filters,
                    resp,
                } => {
                    let _ = resp.send(self.select(entity, &filters, None, None, true));
                }
                StoreMessage::Begin { resp } => {
                    let _ = resp.send(self.begin());
                }
                StoreMessage::Commit { txn_id, resp } => {
                    let _ = resp.send(self.finish_txn(txn_id, true));
                }
                StoreMessage::Rollback { txn_id, resp } => {
                    let _ = resp.send(self.finish_txn(txn_id, false));
                }
                StoreMessage::EnsureProject {
                    project_id,
                    root_path,
                    name,
                    dataset,
                    resp,
                } => {
                    let _ = resp.send(self.ensure_project(&project_id, &root_path, name, dataset));
                }
                StoreMessage::UpsertFile { row, resp } => {
                    let _ = resp.send(self.upsert_file(&row));
                }
                StoreMessage::ReplayFacts {
                    file_id,
                    project_id,
                    facts,
                    resp,
                } => {
                    let _ = resp.send(self.replay_facts(file_id, &project_id, &facts));
                }
                StoreMessage::QuickCheck { resp } => {
                    let _ = resp.send(self.quick_check());
                }
                StoreMessage::Status { resp } => {
                    let _ = resp.send(self.status());
                }
                StoreMessage::Shutdown => break,
            }
        }
        // An open transaction at shutdown is abandoned deliberately: sqlite
        // rolls it back when the connection closes.
        tracing::debug!("store actor loop ended");
    }

    fn create(&mut self, entity: Entity, values: &JsonMap<String, Value>) -> Result<Value, DbError> {
        entity.check_columns(values.keys().map(String::as_str).filter(|k| *k != "id"))?;

        let mut columns: Vec<String> = Vec::new();
        let mut params: Vec<rusqlite::types::Value> = Vec::new();

        let id_value = if entity.text_primary_key() {
            let id = values
                .get("id")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            columns.push("id".into());
            params.push(rusqlite::types::Value::Text(id.clone()));
            Some(id)
        } else {
            None
        };

        for (key, value) in values {
            if key == "id" {
                continue;
            }
            columns.push(key.clone());
            params.push(to_sql(value));
        }
        if columns.is_empty() {
            return Err(DbError::Sqlite("no columns to insert".into()));
        }

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity.table(),
            columns.join(", "),
            placeholders
        );
        self.conn
            .execute(&sql, rusqlite::params_from_iter(params))?;

        Ok(match id_value {
            Some(id) => Value::String(id),
            None => Value::from(self.conn.last_insert_rowid()),
        })
    }

    fn get(&self, entity: Entity, id: &Value) -> Result<Option<Value>, DbError> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", entity.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([to_sql(id)])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_json(row)?)),
            None => Ok(None),
        }
    }

    fn update(
        &mut self,
        entity: Entity,
        id: &Value,
        values: &JsonMap<String, Value>,
    ) -> Result<(), DbError> {
        entity.check_columns(values.keys().map(String::as_str))?;
        if values.is_empty() {
            return Ok(());
        }
        let mut sets = Vec::new();
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        for (i, (key, value)) in values.iter().enumerate() {
            sets.push(format!("{key} = ?{}", i + 1));
            params.push(to_sql(value));
        }
        params.push(to_sql(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            entity.table(),
            sets.join(", "),
            params.len()
        );
        let changed = self.conn.execute(&sql, rusqlite::params_from_iter(params))?;
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: entity.table(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&mut self, entity: Entity, id: &Value, hard: bool) -> Result<(), DbError> {
        // Files are soft-deleted by default; the pre-deletion location is
        // kept in original_path for recovery.
        let changed = if entity == Entity::Files && !hard {
            self.conn.execute(
                "UPDATE files SET deleted = 1, original_path = COALESCE(original_path, path) \
                 WHERE id = ?1 AND deleted = 0",
                [to_sql(id)],
            )?
        } else {
            self.conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", entity.table()),
                [to_sql(id)],
            )?
        };
        if changed == 0 {
            return Err(DbError::NotFound {
                entity: entity.table(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn select(
        &self,
        entity: Entity,
        filters: &JsonMap<String, Value>,
        limit: Option<i64>,
        offset: Option<i64>,
        fuzzy: bool,
    ) -> Result<Vec<Value>, DbError> {
        entity.check_columns(filters.keys().map(String::as_str).filter(|k| *k != "id"))?;

        let mut clauses = Vec::new();
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        for (key, value) in filters {
            let idx = params.len() + 1;
            if fuzzy && value.is_string() {
                clauses.push(format!("{key} LIKE ?{idx}"));
                params.push(rusqlite::types::Value::Text(format!(
                    "%{}%",
                    value.as_str().unwrap_or_default()
                )));
            } else {
                clauses.push(format!("{key} = ?{idx}"));
                params.push(to_sql(value));
            }
        }

        let mut sql = format!("SELECT * FROM {}", entity.table());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_json(row)?);
        }
        Ok(out)
    }

    fn begin(&mut self) -> Result<Uuid, DbError> {
        if self.active_txn.is_some() {
            return Err(DbError::Transaction(
                "a transaction is already active on this store".into(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let txn_id = Uuid::new_v4();
        self.active_txn = Some(txn_id);
        tracing::debug!(%txn_id, "transaction started");
        Ok(txn_id)
    }

    fn finish_txn(&mut self, txn_id: Uuid, commit: bool) -> Result<(), DbError> {
        match self.active_txn {
            Some(active) if active == txn_id => {
                self.conn
                    .execute_batch(if commit { "COMMIT" } else { "ROLLBACK" })?;
                self.active_txn = None;
                tracing::debug!(%txn_id, commit, "transaction finished");
                Ok(())
            }
            Some(_) => Err(DbError::Transaction(format!(
                "transaction id {txn_id} does not match the active transaction"
            ))),
            None => Err(DbError::Transaction("no active transaction".into())),
        }
    }

    fn ensure_project(
        &mut self,
        project_id: &str,
        root_path: &str,
        name: Option<String>,
        dataset: Option<(String, String)>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO projects (id, root_path, name) VALUES (?1, ?2, ?3)",
            rusqlite::params![project_id, root_path, name],
        )?;
        if let Some((dataset_id, dataset_name)) = dataset {
            self.conn.execute(
                "INSERT OR IGNORE INTO datasets (id, project_id, name) VALUES (?1, ?2, ?3)",
                rusqlite::params![dataset_id, project_id, dataset_name],
            )?;
        }
        Ok(())
    }

    fn upsert_file(&mut self, row: &FileRow) -> Result<i64, DbError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM files WHERE project_id = ?1 AND path = ?2 AND deleted = 0",
                rusqlite::params![row.project_id, row.path],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE files SET dataset_id = ?1, content_hash = ?2, lines = ?3, \
                     last_modified = ?4, has_docstring = ?5 WHERE id = ?6",
                    rusqlite::params![
                        row.dataset_id,
                        row.content_hash,
                        row.lines,
                        row.last_modified,
                        row.has_docstring as i64,
                        id
                    ],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO files \
                     (project_id, dataset_id, path, content_hash, lines, last_modified, \
                      has_docstring, deleted) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                    rusqlite::params![
                        row.project_id,
                        row.dataset_id,
                        row.path,
                        row.content_hash,
                        row.lines,
                        row.last_modified,
                        row.has_docstring as i64
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    /// Replace every per-file entity row with the freshly collected set.
    fn replay_facts(
        &mut self,
        file_id: i64,
        project_id: &str,
        facts: &FileFacts,
    ) -> Result<Value, DbError> {
        for table in [
            "classes",
            "functions",
            "methods",
            "imports",
            "usages",
            "ast_trees",
            "cst_trees",
        ] {
            self.conn.execute(
                &format!("DELETE FROM {table} WHERE file_id = ?1"),
                [file_id],
            )?;
        }

        for class in &facts.classes {
            self.conn.execute(
                "INSERT INTO classes (file_id, project_id, name, qualname, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    file_id,
                    project_id,
                    class.name,
                    class.qualname,
                    class.start_line,
                    class.end_line
                ],
            )?;
        }
        for function in &facts.functions {
            self.conn.execute(
                "INSERT INTO functions (file_id, project_id, name, qualname, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    file_id,
                    project_id,
                    function.name,
                    function.qualname,
                    function.start_line,
                    function.end_line
                ],
            )?;
        }
        for method in &facts.methods {
            self.conn.execute(
                "INSERT INTO methods \
                 (file_id, project_id, class_name, name, qualname, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    file_id,
                    project_id,
                    method.class_name,
                    method.name,
                    method.qualname,
                    method.start_line,
                    method.end_line
                ],
            )?;
        }
        for import in &facts.imports {
            self.conn.execute(
                "INSERT INTO imports (file_id, project_id, module, name, line) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![file_id, project_id, import.module, import.name, import.line],
            )?;
        }
        for usage in &facts.usages {
            self.conn.execute(
                "INSERT INTO usages (file_id, project_id, name, line, col) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![file_id, project_id, usage.name, usage.line, usage.col],
            )?;
        }
        if let Some(ast_json) = &facts.ast_json {
            self.conn.execute(
                "INSERT INTO ast_trees (file_id, project_id, ast_json) VALUES (?1, ?2, ?3)",
                rusqlite::params![file_id, project_id, ast_json.to_string()],
            )?;
        }
        if let Some(source) = &facts.cst_source {
            self.conn.execute(
                "INSERT INTO cst_trees (file_id, project_id, source) VALUES (?1, ?2, ?3)",
                rusqlite::params![file_id, project_id, source],
            )?;
        }

        Ok(json!({
            "classes": facts.classes.len(),
            "functions": facts.functions.len(),
            "methods": facts.methods.len(),
            "imports": facts.imports.len(),
            "usages": facts.usages.len(),
        }))
    }

    fn quick_check(&self) -> Result<(), DbError> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(DbError::Corrupt(verdict))
        }
    }

    fn status(&self) -> Result<Value, DbError> {
        let mut counts = JsonMap::new();
        for entity in Entity::ALL {
            let count: i64 = self.conn.query_row(
                &format!("SELECT count(*) FROM {}", entity.table()),
                [],
                |row| row.get(0),
            )?;
            counts.insert(entity.table().to_string(), Value::from(count));
        }
        Ok(json!({
            "db_path": self.db_path.display().to_string(),
            "tables": Value::Object(counts),
            "transaction_active": self.active_txn.is_some(),
        }))
    }
}

fn to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn row_to_json(row: &rusqlite::Row<'_>) -> Result<Value, DbError> {
    let stmt = row.as_ref();
    let mut object = JsonMap::new();
    for (i, name) in stmt.column_names().iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::from(v),
            ValueRef::Real(v) => Value::from(v),
            ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Array(v.iter().map(|b| Value::from(*b)).collect()),
        };
        object.insert((*name).to_string(), value);
    }
    Ok(Value::Object(object))
}
