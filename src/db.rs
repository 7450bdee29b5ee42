use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StorageError;
use crate::fields::StorageValue;

/// Primary key of a stored row
pub type RecordId = i64;

// ============================================================================
// RECORD CONTRACT
// ============================================================================

/// A flat row type: one struct field per column, decoded by column name
pub trait Record: Sized {
    /// Table name
    const TABLE: &'static str;

    /// Idempotent DDL (`CREATE TABLE IF NOT EXISTS ...`)
    const SCHEMA: &'static str;

    /// Named column values for INSERT (without `id`)
    fn columns(&self) -> Vec<(&'static str, StorageValue)>;

    /// Decode one row by column name
    fn from_row(row: &Row<'_>) -> Result<Self, StorageError>;
}

/// A record together with its primary key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<R> {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: R,
}

// ============================================================================
// RECORD STORE
// ============================================================================

/// One SQLite file; every operation opens, uses and releases its own connection
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for downloads (`clientes.db`, ...)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.db".to_string())
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path).map_err(|source| StorageError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Create the record's table if absent; safe on every start
    pub fn ensure_schema<R: Record>(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;

        // WAL for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(R::SCHEMA, [])?;

        tracing::debug!(table = R::TABLE, path = %self.path.display(), "schema ensured");
        Ok(())
    }

    /// Append one row in its own transaction
    pub fn insert<R: Record>(&self, record: &R) -> Result<RecordId, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let columns = record.columns();
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            names.join(", "),
            placeholders.join(", ")
        );

        tx.execute(&sql, params_from_iter(columns.iter().map(|(_, value)| value)))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(table = R::TABLE, id, "record inserted");
        Ok(id)
    }

    /// All rows, primary key ascending
    pub fn list<R: Record>(&self) -> Result<Vec<Stored<R>>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY id ASC", R::TABLE))?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: RecordId = row.get("id")?;
            records.push(Stored {
                id,
                record: R::from_row(row)?,
            });
        }

        Ok(records)
    }

    /// Remove one row; a missing id is not an error
    ///
    /// Returns whether a row was actually removed.
    pub fn delete_by_id<R: Record>(&self, id: RecordId) -> Result<bool, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let affected = tx.execute(&format!("DELETE FROM {} WHERE id = ?1", R::TABLE), params![id])?;
        tx.commit()?;

        if affected > 0 {
            tracing::info!(table = R::TABLE, id, "record deleted");
        } else {
            tracing::debug!(table = R::TABLE, id, "delete skipped, no such record");
        }
        Ok(affected > 0)
    }

    pub fn count<R: Record>(&self) -> Result<i64, StorageError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", R::TABLE), [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Full logical SQL dump (schema + data) of the whole store
    pub fn dump_all(&self) -> Result<Vec<u8>, StorageError> {
        let mut conn = self.connect()?;
        // Read transaction keeps the dump on one snapshot
        let tx = conn.transaction()?;

        let mut out = String::from("BEGIN TRANSACTION;\n");

        let tables: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT name, sql FROM sqlite_master
                 WHERE sql NOT NULL AND type = 'table'
                 ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        for (name, sql) in &tables {
            if name == "sqlite_sequence" {
                out.push_str("DELETE FROM \"sqlite_sequence\";\n");
            } else if name.starts_with("sqlite_") {
                continue;
            } else {
                out.push_str(&format!("{};\n", sql));
            }

            let mut stmt = tx.prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(name)))?;
            let width = stmt.column_count();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let values = (0..width)
                    .map(|i| row.get_ref(i).map(sql_literal))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push_str(&format!(
                    "INSERT INTO {} VALUES({});\n",
                    quote_ident(name),
                    values.join(",")
                ));
            }
        }

        {
            let mut stmt = tx.prepare(
                "SELECT sql FROM sqlite_master
                 WHERE sql NOT NULL AND type IN ('index', 'trigger', 'view')
                 ORDER BY name",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for sql in rows {
                out.push_str(&format!("{};\n", sql?));
            }
        }

        out.push_str("COMMIT;\n");
        tx.finish()?;

        tracing::info!(
            path = %self.path.display(),
            bytes = out.len(),
            sha256 = %sha256_hex(out.as_bytes()),
            "store exported"
        );
        Ok(out.into_bytes())
    }

    /// One table as CSV, header row first
    pub fn export_csv<R: Record>(&self) -> Result<Vec<u8>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY id ASC", R::TABLE))?;
        let header: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&header)
            .map_err(|e| StorageError::Export(e.to_string()))?;

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let cells = (0..header.len())
                .map(|i| row.get_ref(i).map(|v| csv_cell(StorageValue::from_value_ref(v))))
                .collect::<Result<Vec<_>, _>>()?;
            wtr.write_record(&cells)
                .map_err(|e| StorageError::Export(e.to_string()))?;
        }

        wtr.into_inner()
            .map_err(|e| StorageError::Export(e.to_string()))
    }
}

/// Hex SHA-256 of an export, reported alongside downloads
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(r) => format!("{:?}", r),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "''")),
        ValueRef::Blob(b) => format!("X'{}'", hex::encode_upper(b)),
    }
}

fn csv_cell(value: StorageValue) -> String {
    match value {
        StorageValue::Null => String::new(),
        StorageValue::Flag(b) => b.to_string(),
        StorageValue::Integer(n) => n.to_string(),
        StorageValue::Text(s) => s,
    }
}

// ============================================================================
// ROW DECODING HELPERS
// ============================================================================

pub(crate) fn get_text(row: &Row<'_>, column: &str) -> Result<String, StorageError> {
    Ok(row.get::<_, Option<String>>(column)?.unwrap_or_default())
}

pub(crate) fn get_opt_text(row: &Row<'_>, column: &str) -> Result<Option<String>, StorageError> {
    Ok(row.get(column)?)
}

pub(crate) fn get_flag(row: &Row<'_>, column: &str) -> Result<bool, StorageError> {
    Ok(row.get::<_, Option<bool>>(column)?.unwrap_or(false))
}

pub(crate) fn get_list(row: &Row<'_>, column: &str) -> Result<Vec<String>, StorageError> {
    match row.get::<_, Option<String>>(column)? {
        None => Ok(Vec::new()),
        Some(text) => crate::fields::deserialize_list(&text).map_err(|e| StorageError::Decode {
            column: column.to_string(),
            message: e.to_string(),
        }),
    }
}

pub(crate) fn decode_err(column: &str, message: impl ToString) -> StorageError {
    StorageError::Decode {
        column: column.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{normalize, FieldValue};

    /// Minimal record for exercising the store contract
    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        title: String,
        tags: Vec<String>,
        pinned: bool,
    }

    impl Record for Note {
        const TABLE: &'static str = "notes";
        const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            tags TEXT,
            pinned BOOLEAN
        )";

        fn columns(&self) -> Vec<(&'static str, StorageValue)> {
            vec![
                ("title", normalize(FieldValue::from(self.title.clone()))),
                ("tags", normalize(FieldValue::from(self.tags.clone()))),
                ("pinned", normalize(FieldValue::from(self.pinned))),
            ]
        }

        fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
            Ok(Note {
                title: get_text(row, "title")?,
                tags: get_list(row, "tags")?,
                pinned: get_flag(row, "pinned")?,
            })
        }
    }

    /// A record whose column list does not match its table
    struct Broken;

    impl Record for Broken {
        const TABLE: &'static str = "notes";
        const SCHEMA: &'static str = "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY)";

        fn columns(&self) -> Vec<(&'static str, StorageValue)> {
            vec![("no_such_column", StorageValue::Integer(1))]
        }

        fn from_row(_row: &Row<'_>) -> Result<Self, StorageError> {
            Ok(Broken)
        }
    }

    fn note(title: &str, tags: &[&str]) -> Note {
        Note {
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pinned: tags.is_empty(),
        }
    }

    fn temp_store() -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("notes.db"));
        store.ensure_schema::<Note>().unwrap();
        (dir, store)
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let (_dir, store) = temp_store();
        store.ensure_schema::<Note>().unwrap();
        store.ensure_schema::<Note>().unwrap();
        assert_eq!(store.count::<Note>().unwrap(), 0);
    }

    #[test]
    fn test_insert_then_list_round_trip() {
        let (_dir, store) = temp_store();

        let first = note("first", &["a", "b, c"]);
        let second = note("second", &[]);
        let id1 = store.insert(&first).unwrap();
        let id2 = store.insert(&second).unwrap();
        assert!(id2 > id1);

        let listed = store.list::<Note>().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], Stored { id: id1, record: first });
        assert_eq!(listed[1], Stored { id: id2, record: second });
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let (_dir, store) = temp_store();
        store.insert(&note("keep", &["x"])).unwrap();

        let removed = store.delete_by_id::<Note>(9_999).unwrap();
        assert!(!removed);
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let (_dir, store) = temp_store();
        let id1 = store.insert(&note("one", &[])).unwrap();
        let id2 = store.insert(&note("two", &[])).unwrap();

        assert!(store.delete_by_id::<Note>(id1).unwrap());

        let listed = store.list::<Note>().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id2);
    }

    #[test]
    fn test_schema_violation_is_storage_error() {
        let (_dir, store) = temp_store();

        let err = store.insert(&Broken).unwrap_err();
        assert!(matches!(err, StorageError::Query(_)));
        assert_eq!(store.count::<Note>().unwrap(), 0);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("missing").join("nested").join("x.db"));

        let err = store.ensure_schema::<Note>().unwrap_err();
        assert!(matches!(err, StorageError::Open { .. }));
    }

    #[test]
    fn test_dump_contains_schema_and_rows() {
        let (_dir, store) = temp_store();
        store.insert(&note("it's here", &["tag"])).unwrap();

        let dump = String::from_utf8(store.dump_all().unwrap()).unwrap();

        assert!(dump.starts_with("BEGIN TRANSACTION;\n"));
        assert!(dump.ends_with("COMMIT;\n"));
        assert!(dump.contains("CREATE TABLE notes"));
        assert!(dump.contains("INSERT INTO \"notes\" VALUES(1,'it''s here','[\"tag\"]',0);"));
        assert!(dump.contains("DELETE FROM \"sqlite_sequence\";"));
    }

    #[test]
    fn test_dump_restores_into_fresh_store() {
        let (_dir, store) = temp_store();
        store.insert(&note("alpha", &["x", "y"])).unwrap();
        store.insert(&note("beta", &[])).unwrap();

        let dump = String::from_utf8(store.dump_all().unwrap()).unwrap();

        let restored_dir = tempfile::tempdir().unwrap();
        let restored = RecordStore::new(restored_dir.path().join("restored.db"));
        let conn = Connection::open(restored.path()).unwrap();
        conn.execute_batch(&dump).unwrap();
        drop(conn);

        let original = store.list::<Note>().unwrap();
        assert_eq!(restored.list::<Note>().unwrap(), original);
    }

    #[test]
    fn test_export_csv() {
        let (_dir, store) = temp_store();
        store.insert(&note("row", &["a"])).unwrap();

        let csv_text = String::from_utf8(store.export_csv::<Note>().unwrap()).unwrap();
        let mut lines = csv_text.lines();

        assert_eq!(lines.next(), Some("id,title,tags,pinned"));
        assert_eq!(lines.next(), Some("1,row,\"[\"\"a\"\"]\",0"));
    }

    #[test]
    fn test_concurrent_inserts_keep_every_row_whole() {
        let (_dir, store) = temp_store();
        let threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|i| store.insert(&note(&format!("t{}-{}", t, i), &["x", "y"])))
                        .filter(|r| r.is_err())
                        .count()
                })
            })
            .collect();

        let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let listed = store.list::<Note>().unwrap();
        assert_eq!(listed.len(), threads * per_thread);
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
        for row in &listed {
            assert!(row.record.title.starts_with('t'));
            assert_eq!(row.record.tags, vec!["x", "y"]);
        }
    }

    #[test]
    fn test_sha256_hex() {
        let digest = sha256_hex(b"abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
