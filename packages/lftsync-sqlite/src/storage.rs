use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use tracing::debug;

use lftsync_core::{
    error::Error, ChildQuery, ChildRow, Lft, NodeId, OrderedChildReader, RepairSource,
};

/// Relational store kept in a SQLite `information_object` table.
pub struct SqliteRelationalStore {
    conn: Connection,
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

impl SqliteRelationalStore {
    pub fn new_in_memory() -> lftsync_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::from_connection(conn)
    }

    pub fn new(path: &str) -> lftsync_core::Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> lftsync_core::Result<Self> {
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&mut self) -> lftsync_core::Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS information_object (
                    id INTEGER PRIMARY KEY,
                    parent_id INTEGER,
                    lft INTEGER NOT NULL,
                    rgt INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_information_object_parent_lft
                    ON information_object(parent_id, lft);",
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Insert or replace one child row.
    pub fn insert_child(&self, parent: NodeId, row: ChildRow) -> lftsync_core::Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO information_object (id, parent_id, lft) VALUES (?1, ?2, ?3)",
                params![row.id.0, parent.0, row.lft.0],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn set_lft(&self, id: NodeId, lft: Lft) -> lftsync_core::Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE information_object SET lft = ?2 WHERE id = ?1",
                params![id.0, lft.0],
            )
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(Error::Storage(format!("no information_object row with id {id}")));
        }
        Ok(())
    }
}

/// Column values come back as whatever SQLite stored; fold them into `i64`.
fn value_to_i64(value: ValueRef<'_>, column: &str) -> lftsync_core::Result<i64> {
    match value {
        ValueRef::Integer(v) => Ok(v),
        ValueRef::Real(f) if f.fract() == 0.0 => Ok(f as i64),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::InvalidValue(format!("{column}: {e}")))?;
            Lft::parse(text).map(|l| l.0)
        }
        other => Err(Error::InvalidValue(format!(
            "{column} has unsupported type {:?}",
            other.data_type()
        ))),
    }
}

fn column_i64(row: &Row<'_>, idx: usize, column: &str) -> lftsync_core::Result<i64> {
    let value = row.get_ref(idx).map_err(storage_err)?;
    value_to_i64(value, column)
}

impl OrderedChildReader for SqliteRelationalStore {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> lftsync_core::Result<Vec<Lft>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT lft FROM information_object
                 WHERE parent_id = ?1
                 ORDER BY lft ASC, id ASC
                 LIMIT ?2",
            )
            .map_err(storage_err)?;
        let mut rows = stmt
            .query(params![query.parent.0, i64::from(query.limit)])
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            out.push(Lft(column_i64(row, 0, "lft")?));
        }
        debug!(parent_id = %query.parent, children = out.len(), "read ordered children");
        Ok(out)
    }
}

impl RepairSource for SqliteRelationalStore {
    fn read_children_for_repair(
        &self,
        query: &ChildQuery<'_>,
    ) -> lftsync_core::Result<Vec<ChildRow>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, lft FROM information_object
                 WHERE parent_id = ?1
                 ORDER BY lft ASC, id ASC
                 LIMIT ?2",
            )
            .map_err(storage_err)?;
        let mut rows = stmt
            .query(params![query.parent.0, i64::from(query.limit)])
            .map_err(storage_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            out.push(ChildRow {
                id: NodeId(column_i64(row, 0, "id")?),
                lft: Lft(column_i64(row, 1, "lft")?),
            });
        }
        Ok(out)
    }
}
