use postgres::Client;
use lftsync_core::{ChildRow, Error, NodeId, Result};

const SCHEMA_LOCK_KEY: i64 = 0x6c667473796e63; // "lftsync"

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS information_object (
  id BIGINT PRIMARY KEY,
  parent_id BIGINT,
  lft INTEGER NOT NULL,
  rgt INTEGER
);

CREATE INDEX IF NOT EXISTS idx_information_object_parent_lft
  ON information_object (parent_id, lft);
"#;

pub fn ensure_schema(client: &mut Client) -> Result<()> {
    // `CREATE TABLE IF NOT EXISTS` is not fully concurrency-safe in Postgres; concurrent calls can
    // still fail with catalog uniqueness violations. Serialize schema creation across processes.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(|e| Error::Storage(format!("{e:?}")))?;

    let res = client
        .batch_execute(SCHEMA_SQL)
        .map_err(|e| Error::Storage(format!("{e:?}")));

    // Best-effort unlock. Locks are also released when the connection is dropped.
    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    res
}

pub fn reset_parent_for_tests(client: &mut Client, parent: NodeId) -> Result<()> {
    client
        .execute(
            "DELETE FROM information_object WHERE parent_id = $1",
            &[&parent.0],
        )
        .map_err(|e| Error::Storage(format!("{e:?}")))?;
    Ok(())
}

/// Upsert `rows` as children of `parent` in one transaction.
pub fn insert_children(client: &mut Client, parent: NodeId, rows: &[ChildRow]) -> Result<()> {
    let mut tx = client
        .transaction()
        .map_err(|e| Error::Storage(e.to_string()))?;
    for row in rows {
        let lft = i32::try_from(row.lft.0)
            .map_err(|_| Error::InvalidValue(format!("lft {} overflows INTEGER", row.lft)))?;
        tx.execute(
            "INSERT INTO information_object (id, parent_id, lft) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET parent_id = EXCLUDED.parent_id, lft = EXCLUDED.lft",
            &[&row.id.0, &parent.0, &lft],
        )
        .map_err(|e| Error::Storage(e.to_string()))?;
    }
    tx.commit().map_err(|e| Error::Storage(e.to_string()))?;
    Ok(())
}
