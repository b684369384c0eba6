use std::cell::RefCell;
use std::rc::Rc;

use postgres::Client;
use tracing::debug;

use lftsync_core::{
    ChildQuery, ChildRow, Error, Lft, NodeId, OrderedChildReader, RepairSource, Result,
};

fn storage_debug<E: std::fmt::Debug>(e: E) -> Error {
    Error::Storage(format!("{e:?}"))
}

// Columns are cast to BIGINT so INTEGER and BIGINT schemas read back identically.
const ORDERED_CHILDREN_SQL: &str = "SELECT lft::BIGINT \
     FROM information_object \
     WHERE parent_id = $1::BIGINT \
     ORDER BY lft ASC, id ASC \
     LIMIT $2";

const REPAIR_CHILDREN_SQL: &str = "SELECT id::BIGINT, lft::BIGINT \
     FROM information_object \
     WHERE parent_id = $1::BIGINT \
     ORDER BY lft ASC, id ASC \
     LIMIT $2";

/// Reads a parent's children from the authoritative Postgres table.
///
/// Shares the connection with the rest of the host through `Rc<RefCell<_>>`, the same way the
/// other Postgres helpers in this workspace take it.
#[derive(Clone)]
pub struct PgRelationalReader {
    client: Rc<RefCell<Client>>,
}

impl PgRelationalReader {
    pub fn new(client: Rc<RefCell<Client>>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Rc<RefCell<Client>> {
        &self.client
    }
}

impl OrderedChildReader for PgRelationalReader {
    fn read_ordered_children(&self, query: &ChildQuery<'_>) -> Result<Vec<Lft>> {
        let mut c = self.client.borrow_mut();
        let rows = c
            .query(
                ORDERED_CHILDREN_SQL,
                &[&query.parent.0, &i64::from(query.limit)],
            )
            .map_err(storage_debug)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Lft(row.try_get::<_, i64>(0).map_err(storage_debug)?));
        }
        debug!(parent_id = %query.parent, children = out.len(), "read ordered children");
        Ok(out)
    }
}

impl RepairSource for PgRelationalReader {
    fn read_children_for_repair(&self, query: &ChildQuery<'_>) -> Result<Vec<ChildRow>> {
        let mut c = self.client.borrow_mut();
        let rows = c
            .query(
                REPAIR_CHILDREN_SQL,
                &[&query.parent.0, &i64::from(query.limit)],
            )
            .map_err(storage_debug)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(ChildRow {
                id: NodeId(row.try_get::<_, i64>(0).map_err(storage_debug)?),
                lft: Lft(row.try_get::<_, i64>(1).map_err(storage_debug)?),
            });
        }
        Ok(out)
    }
}
