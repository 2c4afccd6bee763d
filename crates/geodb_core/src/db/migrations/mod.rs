//! Catalog schema migrations.
//!
//! # Invariants
//! - Steps are listed in strictly increasing version order.
//! - All pending steps run in one transaction; a failure leaves the file at
//!   its previous version.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// Schema steps as `(version, name, sql)`.
const STEPS: &[(u32, &str, &str)] = &[
    (1, "catalog", include_str!("0001_catalog.sql")),
    (2, "channel_data", include_str!("0002_channel_data.sql")),
];

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _, _)| *version)
}

/// Reads the schema version of an open connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Brings `conn` up to [`latest_version`]; returns the version it started at.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let found = current_user_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending = STEPS
        .iter()
        .filter(|(version, _, _)| *version > found)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for (version, name, sql) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        debug!("event=db_migrate_step module=db status=ok version={version} name={name}");
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={supported}");
    Ok(found)
}
