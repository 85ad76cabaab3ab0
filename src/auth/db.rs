//! SQLite Schema
//! Mission: Shared schema and connection setup for account and role storage

use crate::auth::models::{Role, RoleStatus};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::time::Duration;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection with foreign keys on and a busy timeout, so several
/// store instances (or processes) can share one file
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open auth database at {}", db_path))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Create tables if missing. Uniqueness of email and role name is enforced here.
pub fn init_schema(db_path: &str) -> Result<()> {
    let conn = open(db_path)?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL COLLATE NOCASE UNIQUE,
            first_name TEXT,
            last_name TEXT,
            password_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL COLLATE NOCASE UNIQUE,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS account_roles (
            account_id TEXT NOT NULL REFERENCES accounts(id),
            role_id TEXT NOT NULL REFERENCES roles(id),
            PRIMARY KEY (account_id, role_id)
        );",
    )
    .context("Failed to initialize auth schema")?;

    Ok(())
}

pub(crate) fn row_to_role(row: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    let status: String = row.get(2)?;
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        status: RoleStatus::from_str(&status).unwrap_or(RoleStatus::Active),
    })
}

/// Roles currently related to an account, ordered by name
pub(crate) fn roles_for_account(conn: &Connection, account_id: &str) -> Result<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.status
         FROM roles r JOIN account_roles ar ON ar.role_id = r.id
         WHERE ar.account_id = ?1
         ORDER BY r.name",
    )?;

    let roles = stmt
        .query_map(params![account_id], row_to_role)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(roles)
}

/// True when the error is a UNIQUE/PRIMARY KEY violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
