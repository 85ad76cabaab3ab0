//! Identity Storage
//! Mission: Store and look up accounts by email identity with SQLite

use crate::auth::{
    db,
    models::{Account, AccountStatus},
};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Account persistence boundary
pub trait IdentityStore: Send + Sync {
    /// Case-insensitive exact match on email
    fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Upsert the account and its role relations, returning the persisted state
    fn save(&self, account: &Account) -> Result<Account>;

    /// Change only the status, leaving role relations as stored.
    /// Returns the persisted account, or `None` if the id is unknown.
    fn set_status(&self, account_id: &str, status: AccountStatus) -> Result<Option<Account>>;
}

/// Account storage with SQLite backend
pub struct SqliteIdentityStore {
    db_path: String,
}

impl SqliteIdentityStore {
    /// Create a new store and initialize database
    pub fn new(db_path: &str) -> Result<Self> {
        db::init_schema(db_path)?;
        Ok(Self {
            db_path: db_path.to_string(),
        })
    }

    fn load(conn: &Connection, column: &str, key: &str) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT id, email, first_name, last_name, password_hash, status, created_by, created_at
             FROM accounts WHERE {} = ?1",
            column
        );

        let account = conn
            .query_row(&sql, params![key], |row| {
                let status: String = row.get(5)?;
                Ok(Account {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    password_hash: row.get(4)?,
                    status: AccountStatus::from_str(&status).unwrap_or(AccountStatus::Inactive),
                    created_by: row.get(6)?,
                    created_at: row.get(7)?,
                    roles: Vec::new(),
                })
            })
            .optional()?;

        match account {
            Some(mut account) => {
                account.roles = db::roles_for_account(conn, &account.id)?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let conn = db::open(&self.db_path)?;
        Self::load(&conn, "email", email.trim())
    }

    fn save(&self, account: &Account) -> Result<Account> {
        let mut conn = db::open(&self.db_path)?;
        let tx = conn.transaction()?;

        // Only status is mutable once the row exists
        tx.execute(
            "INSERT INTO accounts
                (id, email, first_name, last_name, password_hash, status, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status",
            params![
                account.id,
                account.email,
                account.first_name,
                account.last_name,
                account.password_hash,
                account.status.as_str(),
                account.created_by,
                account.created_at,
            ],
        )
        .context("Failed to upsert account")?;

        tx.execute(
            "DELETE FROM account_roles WHERE account_id = ?1",
            params![account.id],
        )?;
        for role in &account.roles {
            tx.execute(
                "INSERT OR IGNORE INTO account_roles (account_id, role_id) VALUES (?1, ?2)",
                params![account.id, role.id],
            )
            .with_context(|| format!("Failed to assign role {}", role.name))?;
        }

        tx.commit().context("Failed to commit account")?;

        debug!(
            account = %account.id,
            status = account.status.as_str(),
            roles = account.roles.len(),
            "Saved account"
        );

        Self::load(&conn, "id", &account.id)?
            .ok_or_else(|| anyhow!("Account {} missing after save", account.id))
    }

    fn set_status(&self, account_id: &str, status: AccountStatus) -> Result<Option<Account>> {
        let conn = db::open(&self.db_path)?;
        let updated = conn
            .execute(
                "UPDATE accounts SET status = ?1 WHERE id = ?2",
                params![status.as_str(), account_id],
            )
            .context("Failed to update account status")?;

        if updated == 0 {
            return Ok(None);
        }
        debug!(account = account_id, status = status.as_str(), "Updated account status");
        Self::load(&conn, "id", account_id)
    }
}

impl SqliteIdentityStore {
    /// Number of stored accounts
    pub fn count(&self) -> Result<usize> {
        let conn = db::open(&self.db_path)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
