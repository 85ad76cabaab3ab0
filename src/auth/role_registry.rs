//! Role Registry
//! Mission: Resolve role names to shared role records, creating missing ones

use crate::auth::{
    db,
    models::{Role, RoleStatus},
};
use anyhow::{anyhow, Context, Result};
use rusqlite::params;
use tracing::{debug, info};

/// Lookup-or-create access to role reference data
pub trait RoleRegistry: Send + Sync {
    /// Case-insensitive lookup
    fn find_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Case-insensitive lookup; on miss, create an ACTIVE role with a fresh id
    fn resolve_or_create(&self, name: &str) -> Result<Role>;
}

/// Role registry with SQLite backend
pub struct SqliteRoleRegistry {
    db_path: String,
}

impl SqliteRoleRegistry {
    /// Create a registry and make sure the schema exists
    pub fn new(db_path: &str) -> Result<Self> {
        db::init_schema(db_path)?;
        Ok(Self {
            db_path: db_path.to_string(),
        })
    }
}

impl RoleRegistry for SqliteRoleRegistry {
    fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = db::open(&self.db_path)?;

        let result = conn.query_row(
            "SELECT id, name, status FROM roles WHERE name = ?1",
            params![name.trim()],
            db::row_to_role,
        );

        match result {
            Ok(role) => Ok(Some(role)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_or_create(&self, name: &str) -> Result<Role> {
        let name = name.trim();
        if let Some(role) = self.find_by_name(name)? {
            return Ok(role);
        }

        let role = Role {
            id: Role::generate_id(),
            name: name.to_string(),
            status: RoleStatus::Active,
        };

        let conn = db::open(&self.db_path)?;
        let inserted = conn.execute(
            "INSERT INTO roles (id, name, status) VALUES (?1, ?2, ?3)",
            params![role.id, role.name, role.status.as_str()],
        );

        match inserted {
            Ok(_) => {
                info!(role = %role.name, id = %role.id, "Created role");
                Ok(role)
            }
            // Another writer created it between our read and insert
            Err(e) if db::is_constraint_violation(&e) => {
                debug!(role = name, "Role created concurrently, re-reading");
                self.find_by_name(name)?
                    .ok_or_else(|| anyhow!("Role {} missing after uniqueness conflict", name))
            }
            Err(e) => Err(e).context("Failed to insert role"),
        }
    }
}
