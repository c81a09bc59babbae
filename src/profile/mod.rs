//! Named credential profiles stored in SQLite.
//!
//! A profile is an endpoint plus the key pair for one CloudStack account.
//! Only the CLI reads these; the client itself never touches disk.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub endpoint: String,
    pub api_key: String,
    pub secret: String,
}

impl Profile {
    pub fn into_config(self) -> ClientConfig {
        ClientConfig::new(self.endpoint, self.api_key, self.secret)
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Persistent profile store.
pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    /// Open or create the profiles table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open profile database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                name TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .context("failed to create profiles table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn get(&self, name: &str) -> Result<Option<Profile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM profiles WHERE name = ?1")?;
        let mut rows = stmt.query([name])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                let profile = serde_json::from_str(&json)
                    .with_context(|| format!("corrupt profile '{name}'"))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Store a profile (upsert).
    pub fn set(&self, name: &str, profile: &Profile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO profiles (name, data) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data",
            [name, json.as_str()],
        )?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM profiles WHERE name = ?1", [name])?;
        Ok(())
    }

    /// Profile names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM profiles ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("profile store lock poisoned"))
    }
}
