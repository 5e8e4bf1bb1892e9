// src/item_db.rs

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, params};
use std::path::Path;
use tracing::{info, warn};

use crate::manufacturer::UNKNOWN_MANUFACTURER;

/// SQLite-backed store for classified items, manufacturers and batches.
pub struct ItemStore {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct StoredManufacturer {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
}

/// A previously classified item, as returned by the cache lookup.
#[derive(Debug)]
pub struct CachedItem {
    pub partnumber: String,
    pub ncm: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub manufacturer: Option<StoredManufacturer>,
}

impl ItemStore {
    /// Open (or create) the store and its schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS manufacturers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                location TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS items (
                partnumber TEXT PRIMARY KEY,
                ncm TEXT,
                description TEXT,
                short_description TEXT,
                manufacturer_id INTEGER REFERENCES manufacturers(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS batches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS batch_items (
                batch_id INTEGER NOT NULL REFERENCES batches(id),
                partnumber TEXT NOT NULL REFERENCES items(partnumber),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(batch_id, partnumber)
            );

            CREATE INDEX IF NOT EXISTS idx_items_manufacturer ON items(manufacturer_id);
            CREATE INDEX IF NOT EXISTS idx_batch_items_batch ON batch_items(batch_id);",
        )?;

        info!("item store initialized");
        Ok(Self { conn })
    }

    /// Cache lookup by partnumber, manufacturer joined in.
    pub fn get_item(&self, partnumber: &str) -> SqliteResult<Option<CachedItem>> {
        let pn = partnumber.trim();
        if pn.is_empty() {
            return Ok(None);
        }

        self.conn
            .query_row(
                "SELECT i.partnumber, i.ncm, i.description, i.short_description,
                        m.id, m.name, m.location
                 FROM items i
                 LEFT JOIN manufacturers m ON m.id = i.manufacturer_id
                 WHERE i.partnumber = ?1",
                params![pn],
                |row| {
                    let manufacturer = match row.get::<_, Option<i64>>(4)? {
                        Some(id) => Some(StoredManufacturer {
                            id,
                            name: row.get(5)?,
                            location: row.get(6)?,
                        }),
                        None => None,
                    };
                    Ok(CachedItem {
                        partnumber: row.get(0)?,
                        ncm: row.get(1)?,
                        description: row.get(2)?,
                        short_description: row.get(3)?,
                        manufacturer,
                    })
                },
            )
            .optional()
    }

    /// Insert or overwrite an item, keyed by partnumber. Blank
    /// partnumbers are rejected (returns false) rather than stored.
    pub fn upsert_item(
        &self,
        partnumber: &str,
        ncm: Option<&str>,
        description: Option<&str>,
        short_description: Option<&str>,
        manufacturer_id: Option<i64>,
    ) -> SqliteResult<bool> {
        let pn = partnumber.trim();
        if pn.is_empty() {
            warn!("refusing to upsert item without a partnumber");
            return Ok(false);
        }

        self.conn.execute(
            "INSERT INTO items (partnumber, ncm, description, short_description, manufacturer_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(partnumber) DO UPDATE SET
                ncm = excluded.ncm,
                description = excluded.description,
                short_description = excluded.short_description,
                manufacturer_id = excluded.manufacturer_id,
                updated_at = CURRENT_TIMESTAMP",
            params![pn, ncm, description, short_description, manufacturer_id],
        )?;
        info!(pn = %pn, "item stored");
        Ok(true)
    }

    /// Fetch or create a manufacturer by exact name. A blank name
    /// collapses to the unidentified sentinel. When the stored row has
    /// no location and a non-empty one is supplied, it is filled in.
    pub fn get_or_create_manufacturer(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> SqliteResult<StoredManufacturer> {
        let safe_name = {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                UNKNOWN_MANUFACTURER
            } else {
                trimmed
            }
        };

        let existing = self
            .conn
            .query_row(
                "SELECT id, name, location FROM manufacturers WHERE name = ?1",
                params![safe_name],
                |row| {
                    Ok(StoredManufacturer {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        location: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(mut m) = existing {
            let needs_location = m.location.as_deref().map(str::is_empty).unwrap_or(true);
            if needs_location {
                if let Some(loc) = location.filter(|l| !l.trim().is_empty()) {
                    self.conn.execute(
                        "UPDATE manufacturers SET location = ?1 WHERE id = ?2",
                        params![loc, m.id],
                    )?;
                    m.location = Some(loc.to_string());
                }
            }
            return Ok(m);
        }

        self.conn.execute(
            "INSERT INTO manufacturers (name, location) VALUES (?1, ?2)",
            params![safe_name, location],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(manufacturer = %safe_name, id, "manufacturer created");
        Ok(StoredManufacturer {
            id,
            name: safe_name.to_string(),
            location: location.map(String::from),
        })
    }

    /// Create a batch row for one classification run.
    pub fn create_batch(&self, name: &str) -> SqliteResult<i64> {
        self.conn
            .execute("INSERT INTO batches (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        info!(batch = id, name = %name, "batch created");
        Ok(id)
    }

    /// Link an item to a batch. Idempotent: the same pair never
    /// produces a second row.
    pub fn link_item_to_batch(&self, batch_id: i64, partnumber: &str) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO batch_items (batch_id, partnumber) VALUES (?1, ?2)",
            params![batch_id, partnumber.trim()],
        )?;
        Ok(())
    }

    /// (items, manufacturers, batches, links) row counts.
    pub fn get_counts(&self) -> SqliteResult<(usize, usize, usize, usize)> {
        let items: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        let manufacturers: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM manufacturers", [], |row| row.get(0))?;
        let batches: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        let links: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM batch_items", [], |row| row.get(0))?;
        Ok((items, manufacturers, batches, links))
    }
}
