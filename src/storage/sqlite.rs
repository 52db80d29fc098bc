use super::ItemStore;
use crate::domain::{ImportItem, MenuItem, Restaurant};
use crate::error::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

/// Durable store backed by a local SQLite database. Adds deduplicate by id,
/// so re-importing the same payload is idempotent.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS restaurants (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL,
                owner_email  TEXT NOT NULL CHECK (length(owner_email) <= 256),
                approved     INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS menu_items (
                id             TEXT PRIMARY KEY,
                title          TEXT NOT NULL,
                image_path     TEXT CHECK (image_path IS NULL OR length(image_path) <= 512),
                price          TEXT NOT NULL,
                approved       INTEGER NOT NULL DEFAULT 0,
                restaurant_id  TEXT NOT NULL REFERENCES restaurants(id)
            );
            "#,
        )?;
        Ok(())
    }
}

fn restaurant_from_row(row: &Row<'_>) -> rusqlite::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get("id")?,
        name: row.get("name")?,
        owner_email: row.get("owner_email")?,
        approved: row.get("approved")?,
        menu_items: Vec::new(),
    })
}

fn menu_item_from_row(row: &Row<'_>) -> rusqlite::Result<MenuItem> {
    let price_text: String = row.get("price")?;
    let price = BigDecimal::from_str(&price_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(MenuItem {
        id: row.get("id")?,
        title: row.get("title")?,
        image_path: row.get("image_path")?,
        price,
        approved: row.get("approved")?,
        restaurant_id: row.get("restaurant_id")?,
    })
}

const SELECT_RESTAURANT: &str = "SELECT id, name, owner_email, approved FROM restaurants";
const SELECT_MENU_ITEM: &str =
    "SELECT id, title, image_path, price, approved, restaurant_id FROM menu_items";

#[async_trait]
impl ItemStore for SqliteStore {
    async fn add_item(&self, item: ImportItem) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match item {
            ImportItem::Restaurant(r) => {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO restaurants (id, name, owner_email, approved)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![r.id, r.name, r.owner_email, r.approved],
                )?;
                if inserted == 0 {
                    debug!(id = %r.id, "Restaurant already stored, skipping");
                }
            }
            ImportItem::MenuItem(m) => {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO menu_items
                         (id, title, image_path, price, approved, restaurant_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        m.id,
                        m.title,
                        m.image_path,
                        m.price.to_string(),
                        m.approved,
                        m.restaurant_id
                    ],
                )?;
                if inserted == 0 {
                    debug!(id = %m.id, "Menu item already stored, skipping");
                }
            }
        }
        Ok(())
    }

    async fn all_items(&self) -> Result<Vec<ImportItem>> {
        let conn = self.conn.lock().unwrap();
        let mut items = Vec::new();

        let mut stmt = conn.prepare(&format!("{SELECT_RESTAURANT} ORDER BY rowid"))?;
        for restaurant in stmt.query_map([], restaurant_from_row)? {
            items.push(ImportItem::Restaurant(restaurant?));
        }

        let mut stmt = conn.prepare(&format!("{SELECT_MENU_ITEM} ORDER BY rowid"))?;
        for item in stmt.query_map([], menu_item_from_row)? {
            items.push(ImportItem::MenuItem(item?));
        }
        Ok(items)
    }

    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{SELECT_RESTAURANT} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], restaurant_from_row)?;
        Ok(rows.next().transpose()?)
    }

    async fn get_menu_item(&self, id: &str) -> Result<Option<(MenuItem, Option<Restaurant>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{SELECT_MENU_ITEM} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], menu_item_from_row)?;
        let Some(item) = rows.next().transpose()? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!("{SELECT_RESTAURANT} WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![item.restaurant_id], restaurant_from_row)?;
        let restaurant = rows.next().transpose()?;
        Ok(Some((item, restaurant)))
    }

    async fn approve_restaurant(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE restaurants SET approved = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(updated > 0)
    }

    async fn approve_menu_item(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE menu_items SET approved = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(updated > 0)
    }

    async fn pending_restaurants(&self) -> Result<Vec<Restaurant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("{SELECT_RESTAURANT} WHERE approved = 0 ORDER BY rowid"))?;
        let restaurants = stmt
            .query_map([], restaurant_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(restaurants)
    }

    async fn pending_menu_items_for_owner(&self, email: &str) -> Result<Vec<MenuItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.id, m.title, m.image_path, m.price, m.approved, m.restaurant_id
             FROM menu_items m
             JOIN restaurants r ON r.id = m.restaurant_id
             WHERE m.approved = 0 AND lower(r.owner_email) = lower(?1)
             ORDER BY m.rowid",
        )?;
        let items = stmt
            .query_map(params![email], menu_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    async fn approved_restaurants(&self) -> Result<Vec<Restaurant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("{SELECT_RESTAURANT} WHERE approved = 1 ORDER BY rowid"))?;
        let mut restaurants = stmt
            .query_map([], restaurant_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for restaurant in &mut restaurants {
            restaurant.menu_items = approved_items_for(&conn, &restaurant.id)?;
        }
        Ok(restaurants)
    }

    async fn approved_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("{SELECT_RESTAURANT} WHERE id = ?1 AND approved = 1"))?;
        let mut rows = stmt.query_map(params![id], restaurant_from_row)?;
        let Some(mut restaurant) = rows.next().transpose()? else {
            return Ok(None);
        };
        restaurant.menu_items = approved_items_for(&conn, &restaurant.id)?;
        Ok(Some(restaurant))
    }

    async fn set_menu_item_image(&self, id: &str, path: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE menu_items SET image_path = ?2 WHERE id = ?1",
            params![id, path],
        )?;
        Ok(())
    }
}

fn approved_items_for(conn: &Connection, restaurant_id: &str) -> Result<Vec<MenuItem>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_MENU_ITEM} WHERE restaurant_id = ?1 AND approved = 1 ORDER BY rowid"
    ))?;
    let items = stmt
        .query_map(params![restaurant_id], menu_item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}
