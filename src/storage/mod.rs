use crate::domain::{ImportItem, MenuItem, Restaurant};
use crate::error::Result;
use async_trait::async_trait;

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Store for imported restaurants and menu items, treated uniformly as
/// [`ImportItem`]s on the way in and queried by shape on the way out.
///
/// Two implementations: [`SqliteStore`] is durable and deduplicates adds by
/// id; [`InMemoryStore`] is a transient accumulating list for development
/// and tests.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Adds a single item. Durable stores treat a re-add of an existing id
    /// as a no-op.
    async fn add_item(&self, item: ImportItem) -> Result<()>;

    /// Every stored item, restaurants first.
    async fn all_items(&self) -> Result<Vec<ImportItem>>;

    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>>;

    /// A menu item together with its owning restaurant, when present.
    async fn get_menu_item(&self, id: &str) -> Result<Option<(MenuItem, Option<Restaurant>)>>;

    /// One-way transition to approved. Returns false for unknown ids.
    async fn approve_restaurant(&self, id: &str) -> Result<bool>;

    /// One-way transition to approved. Returns false for unknown ids.
    /// Authorization (owner-email match) is the caller's responsibility.
    async fn approve_menu_item(&self, id: &str) -> Result<bool>;

    async fn pending_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// Unapproved menu items whose owning restaurant's owner email matches
    /// case-insensitively.
    async fn pending_menu_items_for_owner(&self, email: &str) -> Result<Vec<MenuItem>>;

    /// Approved restaurants only, each carrying only its approved items.
    async fn approved_restaurants(&self) -> Result<Vec<Restaurant>>;

    /// A single approved restaurant with its approved items, or None for
    /// unknown or unapproved ids.
    async fn approved_restaurant(&self, id: &str) -> Result<Option<Restaurant>>;

    async fn set_menu_item_image(&self, id: &str, path: &str) -> Result<()>;
}
