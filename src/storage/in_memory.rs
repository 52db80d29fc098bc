use super::ItemStore;
use crate::domain::{ImportItem, MenuItem, Restaurant};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

/// Transient store backed by a mutex-guarded list that accumulates across
/// calls. Unlike the durable store it does not deduplicate adds, and
/// concurrent multi-user use is last-writer-wins; a known limitation, not a
/// guarantee.
pub struct InMemoryStore {
    items: Mutex<Vec<ImportItem>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn add_item(&self, item: ImportItem) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = match item {
            // Nested items arrive as their own entries; store the bare row
            ImportItem::Restaurant(mut r) => {
                r.menu_items.clear();
                ImportItem::Restaurant(r)
            }
            other => other,
        };
        debug!(id = %item.id(), "Added item to in-memory store");
        items.push(item);
        Ok(())
    }

    async fn all_items(&self) -> Result<Vec<ImportItem>> {
        let items = self.items.lock().unwrap();
        let mut all: Vec<ImportItem> = items
            .iter()
            .filter(|i| matches!(i, ImportItem::Restaurant(_)))
            .cloned()
            .collect();
        all.extend(
            items
                .iter()
                .filter(|i| matches!(i, ImportItem::MenuItem(_)))
                .cloned(),
        );
        Ok(all)
    }

    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        let items = self.items.lock().unwrap();
        Ok(items.iter().find_map(|item| match item {
            ImportItem::Restaurant(r) if r.id == id => Some(r.clone()),
            _ => None,
        }))
    }

    async fn get_menu_item(&self, id: &str) -> Result<Option<(MenuItem, Option<Restaurant>)>> {
        let items = self.items.lock().unwrap();
        let menu_item = items.iter().find_map(|item| match item {
            ImportItem::MenuItem(m) if m.id == id => Some(m.clone()),
            _ => None,
        });
        let Some(menu_item) = menu_item else {
            return Ok(None);
        };
        let restaurant = items.iter().find_map(|item| match item {
            ImportItem::Restaurant(r) if r.id == menu_item.restaurant_id => Some(r.clone()),
            _ => None,
        });
        Ok(Some((menu_item, restaurant)))
    }

    async fn approve_restaurant(&self, id: &str) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        for item in items.iter_mut() {
            if let ImportItem::Restaurant(r) = item {
                if r.id == id {
                    r.approved = true;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn approve_menu_item(&self, id: &str) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        for item in items.iter_mut() {
            if let ImportItem::MenuItem(m) = item {
                if m.id == id {
                    m.approved = true;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn pending_restaurants(&self) -> Result<Vec<Restaurant>> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter_map(|item| match item {
                ImportItem::Restaurant(r) if !r.approved => Some(r.clone()),
                _ => None,
            })
            .collect())
    }

    async fn pending_menu_items_for_owner(&self, email: &str) -> Result<Vec<MenuItem>> {
        let items = self.items.lock().unwrap();
        let owned_ids: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                ImportItem::Restaurant(r) if r.owner_email.eq_ignore_ascii_case(email) => {
                    Some(r.id.clone())
                }
                _ => None,
            })
            .collect();

        Ok(items
            .iter()
            .filter_map(|item| match item {
                ImportItem::MenuItem(m)
                    if !m.approved && owned_ids.contains(&m.restaurant_id) =>
                {
                    Some(m.clone())
                }
                _ => None,
            })
            .collect())
    }

    async fn approved_restaurants(&self) -> Result<Vec<Restaurant>> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter_map(|item| match item {
                ImportItem::Restaurant(r) if r.approved => {
                    Some(with_approved_items(r, &items))
                }
                _ => None,
            })
            .collect())
    }

    async fn approved_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        let items = self.items.lock().unwrap();
        Ok(items.iter().find_map(|item| match item {
            ImportItem::Restaurant(r) if r.approved && r.id == id => {
                Some(with_approved_items(r, &items))
            }
            _ => None,
        }))
    }

    async fn set_menu_item_image(&self, id: &str, path: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        for item in items.iter_mut() {
            if let ImportItem::MenuItem(m) = item {
                if m.id == id {
                    m.image_path = Some(path.to_string());
                }
            }
        }
        Ok(())
    }
}

fn with_approved_items(restaurant: &Restaurant, items: &[ImportItem]) -> Restaurant {
    let mut filled = restaurant.clone();
    filled.menu_items = items
        .iter()
        .filter_map(|item| match item {
            ImportItem::MenuItem(m) if m.approved && m.restaurant_id == restaurant.id => {
                Some(m.clone())
            }
            _ => None,
        })
        .collect();
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn restaurant(id: &str, owner: &str) -> ImportItem {
        ImportItem::Restaurant(Restaurant {
            id: id.to_string(),
            name: format!("Restaurant {id}"),
            owner_email: owner.to_string(),
            approved: false,
            menu_items: Vec::new(),
        })
    }

    fn menu_item(id: &str, restaurant_id: &str) -> ImportItem {
        ImportItem::MenuItem(MenuItem {
            id: id.to_string(),
            title: format!("Item {id}"),
            price: BigDecimal::from_str("5.00").unwrap(),
            image_path: None,
            approved: false,
            restaurant_id: restaurant_id.to_string(),
        })
    }

    #[tokio::test]
    async fn approval_flow_and_catalog_filtering() {
        let store = InMemoryStore::new();
        store.add_item(restaurant("r1", "owner@x.com")).await.unwrap();
        store.add_item(menu_item("m1", "r1")).await.unwrap();
        store.add_item(menu_item("m2", "r1")).await.unwrap();

        assert!(store.approved_restaurants().await.unwrap().is_empty());

        assert!(store.approve_restaurant("r1").await.unwrap());
        assert!(store.approve_menu_item("m1").await.unwrap());

        let catalog = store.approved_restaurants().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].menu_items.len(), 1);
        assert_eq!(catalog[0].menu_items[0].id, "m1");

        assert!(!store.approve_restaurant("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn pending_items_scoped_to_owner_email() {
        let store = InMemoryStore::new();
        store.add_item(restaurant("r1", "Owner@X.com")).await.unwrap();
        store.add_item(restaurant("r2", "other@y.com")).await.unwrap();
        store.add_item(menu_item("m1", "r1")).await.unwrap();
        store.add_item(menu_item("m2", "r2")).await.unwrap();

        let mine = store
            .pending_menu_items_for_owner("owner@x.com")
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "m1");
    }

    #[tokio::test]
    async fn menu_item_lookup_attaches_owner() {
        let store = InMemoryStore::new();
        store.add_item(restaurant("r1", "owner@x.com")).await.unwrap();
        store.add_item(menu_item("m1", "r1")).await.unwrap();
        store.add_item(menu_item("m9", "nowhere")).await.unwrap();

        let (item, owner) = store.get_menu_item("m1").await.unwrap().unwrap();
        assert_eq!(item.id, "m1");
        assert_eq!(owner.unwrap().owner_email, "owner@x.com");

        let (_, owner) = store.get_menu_item("m9").await.unwrap().unwrap();
        assert!(owner.is_none());
    }
}
