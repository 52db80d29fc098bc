use crate::domain::{ImportItem, MenuItem, Restaurant};
use crate::error::Result;
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Outcome of reconciling one bulk-import payload: restaurants in the order
/// they were first seen, each holding its linked menu items, plus the flat
/// menu-item list.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub restaurants: Vec<Restaurant>,
    pub menu_items: Vec<MenuItem>,
}

impl ImportBatch {
    /// Flattens the batch into store-ready items, restaurants first so a
    /// durable store never sees a menu item before its owner.
    pub fn into_items(self) -> Vec<ImportItem> {
        let mut items: Vec<ImportItem> = self
            .restaurants
            .into_iter()
            .map(ImportItem::Restaurant)
            .collect();
        items.extend(self.menu_items.into_iter().map(ImportItem::MenuItem));
        items
    }

    pub fn len(&self) -> usize {
        self.restaurants.len() + self.menu_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty() && self.menu_items.is_empty()
    }
}

/// Parses a loosely-structured bulk-import payload and reconciles it into a
/// normalized restaurant/menu-item graph.
///
/// Accepts a JSON array, a single object, or an object wrapping a
/// `restaurants` array. Elements are classified by field presence, missing
/// ids are generated, orphaned menu items get a placeholder restaurant, and
/// approval flags are reset no matter what the input claims. Malformed JSON
/// fails the whole operation; there are no partial results.
pub fn build_import(json: &str) -> Result<ImportBatch> {
    let root: Value = serde_json::from_str(json)?;

    let mut reconciler = Reconciler::default();
    for element in top_level_elements(&root) {
        reconciler.classify(element);
    }
    Ok(reconciler.finish())
}

/// The payload may be an array, an object wrapping a `restaurants` array, or
/// a single element on its own.
fn top_level_elements(root: &Value) -> Vec<&Value> {
    if let Value::Array(elements) = root {
        return elements.iter().collect();
    }
    if let Some(Value::Array(nested)) = root.get("restaurants") {
        return nested.iter().collect();
    }
    vec![root]
}

#[derive(Default)]
struct Reconciler {
    /// Restaurants in first-seen order; the index is keyed by lowercased id.
    restaurants: Vec<Restaurant>,
    index_by_id: HashMap<String, usize>,
    menu_items: Vec<MenuItem>,
}

impl Reconciler {
    fn classify(&mut self, element: &Value) {
        let declared_type = element
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_lowercase);

        let looks_like_restaurant = declared_type.as_deref() == Some("restaurant")
            || element.get("menuItems").is_some()
            || element.get("ownerEmailAddress").is_some();
        if looks_like_restaurant {
            self.take_restaurant(element);
            return;
        }

        let looks_like_menu_item =
            declared_type.as_deref() == Some("menuitem") || element.get("restaurantId").is_some();
        if looks_like_menu_item {
            let item = prepare_menu_item(element, None);
            self.menu_items.push(item);
            return;
        }

        // Matches neither shape: dropped, by contract.
        debug!("Dropping unclassifiable import element");
    }

    fn take_restaurant(&mut self, element: &Value) {
        let restaurant = prepare_restaurant(element);
        let restaurant_id = restaurant.id.clone();
        self.upsert_restaurant(restaurant);

        if let Some(Value::Array(nested)) = element.get("menuItems") {
            for entry in nested.iter().filter(|e| e.is_object()) {
                let item = prepare_menu_item(entry, Some(&restaurant_id));
                self.menu_items.push(item);
            }
        }
    }

    /// Restaurant ids are matched case-insensitively; a later element with
    /// the same id replaces the earlier one.
    fn upsert_restaurant(&mut self, restaurant: Restaurant) {
        let key = restaurant.id.to_lowercase();
        match self.index_by_id.get(&key) {
            Some(&idx) => self.restaurants[idx] = restaurant,
            None => {
                self.index_by_id.insert(key, self.restaurants.len());
                self.restaurants.push(restaurant);
            }
        }
    }

    /// Links every menu item to exactly one restaurant, synthesizing
    /// placeholders for ids nothing else declared.
    fn finish(mut self) -> ImportBatch {
        let mut menu_items = std::mem::take(&mut self.menu_items);
        for item in &mut menu_items {
            if item.restaurant_id.trim().is_empty() {
                item.restaurant_id = generate_id();
            }
            let key = item.restaurant_id.to_lowercase();
            let idx = match self.index_by_id.get(&key) {
                Some(&idx) => idx,
                None => {
                    debug!(
                        restaurant_id = %item.restaurant_id,
                        "Synthesizing placeholder restaurant for orphaned menu item"
                    );
                    let placeholder = Restaurant::placeholder(item.restaurant_id.clone());
                    self.index_by_id.insert(key, self.restaurants.len());
                    self.restaurants.push(placeholder);
                    self.restaurants.len() - 1
                }
            };
            self.restaurants[idx].menu_items.push(item.clone());
        }

        ImportBatch {
            restaurants: self.restaurants,
            menu_items,
        }
    }
}

fn prepare_restaurant(element: &Value) -> Restaurant {
    let id = string_field(element, "id")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(generate_id);

    Restaurant {
        id,
        name: string_field(element, "name").unwrap_or_default(),
        owner_email: string_field(element, "ownerEmailAddress").unwrap_or_default(),
        // Imports never arrive pre-approved
        approved: false,
        menu_items: Vec::new(),
    }
}

fn prepare_menu_item(element: &Value, restaurant_id_hint: Option<&str>) -> MenuItem {
    let id = string_field(element, "id")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(generate_id);

    let restaurant_id = restaurant_id_hint
        .filter(|hint| !hint.trim().is_empty())
        .map(str::to_string)
        .or_else(|| read_restaurant_id(element))
        .unwrap_or_default();

    MenuItem {
        id,
        title: string_field(element, "title").unwrap_or_default(),
        price: price_field(element),
        // Reset on import: never pre-imaged, never pre-approved
        image_path: None,
        approved: false,
        restaurant_id,
    }
}

/// Looks for the canonical `restaurantId` field first, then falls back to a
/// case- and space-insensitive scan for any "restaurant id" key variant.
fn read_restaurant_id(element: &Value) -> Option<String> {
    if let Some(id) = string_field(element, "restaurantId").filter(|s| !s.trim().is_empty()) {
        return Some(id);
    }

    let object = element.as_object()?;
    for (key, value) in object {
        let normalized: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.eq_ignore_ascii_case("restaurantid") {
            if let Some(id) = scalar_to_string(value).filter(|s| !s.trim().is_empty()) {
                return Some(id);
            }
        }
    }
    None
}

/// Reads a field as a string, tolerating numeric values the way the source
/// payloads sometimes deliver ids.
fn string_field(element: &Value, key: &str) -> Option<String> {
    element.get(key).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Prices land as JSON numbers or strings; everything else is treated as
/// zero. Normalized to two decimal places to match the persisted shape.
fn price_field(element: &Value) -> BigDecimal {
    let parsed = match element.get("price") {
        Some(Value::Number(n)) => BigDecimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed
        .unwrap_or_else(BigDecimal::zero)
        .with_scale_round(2, RoundingMode::HalfUp)
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn restaurant_with_nested_menu_item() {
        let json = r#"[{"type":"restaurant","name":"Cafe","ownerEmailAddress":"a@b.com",
                        "menuItems":[{"title":"Tea","price":2.5}]}]"#;
        let batch = build_import(json).unwrap();

        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.menu_items.len(), 1);

        let restaurant = &batch.restaurants[0];
        assert_eq!(restaurant.name, "Cafe");
        assert_eq!(restaurant.owner_email, "a@b.com");
        assert!(!restaurant.approved);
        assert!(!restaurant.id.is_empty());

        let item = &batch.menu_items[0];
        assert_eq!(item.title, "Tea");
        assert_eq!(item.price, price("2.50"));
        assert_eq!(item.restaurant_id, restaurant.id);
        assert!(!item.approved);
        assert_eq!(restaurant.menu_items.len(), 1);
    }

    #[test]
    fn orphan_menu_item_gets_placeholder_restaurant() {
        let json = r#"[{"type":"menuitem","title":"Soda","price":1.0}]"#;
        let batch = build_import(json).unwrap();

        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.menu_items.len(), 1);

        let placeholder = &batch.restaurants[0];
        assert_eq!(placeholder.name, "Unknown Restaurant");
        assert_eq!(placeholder.owner_email, "");
        assert!(!placeholder.approved);
        assert_eq!(batch.menu_items[0].restaurant_id, placeholder.id);
    }

    #[test]
    fn every_menu_item_links_to_exactly_one_restaurant() {
        let json = r#"[
            {"type":"restaurant","id":"r1","name":"One","ownerEmailAddress":"one@x.com",
             "menuItems":[{"title":"A","price":1},{"title":"B","price":2}]},
            {"type":"menuitem","title":"C","price":3,"restaurantId":"r1"},
            {"type":"menuitem","title":"D","price":4},
            {"title":"E","price":5,"restaurantId":"r9"}
        ]"#;
        let batch = build_import(json).unwrap();

        for item in &batch.menu_items {
            assert!(!item.restaurant_id.trim().is_empty());
            let owners: Vec<_> = batch
                .restaurants
                .iter()
                .filter(|r| r.id.eq_ignore_ascii_case(&item.restaurant_id))
                .collect();
            assert_eq!(owners.len(), 1, "item {} should have one owner", item.title);
        }
    }

    #[test]
    fn approval_and_image_flags_are_reset() {
        let json = r#"[{"type":"restaurant","id":"r1","name":"Sly","ownerEmailAddress":"s@x.com",
                        "approved":true,
                        "menuItems":[{"id":"m1","title":"Pie","price":"9.99",
                                      "approved":true,"imagePath":"/sneaky.jpg"}]}]"#;
        let batch = build_import(json).unwrap();

        assert!(!batch.restaurants[0].approved);
        let item = &batch.menu_items[0];
        assert!(!item.approved);
        assert!(item.image_path.is_none());
        assert_eq!(item.price, price("9.99"));
    }

    #[test]
    fn spaced_restaurant_id_key_variant_links() {
        let json = r#"[
            {"type":"restaurant","id":"R-1","name":"Spacey","ownerEmailAddress":"s@x.com"},
            {"type":"menuitem","title":"Chips","price":1.25,"Restaurant Id":"R-1"}
        ]"#;
        let batch = build_import(json).unwrap();

        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.menu_items[0].restaurant_id, "R-1");
    }

    #[test]
    fn wrapper_object_and_single_object_forms() {
        let wrapped = r#"{"restaurants":[{"type":"restaurant","name":"Wrapped","ownerEmailAddress":"w@x.com"}]}"#;
        let batch = build_import(wrapped).unwrap();
        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.restaurants[0].name, "Wrapped");

        let single = r#"{"type":"restaurant","name":"Solo","ownerEmailAddress":"solo@x.com"}"#;
        let batch = build_import(single).unwrap();
        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.restaurants[0].name, "Solo");
    }

    #[test]
    fn unclassifiable_elements_are_dropped() {
        let json = r#"[{"foo":"bar"},{"type":"restaurant","name":"Kept","ownerEmailAddress":"k@x.com"}]"#;
        let batch = build_import(json).unwrap();
        assert_eq!(batch.restaurants.len(), 1);
        assert!(batch.menu_items.is_empty());
    }

    #[test]
    fn duplicate_restaurant_ids_match_case_insensitively() {
        let json = r#"[
            {"type":"restaurant","id":"ABC","name":"First","ownerEmailAddress":"f@x.com"},
            {"type":"restaurant","id":"abc","name":"Second","ownerEmailAddress":"s@x.com"},
            {"type":"menuitem","title":"Linked","price":2,"restaurantId":"AbC"}
        ]"#;
        let batch = build_import(json).unwrap();

        assert_eq!(batch.restaurants.len(), 1);
        assert_eq!(batch.restaurants[0].name, "Second");
        assert_eq!(batch.restaurants[0].menu_items.len(), 1);
    }

    #[test]
    fn blank_ids_are_regenerated() {
        let json = r#"[{"type":"restaurant","id":"  ","name":"Blank","ownerEmailAddress":"b@x.com",
                        "menuItems":[{"id":"","title":"T","price":1}]}]"#;
        let batch = build_import(json).unwrap();

        assert!(!batch.restaurants[0].id.trim().is_empty());
        assert!(!batch.menu_items[0].id.is_empty());
    }

    #[test]
    fn malformed_json_fails_whole_operation() {
        let err = build_import("{not json").unwrap_err();
        assert!(err.to_string().contains("could not parse JSON"));
    }

    #[test]
    fn normalized_form_reimports_with_stable_ids() {
        let json = r#"[
            {"type":"restaurant","name":"Cafe","ownerEmailAddress":"a@b.com",
             "menuItems":[{"title":"Tea","price":2.5}]},
            {"type":"menuitem","title":"Soda","price":1.0}
        ]"#;
        let first = build_import(json).unwrap();

        // Serializing the reconciled restaurants and importing that again
        // must reproduce the exact same graph. Staged previews rely on this
        // so generated ids stay stable across the preview and the commit.
        let normalized = serde_json::to_string(&first.restaurants).unwrap();
        let second = build_import(&normalized).unwrap();

        let ids = |batch: &ImportBatch| -> Vec<String> {
            let mut ids: Vec<String> = batch
                .restaurants
                .iter()
                .map(|r| r.id.clone())
                .chain(batch.menu_items.iter().map(|m| m.id.clone()))
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&second), ids(&first));

        let soda = second.menu_items.iter().find(|m| m.title == "Soda").unwrap();
        let orig = first.menu_items.iter().find(|m| m.title == "Soda").unwrap();
        assert_eq!(soda.restaurant_id, orig.restaurant_id);
        assert_eq!(soda.price, price("1.00"));
    }

    #[test]
    fn into_items_orders_restaurants_first() {
        let json = r#"[{"type":"menuitem","title":"Solo","price":1.0}]"#;
        let items = build_import(json).unwrap().into_items();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], ImportItem::Restaurant(_)));
        assert!(matches!(items[1], ImportItem::MenuItem(_)));
    }
}
