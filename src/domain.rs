use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// A restaurant together with the menu items it owns. Imported restaurants
/// start unapproved and stay out of the public catalog until an admin
/// approves them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(rename = "ownerEmailAddress")]
    pub owner_email: String,
    pub approved: bool,
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub price: BigDecimal,
    pub image_path: Option<String>,
    pub approved: bool,
    pub restaurant_id: String,
}

/// The two kinds of record a bulk import can produce. A closed set dispatched
/// by pattern matching; stores treat both uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImportItem {
    Restaurant(Restaurant),
    MenuItem(MenuItem),
}

impl Restaurant {
    /// Placeholder owner for menu items that arrive without any restaurant
    /// reference.
    pub fn placeholder(id: String) -> Self {
        Self {
            id,
            name: "Unknown Restaurant".to_string(),
            owner_email: String::new(),
            approved: false,
            menu_items: Vec::new(),
        }
    }
}

impl ImportItem {
    pub fn id(&self) -> &str {
        match self {
            ImportItem::Restaurant(r) => &r.id,
            ImportItem::MenuItem(m) => &m.id,
        }
    }
}
