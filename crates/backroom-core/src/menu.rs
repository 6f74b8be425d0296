use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::repo::{Record, Repository};
use crate::scope::TenantScope;
use crate::store::DocumentStore;

pub type MenuCatalog<S> = Repository<S, MenuItem>;

const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MenuCategory {
    Starter,
    Main,
    Side,
    Dessert,
    Drink,
    Special,
}

impl MenuCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuCategory::Starter => "starter",
            MenuCategory::Main => "main",
            MenuCategory::Side => "side",
            MenuCategory::Dessert => "dessert",
            MenuCategory::Drink => "drink",
            MenuCategory::Special => "special",
        }
    }
}

fn default_category() -> MenuCategory {
    MenuCategory::Main
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Assigned on create ("item-N"); leave empty for new items
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: MenuCategory,
    /// Price in the smallest currency unit
    pub price_cents: u64,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergens: Vec<String>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, category: MenuCategory, price_cents: u64) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            category,
            price_cents,
            available: true,
            ingredients: vec![],
            allergens: vec![],
        }
    }

    pub fn with_ingredients<I, T>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }
}

impl Record for MenuItem {
    const COLLECTION: &'static str = "menu";
    const ID_PREFIX: &'static str = "item";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("menu item name must not be empty".to_string());
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(format!(
                "description of '{}' exceeds {} characters",
                self.name, MAX_DESCRIPTION_CHARS
            ));
        }
        if self.ingredients.iter().any(|i| i.trim().is_empty()) {
            return Err(format!("'{}' lists an empty ingredient", self.name));
        }
        Ok(())
    }
}

/// Render cents as a decimal amount, e.g. 1250 -> "12.50".
pub fn format_price(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

impl<S: DocumentStore + ?Sized> Repository<S, MenuItem> {
    pub async fn set_available(
        &self,
        scope: &TenantScope,
        id: &str,
        available: bool,
    ) -> Result<MenuItem, CatalogError> {
        self.modify(scope, id, |item: &mut MenuItem| {
            item.available = available;
            Ok::<_, CatalogError>(())
        })
        .await
    }

    pub async fn set_description(
        &self,
        scope: &TenantScope,
        id: &str,
        description: &str,
    ) -> Result<MenuItem, CatalogError> {
        self.modify(scope, id, |item: &mut MenuItem| {
            item.description = description.to_string();
            Ok::<_, CatalogError>(())
        })
        .await
    }
}
