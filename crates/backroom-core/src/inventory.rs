use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::repo::{Record, Repository};
use crate::scope::TenantScope;
use crate::store::DocumentStore;

pub type Inventory<S> = Repository<S, InventoryItem>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Assigned on create ("stock-N"); leave empty for new items
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Unit the quantity is counted in, e.g. "kg", "bottle"
    pub unit: String,
    #[serde(default)]
    pub quantity: f64,
    /// At or below this quantity the item is reported as low stock
    #[serde(default)]
    pub reorder_level: f64,
    #[serde(default)]
    pub unit_cost_cents: u64,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, quantity: f64) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            unit: unit.into(),
            quantity,
            reorder_level: 0.0,
            unit_cost_cents: 0,
        }
    }

    pub fn is_low(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl Record for InventoryItem {
    const COLLECTION: &'static str = "inventory";
    const ID_PREFIX: &'static str = "stock";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("inventory item name must not be empty".to_string());
        }
        if self.unit.trim().is_empty() {
            return Err(format!("'{}' has no unit", self.name));
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(format!(
                "'{}' quantity must be a non-negative number, got {}",
                self.name, self.quantity
            ));
        }
        if !self.reorder_level.is_finite() || self.reorder_level < 0.0 {
            return Err(format!(
                "'{}' reorder level must be a non-negative number",
                self.name
            ));
        }
        Ok(())
    }
}

impl<S: DocumentStore + ?Sized> Repository<S, InventoryItem> {
    /// Add `delta` (negative to consume) to the stored quantity in one
    /// transaction. A result below zero is rejected and nothing is written.
    pub async fn adjust_stock(
        &self,
        scope: &TenantScope,
        id: &str,
        delta: f64,
    ) -> Result<InventoryItem, CatalogError> {
        if !delta.is_finite() {
            return Err(CatalogError::Invalid(format!("stock delta {delta} is not a number")));
        }
        self.modify(scope, id, |item: &mut InventoryItem| {
            let next = item.quantity + delta;
            if next < 0.0 {
                return Err(CatalogError::Invalid(format!(
                    "only {} {} of '{}' in stock, cannot remove {}",
                    item.quantity, item.unit, item.name, -delta
                )));
            }
            item.quantity = next;
            Ok(())
        })
        .await
    }

    pub async fn low_stock(&self, scope: &TenantScope) -> Result<Vec<InventoryItem>, CatalogError> {
        Ok(self
            .list(scope)
            .await?
            .into_iter()
            .filter(InventoryItem::is_low)
            .collect())
    }
}
