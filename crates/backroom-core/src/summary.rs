use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::inventory::Inventory;
use crate::menu::MenuCatalog;
use crate::orders::TakeoutDesk;
use crate::scope::TenantScope;
use crate::sequence::Clock;
use crate::store::DocumentStore;

/// At-a-glance numbers for a tenant's back office.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Day the order count refers to (YYYYMMDD)
    pub day: String,
    pub menu_items: usize,
    /// Names of menu items currently switched off
    pub unavailable_items: Vec<String>,
    /// Names of inventory items at or below their reorder level
    pub low_stock: Vec<String>,
    pub open_orders: usize,
    /// Display ids issued today
    pub orders_today: u64,
}

pub async fn summarize<S, C>(
    menu: &MenuCatalog<S>,
    inventory: &Inventory<S>,
    desk: &TakeoutDesk<S, C>,
    scope: &TenantScope,
) -> Result<DashboardSummary, OrderError>
where
    S: DocumentStore + ?Sized,
    C: Clock,
{
    let items = menu.list(scope).await?;
    let low_stock = inventory.low_stock(scope).await?;
    let open_orders = desk.list_open(scope).await?.len();
    let day = desk.counter().today();
    let orders_today = desk
        .counter()
        .current(scope, day)
        .await?
        .map_or(0, |record| record.count);

    Ok(DashboardSummary {
        day: day.to_string(),
        menu_items: items.len(),
        unavailable_items: items
            .iter()
            .filter(|i| !i.available)
            .map(|i| i.name.clone())
            .collect(),
        low_stock: low_stock.into_iter().map(|i| i.name).collect(),
        open_orders,
        orders_today,
    })
}
