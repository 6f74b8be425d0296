//! Takeout orders. Each order carries a human-facing display id drawn from the
//! tenant's daily [`SequenceCounter`]; storage uses its own `order-N` id.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrderError;
use crate::menu::{MenuCatalog, MenuItem};
use crate::repo::{Record, Repository};
use crate::scope::TenantScope;
use crate::sequence::{Clock, LocalClock, SequenceCounter};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Open,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Open, Ready) | (Ready, Completed) | (Open, Cancelled) | (Ready, Cancelled)
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Ready)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Open => "open",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TakeoutOrder {
    #[serde(default)]
    pub id: String,
    /// Sequence identifier shown to staff and customers, e.g. "00007-20240726"
    pub display_id: String,
    pub customer: String,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Record for TakeoutOrder {
    const COLLECTION: &'static str = "orders";
    const ID_PREFIX: &'static str = "order";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), String> {
        if self.customer.trim().is_empty() {
            return Err("order needs a customer name".to_string());
        }
        if self.lines.is_empty() {
            return Err("order has no lines".to_string());
        }
        if self.display_id.is_empty() {
            return Err("order has no display id".to_string());
        }
        Ok(())
    }
}

/// One requested line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    /// ID of the menu item, e.g. "item-3"
    pub menu_item_id: String,
    pub quantity: u32,
}

/// Creates and tracks takeout orders for a store.
pub struct TakeoutDesk<S: ?Sized, C = LocalClock> {
    menu: MenuCatalog<S>,
    orders: Repository<S, TakeoutOrder>,
    counter: SequenceCounter<S, C>,
}

impl<S: ?Sized, C: Clone> Clone for TakeoutDesk<S, C> {
    fn clone(&self) -> Self {
        Self {
            menu: self.menu.clone(),
            orders: self.orders.clone(),
            counter: self.counter.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> TakeoutDesk<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            menu: MenuCatalog::new(Arc::clone(&store)),
            orders: Repository::new(Arc::clone(&store)),
            counter: SequenceCounter::new(store),
        }
    }
}

impl<S: DocumentStore + ?Sized, C: Clock> TakeoutDesk<S, C> {
    /// Swap in a differently configured counter (clock, retry policy).
    pub fn with_counter<K: Clock>(self, counter: SequenceCounter<S, K>) -> TakeoutDesk<S, K> {
        TakeoutDesk {
            menu: self.menu,
            orders: self.orders,
            counter,
        }
    }

    pub fn counter(&self) -> &SequenceCounter<S, C> {
        &self.counter
    }

    /// Price the requested lines from the menu, reserve a display id and store
    /// the order. If no display id can be obtained the order is not created.
    pub async fn create(
        &self,
        scope: &TenantScope,
        customer: &str,
        lines: &[LineRequest],
    ) -> Result<TakeoutOrder, OrderError> {
        if customer.trim().is_empty() {
            return Err(OrderError::Invalid("customer name is required".to_string()));
        }
        if lines.is_empty() {
            return Err(OrderError::Invalid("an order needs at least one line".to_string()));
        }

        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(OrderError::Invalid(format!(
                    "quantity for `{}` must be at least 1",
                    line.menu_item_id
                )));
            }
            let item: MenuItem = self
                .menu
                .find(scope, &line.menu_item_id)
                .await?
                .ok_or_else(|| {
                    OrderError::Invalid(format!("menu item `{}` does not exist", line.menu_item_id))
                })?;
            if !item.available {
                return Err(OrderError::Invalid(format!("'{}' is not available", item.name)));
            }
            priced.push(OrderLine {
                menu_item_id: item.id,
                name: item.name,
                quantity: line.quantity,
                unit_price_cents: item.price_cents,
            });
        }
        let total_cents = priced
            .iter()
            .try_fold(0u64, |total, l| {
                l.unit_price_cents
                    .checked_mul(u64::from(l.quantity))
                    .and_then(|line_total| total.checked_add(line_total))
            })
            .ok_or_else(|| OrderError::Invalid("order total overflows".to_string()))?;

        let display_id = self.counter.next(scope).await?;
        let order = TakeoutOrder {
            id: String::new(),
            display_id: display_id.to_string(),
            customer: customer.trim().to_string(),
            lines: priced,
            total_cents,
            status: OrderStatus::Open,
            created_at: Utc::now(),
        };
        let order = self.orders.create(scope, order).await?;
        info!(scope = %scope, id = %order.id, display_id = %order.display_id, "takeout order created");
        Ok(order)
    }

    pub async fn set_status(
        &self,
        scope: &TenantScope,
        id: &str,
        status: OrderStatus,
    ) -> Result<TakeoutOrder, OrderError> {
        self.orders
            .modify(scope, id, |order: &mut TakeoutOrder| {
                if !order.status.can_transition_to(status) {
                    return Err(OrderError::Transition {
                        from: order.status,
                        to: status,
                    });
                }
                order.status = status;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, scope: &TenantScope, id: &str) -> Result<TakeoutOrder, OrderError> {
        Ok(self.orders.get(scope, id).await?)
    }

    pub async fn list(&self, scope: &TenantScope) -> Result<Vec<TakeoutOrder>, OrderError> {
        Ok(self.orders.list(scope).await?)
    }

    pub async fn list_open(&self, scope: &TenantScope) -> Result<Vec<TakeoutOrder>, OrderError> {
        Ok(self
            .list(scope)
            .await?
            .into_iter()
            .filter(|o| o.status.is_open())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        use OrderStatus::*;
        assert!(Open.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Completed));
        assert!(Open.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Cancelled));
        assert!(!Open.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Open));
        assert!(!Cancelled.can_transition_to(Ready));
        assert!(!Completed.can_transition_to(Cancelled));
    }
}
