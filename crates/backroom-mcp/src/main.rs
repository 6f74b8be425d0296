mod init;

use std::fmt::Display;
use std::sync::Arc;

use backroom_core::{
    read_settings, summarize, FileStore, Inventory, InventoryItem, LineRequest, MenuCatalog,
    MenuItem, OrderStatus, RetryPolicy, SequenceCounter, TakeoutDesk, TenantScope,
};
use backroom_suggest::{DishRequest, LlmEngine, PriceRequest, RecipeRequest, SuggestError};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ScopeRequest {
    /// Tenant (restaurant) identifier, e.g. "r1"
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetMenuItemRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// The menu item. Leave id empty to create a new item ("item-N" is assigned); give an existing id to replace that item.
    item: MenuItem,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ItemRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// ID of the item, e.g. "item-3" or "stock-2"
    item_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetInventoryItemRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// The stock item. Leave id empty to create a new item ("stock-N" is assigned).
    item: InventoryItem,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AdjustStockRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// ID of the stock item, e.g. "stock-2"
    item_id: String,
    /// Amount to add; negative to consume. The result may not drop below zero.
    delta: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct CreateOrderRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// Name the order is called out under
    customer: String,
    /// Ordered menu items with quantities
    lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetOrderStatusRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// ID of the order, e.g. "order-4"
    order_id: String,
    /// New status. Allowed moves: open -> ready -> completed, open/ready -> cancelled
    status: OrderStatus,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListOrdersRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// Only orders that are still open or ready. Default: false
    open_only: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DescribeDishRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// ID of the menu item to describe
    item_id: String,
    /// Tone to write in, e.g. "rustic"
    style: Option<String>,
    /// Store the description on the menu item. Default: false
    save: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SuggestPriceRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// ID of the menu item to price
    item_id: String,
    /// Ingredient cost of one portion in cents, when known
    food_cost_cents: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SuggestRecipeRequest {
    /// Tenant (restaurant) identifier
    tenant: String,
    /// Data partition: "trial" or "prod"
    partition: String,
    /// Dish to write a recipe for
    dish: String,
    /// Number of portions. Default: 4
    servings: Option<u32>,
}

// --- Result helpers ---

fn failure(message: impl Display) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.to_string())])
}

fn json<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => failure(format!("Serialization error: {e}")),
    }
}

fn outcome<T: Serialize, E: Display>(result: Result<T, E>) -> Result<CallToolResult, McpError> {
    Ok(match result {
        Ok(value) => json(&value),
        Err(e) => failure(e),
    })
}

fn engine() -> Result<LlmEngine, SuggestError> {
    LlmEngine::new(read_settings().ai)
}

// --- Server ---

#[derive(Clone)]
pub struct BackroomServer {
    store: Arc<FileStore>,
    retry: RetryPolicy,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BackroomServer {
    pub fn new(store: Arc<FileStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            tool_router: Self::tool_router(),
        }
    }

    fn menu(&self) -> MenuCatalog<FileStore> {
        MenuCatalog::new(Arc::clone(&self.store)).with_retry_policy(self.retry)
    }

    fn inventory(&self) -> Inventory<FileStore> {
        Inventory::new(Arc::clone(&self.store)).with_retry_policy(self.retry)
    }

    fn counter(&self) -> SequenceCounter<FileStore> {
        SequenceCounter::new(Arc::clone(&self.store)).with_retry_policy(self.retry)
    }

    fn desk(&self) -> TakeoutDesk<FileStore> {
        TakeoutDesk::new(Arc::clone(&self.store)).with_counter(self.counter())
    }

    #[tool(
        description = "Issue the next daily sequence id for a tenant, formatted NNNNN-YYYYMMDD (e.g. \"00001-20240726\"). Numbering starts at 00001 each local day and is independent per tenant and partition. Every call consumes a number."
    )]
    async fn next_sequence_id(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .counter()
            .next_sequence_id(&req.tenant, &req.partition)
            .await
        {
            Ok(id) => Ok(CallToolResult::success(vec![Content::text(id)])),
            Err(e) => Ok(failure(e)),
        }
    }

    #[tool(description = "List the menu items of a tenant, ordered by id")]
    async fn list_menu(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(self.menu().list(&scope).await)
    }

    #[tool(
        description = "Create or replace a menu item. Prices are in cents. Returns the stored item including its id."
    )]
    async fn set_menu_item(
        &self,
        Parameters(req): Parameters<SetMenuItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(self.menu().upsert(&scope, req.item).await)
    }

    #[tool(description = "Delete a menu item")]
    async fn delete_menu_item(
        &self,
        Parameters(req): Parameters<ItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        match self.menu().delete(&scope, &req.item_id).await {
            Ok(true) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted {}",
                req.item_id
            ))])),
            Ok(false) => Ok(failure(format!("Menu item '{}' not found", req.item_id))),
            Err(e) => Ok(failure(e)),
        }
    }

    #[tool(description = "List stock items of a tenant with quantities and reorder levels")]
    async fn list_inventory(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(self.inventory().list(&scope).await)
    }

    #[tool(description = "Create or replace a stock item")]
    async fn set_inventory_item(
        &self,
        Parameters(req): Parameters<SetInventoryItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(self.inventory().upsert(&scope, req.item).await)
    }

    #[tool(description = "Delete a stock item")]
    async fn delete_inventory_item(
        &self,
        Parameters(req): Parameters<ItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        match self.inventory().delete(&scope, &req.item_id).await {
            Ok(true) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted {}",
                req.item_id
            ))])),
            Ok(false) => Ok(failure(format!("Stock item '{}' not found", req.item_id))),
            Err(e) => Ok(failure(e)),
        }
    }

    #[tool(
        description = "Add to or remove from a stock item's quantity atomically. Use a negative delta to consume stock."
    )]
    async fn adjust_stock(
        &self,
        Parameters(req): Parameters<AdjustStockRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(
            self.inventory()
                .adjust_stock(&scope, &req.item_id, req.delta)
                .await,
        )
    }

    #[tool(
        description = "Create a takeout order from menu items. The order gets today's next sequence id as its displayId; unavailable items are rejected."
    )]
    async fn create_takeout_order(
        &self,
        Parameters(req): Parameters<CreateOrderRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(self.desk().create(&scope, &req.customer, &req.lines).await)
    }

    #[tool(description = "Move a takeout order to a new status")]
    async fn set_order_status(
        &self,
        Parameters(req): Parameters<SetOrderStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(
            self.desk()
                .set_status(&scope, &req.order_id, req.status)
                .await,
        )
    }

    #[tool(description = "List takeout orders, optionally only those still open")]
    async fn list_orders(
        &self,
        Parameters(req): Parameters<ListOrdersRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        let desk = self.desk();
        if req.open_only.unwrap_or(false) {
            outcome(desk.list_open(&scope).await)
        } else {
            outcome(desk.list(&scope).await)
        }
    }

    #[tool(
        description = "Today's overview: menu size, unavailable dishes, low stock, open orders and how many sequence ids were issued today"
    )]
    async fn dashboard(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        outcome(summarize(&self.menu(), &self.inventory(), &self.desk(), &scope).await)
    }

    #[tool(
        description = "Write menu copy for a dish with the configured AI provider. Set save to store it on the item."
    )]
    async fn describe_dish(
        &self,
        Parameters(req): Parameters<DescribeDishRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        let gen = match engine() {
            Ok(g) => g,
            Err(e) => return Ok(failure(e)),
        };
        let item = match self.menu().get(&scope, &req.item_id).await {
            Ok(item) => item,
            Err(e) => return Ok(failure(e)),
        };
        let mut dish = DishRequest::from_item(&item);
        dish.style = req.style;
        let description = match backroom_suggest::describe_dish(&gen, &dish).await {
            Ok(d) => d,
            Err(e) => return Ok(failure(e)),
        };
        if req.save.unwrap_or(false) {
            return outcome(
                self.menu()
                    .set_description(&scope, &item.id, &description.description)
                    .await,
            );
        }
        Ok(json(&description))
    }

    #[tool(description = "Suggest a menu price for an item with the configured AI provider")]
    async fn suggest_price(
        &self,
        Parameters(req): Parameters<SuggestPriceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        let gen = match engine() {
            Ok(g) => g,
            Err(e) => return Ok(failure(e)),
        };
        let item = match self.menu().get(&scope, &req.item_id).await {
            Ok(item) => item,
            Err(e) => return Ok(failure(e)),
        };
        let price = PriceRequest {
            name: item.name,
            category: Some(item.category),
            ingredients: item.ingredients,
            food_cost_cents: req.food_cost_cents,
            current_price_cents: Some(item.price_cents),
        };
        outcome(backroom_suggest::suggest_price(&gen, &price).await)
    }

    #[tool(
        description = "Draft a recipe card with the configured AI provider, preferring ingredients that are in stock"
    )]
    async fn suggest_recipe(
        &self,
        Parameters(req): Parameters<SuggestRecipeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        let gen = match engine() {
            Ok(g) => g,
            Err(e) => return Ok(failure(e)),
        };
        let on_hand = match self.inventory().list(&scope).await {
            Ok(items) => items
                .into_iter()
                .filter(|i| i.quantity > 0.0)
                .map(|i| i.name)
                .collect(),
            Err(e) => return Ok(failure(e)),
        };
        let recipe = RecipeRequest {
            dish: req.dish,
            available_ingredients: on_hand,
            servings: req.servings,
        };
        outcome(backroom_suggest::suggest_recipe(&gen, &recipe).await)
    }

    #[tool(
        description = "Ask the configured AI provider for concrete observations about the menu and stock. Returns [] when nothing is found or the provider is unreachable."
    )]
    async fn menu_insights(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match TenantScope::parse(&req.tenant, &req.partition) {
            Ok(s) => s,
            Err(e) => return Ok(failure(e)),
        };
        let gen = match engine() {
            Ok(g) => g,
            Err(e) => return Ok(failure(e)),
        };
        let (menu, inventory) = match (
            self.menu().list(&scope).await,
            self.inventory().list(&scope).await,
        ) {
            (Ok(m), Ok(i)) => (m, i),
            (Err(e), _) | (_, Err(e)) => return Ok(failure(e)),
        };
        let summary = summarize(&self.menu(), &self.inventory(), &self.desk(), &scope)
            .await
            .ok();
        let insights =
            backroom_suggest::menu_insights(&gen, &menu, &inventory, summary.as_ref()).await;
        Ok(json(&insights))
    }
}

const INSTRUCTIONS: &str = r#"Backroom manages a restaurant's back office: menu, stock, takeout orders and daily sequence ids.

Every tool takes `tenant` (the restaurant id) and `partition` ("trial" for sandbox data, "prod" for live data). Data never crosses tenants or partitions.

Sequence ids look like "00007-20240726": a five-digit count that restarts at 00001 each day, followed by the date. They are handed out gap-free and never twice, even under concurrent calls. Takeout orders receive one automatically as `displayId`; call `next_sequence_id` only when a number is needed outside an order, since every call consumes one.

Prices are integer cents. Stock quantities are decimal amounts in the item's unit.

The AI tools (describe_dish, suggest_price, suggest_recipe, menu_insights) need a provider configured in settings.json under the Backroom data directory."#;

#[tool_handler]
impl ServerHandler for BackroomServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the MCP protocol
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project();
    }

    init_tracing();
    let settings = read_settings();
    let store = FileStore::open_default();
    info!(root = %store.root().display(), "serving backroom over stdio");

    let service = BackroomServer::new(Arc::new(store), settings.store.retry_policy())
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}
