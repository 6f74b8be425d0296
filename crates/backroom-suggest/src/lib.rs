pub mod engine;
mod parse;
mod prompt;

use backroom_core::{DashboardSummary, InventoryItem, MenuCategory, MenuItem};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use engine::{LlmEngine, TextGenerator};

pub const MAX_DESCRIPTION_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("no AI provider configured; set provider, model and API key in settings.json")]
    NotConfigured,
    #[error("AI backend failed: {0}")]
    Backend(String),
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("unusable model output: {0}")]
    InvalidOutput(String),
}

// --- Requests ---

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DishRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<MenuCategory>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Tone to write in, e.g. "rustic", "playful"
    #[serde(default)]
    pub style: Option<String>,
}

impl DishRequest {
    pub fn from_item(item: &MenuItem) -> Self {
        Self {
            name: item.name.clone(),
            category: Some(item.category),
            ingredients: item.ingredients.clone(),
            style: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<MenuCategory>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Cost of one portion's ingredients in cents, when known
    #[serde(default)]
    pub food_cost_cents: Option<u64>,
    /// Current price in cents, when already on the menu
    #[serde(default)]
    pub current_price_cents: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRequest {
    pub dish: String,
    /// Ingredients on hand that the recipe should prefer
    #[serde(default)]
    pub available_ingredients: Vec<String>,
    #[serde(default)]
    pub servings: Option<u32>,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DishDescription {
    /// Menu text, at most 400 characters
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestion {
    /// Suggested price in currency units, e.g. 12.5
    pub price: f64,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub rationale: String,
}

impl PriceSuggestion {
    /// The suggested price rounded to whole cents.
    pub fn price_cents(&self) -> u64 {
        (self.price * 100.0).round() as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSuggestion {
    pub name: String,
    /// One entry per ingredient with its amount, e.g. "200 g flour"
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InsightSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MenuInsight {
    pub item_id: String,
    pub message: String,
    pub severity: InsightSeverity,
}

// --- Tasks ---

fn require_name(label: &str, value: &str) -> Result<(), SuggestError> {
    if value.trim().is_empty() {
        return Err(SuggestError::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(())
}

pub async fn describe_dish<G>(gen: &G, req: &DishRequest) -> Result<DishDescription, SuggestError>
where
    G: TextGenerator + ?Sized,
{
    require_name("dish name", &req.name)?;
    let raw = gen
        .generate(&prompt::describe_system(), &prompt::dish_message(req))
        .await?;
    let mut out: DishDescription = parse::decode_object(&raw)?;
    out.description = out.description.trim().to_string();
    let len = out.description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_CHARS {
        return Err(SuggestError::InvalidOutput(format!(
            "description has {len} characters, expected 1 to {MAX_DESCRIPTION_CHARS}"
        )));
    }
    Ok(out)
}

pub async fn suggest_price<G>(gen: &G, req: &PriceRequest) -> Result<PriceSuggestion, SuggestError>
where
    G: TextGenerator + ?Sized,
{
    require_name("dish name", &req.name)?;
    let raw = gen
        .generate(&prompt::price_system(), &prompt::price_message(req))
        .await?;
    let out: PriceSuggestion = parse::decode_object(&raw)?;
    if !out.price.is_finite() || out.price <= 0.0 {
        return Err(SuggestError::InvalidOutput(format!(
            "price {} is not a positive amount",
            out.price
        )));
    }
    let in_range = out.low.map_or(true, |low| low <= out.price)
        && out.high.map_or(true, |high| out.price <= high);
    if !in_range {
        return Err(SuggestError::InvalidOutput(format!(
            "price {} lies outside its own range",
            out.price
        )));
    }
    Ok(out)
}

pub async fn suggest_recipe<G>(
    gen: &G,
    req: &RecipeRequest,
) -> Result<RecipeSuggestion, SuggestError>
where
    G: TextGenerator + ?Sized,
{
    require_name("dish", &req.dish)?;
    if req.servings == Some(0) {
        return Err(SuggestError::InvalidInput("servings must be at least 1".to_string()));
    }
    let raw = gen
        .generate(&prompt::recipe_system(), &prompt::recipe_message(req))
        .await?;
    let out: RecipeSuggestion = parse::decode_object(&raw)?;
    if out.name.trim().is_empty() {
        return Err(SuggestError::InvalidOutput("recipe has no name".to_string()));
    }
    if out.ingredients.iter().all(|i| i.trim().is_empty()) {
        return Err(SuggestError::InvalidOutput("recipe lists no ingredients".to_string()));
    }
    if out.steps.iter().all(|s| s.trim().is_empty()) {
        return Err(SuggestError::InvalidOutput("recipe has no steps".to_string()));
    }
    Ok(out)
}

/// Ask for observations about the menu. Returns an empty list when the backend
/// fails or nothing usable comes back.
pub async fn menu_insights<G>(
    gen: &G,
    menu: &[MenuItem],
    inventory: &[InventoryItem],
    summary: Option<&DashboardSummary>,
) -> Vec<MenuInsight>
where
    G: TextGenerator + ?Sized,
{
    if menu.is_empty() {
        return vec![];
    }
    let user_msg = prompt::serialize_menu(menu, inventory, summary);
    match gen.generate(&prompt::insights_system(), &user_msg).await {
        Ok(raw) => {
            debug!(raw = %raw, "insights output");
            let insights = parse::parse_insights(&raw, menu);
            info!(count = insights.len(), "parsed menu insights");
            insights
        }
        Err(e) => {
            warn!(error = %e, "menu insights unavailable");
            vec![]
        }
    }
}
