use backroom_core::{format_price, DashboardSummary, InventoryItem, MenuItem};
use schemars::JsonSchema;

use crate::{
    DishDescription, DishRequest, PriceRequest, PriceSuggestion, RecipeRequest, RecipeSuggestion,
    MAX_DESCRIPTION_CHARS,
};

fn schema_of<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schemars::schema_for!(T)).unwrap_or_default()
}

fn json_object_rules<T: JsonSchema>() -> String {
    format!(
        "Output ONLY a single JSON object matching this schema, nothing else:\n{}",
        schema_of::<T>()
    )
}

pub fn describe_system() -> String {
    format!(
        "You write menu copy for a small restaurant. Describe the dish so a guest knows \
what arrives on the plate: main ingredients, preparation, texture. Keep it warm and concrete.\n\n\
Do NOT:\n\
- Invent ingredients that were not listed when a list is given\n\
- Use superlatives (\"best\", \"world-famous\") or prices\n\
- Exceed {MAX_DESCRIPTION_CHARS} characters\n\n\
{}",
        json_object_rules::<DishDescription>()
    )
}

pub fn price_system() -> String {
    format!(
        "You advise restaurants on menu pricing. Suggest a menu price for the dish in the \
same currency units as any prices given. When a food cost is known, aim for a food cost \
of 25-35% of the price. Give a plausible range with \"low\" and \"high\" around the suggested \
price and one sentence of rationale.\n\n{}",
        json_object_rules::<PriceSuggestion>()
    )
}

pub fn recipe_system() -> String {
    format!(
        "You are a head chef writing a kitchen recipe card. List every ingredient with its \
amount, then short steps a line cook can follow. Prefer ingredients the kitchen \
already has on hand.\n\n{}",
        json_object_rules::<RecipeSuggestion>()
    )
}

pub fn insights_system() -> String {
    "You review a restaurant's menu and stock for problems worth acting on today.\n\n\
Focus on:\n\
- Dishes whose ingredients are low on stock or missing from inventory\n\
- Prices that look out of line with comparable dishes on the same menu\n\
- Categories with no available dish\n\
- Descriptions that are empty or do not match the listed ingredients\n\n\
Do NOT give generic advice (\"consider a loyalty program\").\n\n\
Output ONLY a JSON array. \
Each item: {\"item\":\"<item-id>\",\"msg\":\"<observation>\",\"sev\":\"i\"|\"w\"}. \
Use \"w\" only when guests or orders are affected today. \
If nothing to report, output []."
        .to_string()
}

fn push_list(out: &mut String, label: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    out.push_str(label);
    out.push_str(": ");
    out.push_str(&values.join(", "));
    out.push('\n');
}

pub fn dish_message(req: &DishRequest) -> String {
    let mut out = format!("Dish: {}\n", req.name.trim());
    if let Some(category) = req.category {
        out.push_str("Category: ");
        out.push_str(category.as_str());
        out.push('\n');
    }
    push_list(&mut out, "Ingredients", &req.ingredients);
    if let Some(style) = req.style.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str("Style: ");
        out.push_str(style);
        out.push('\n');
    }
    out
}

pub fn price_message(req: &PriceRequest) -> String {
    let mut out = format!("Dish: {}\n", req.name.trim());
    if let Some(category) = req.category {
        out.push_str("Category: ");
        out.push_str(category.as_str());
        out.push('\n');
    }
    push_list(&mut out, "Ingredients", &req.ingredients);
    if let Some(cost) = req.food_cost_cents {
        out.push_str("Food cost per portion: ");
        out.push_str(&format_price(cost));
        out.push('\n');
    }
    if let Some(current) = req.current_price_cents {
        out.push_str("Current price: ");
        out.push_str(&format_price(current));
        out.push('\n');
    }
    out
}

pub fn recipe_message(req: &RecipeRequest) -> String {
    let mut out = format!("Dish: {}\n", req.dish.trim());
    out.push_str(&format!("Servings: {}\n", req.servings.unwrap_or(4)));
    push_list(&mut out, "On hand", &req.available_ingredients);
    out
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Compact text form of a tenant's menu and stock for model consumption.
pub fn serialize_menu(
    menu: &[MenuItem],
    inventory: &[InventoryItem],
    summary: Option<&DashboardSummary>,
) -> String {
    let mut out = String::with_capacity(2048);

    out.push_str("MENU:\n");
    for item in menu {
        out.push_str(&item.id);
        out.push_str(" \"");
        out.push_str(&item.name);
        out.push_str("\" (");
        out.push_str(item.category.as_str());
        if !item.available {
            out.push_str(",unavailable");
        }
        out.push_str(") ");
        out.push_str(&format_price(item.price_cents));
        if !item.ingredients.is_empty() {
            out.push_str(" with=");
            out.push_str(&item.ingredients.join("|"));
        }
        if !item.description.is_empty() {
            out.push_str(" | \"");
            out.push_str(&truncate(&item.description, 80));
            out.push('"');
        }
        out.push('\n');
    }

    if !inventory.is_empty() {
        out.push_str("STOCK:\n");
        for stock in inventory {
            out.push_str(&format!(
                "{} \"{}\" {} {}",
                stock.id, stock.name, stock.quantity, stock.unit
            ));
            if stock.is_low() {
                out.push_str(" LOW");
            }
            out.push('\n');
        }
    }

    if let Some(summary) = summary {
        out.push_str(&format!(
            "TODAY {}: {} orders, {} open\n",
            summary.day, summary.orders_today, summary.open_orders
        ));
    }

    out
}
