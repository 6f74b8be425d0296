use backroom_core::MenuItem;
use serde::de::DeserializeOwned;

use crate::{InsightSeverity, MenuInsight, SuggestError};

#[derive(serde::Deserialize)]
struct LlmInsight {
    item: String,
    msg: String,
    sev: Option<String>,
}

/// Slice from the first `open` to the last `close`, the usual shape of a JSON
/// value wrapped in chatter or code fences.
fn extract_between(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Decode the single JSON object in raw model output.
pub fn decode_object<T: DeserializeOwned>(raw: &str) -> Result<T, SuggestError> {
    let json = extract_between(raw, '{', '}')
        .ok_or_else(|| SuggestError::InvalidOutput("no JSON object in model output".to_string()))?;
    serde_json::from_str(json).map_err(|e| SuggestError::InvalidOutput(format!("decode: {e}")))
}

/// Decode every top-level object of a malformed JSON array that still parses on
/// its own, skipping the rest.
fn parse_object_by_object<T: DeserializeOwned>(json_str: &str) -> Vec<T> {
    let trimmed = json_str.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in inner.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(value) = serde_json::from_str::<T>(&inner[s..=i]) {
                            out.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    out
}

/// Match an item reference from model output to a menu item id: id first,
/// then exact name, case-insensitive name, then substring either way.
fn resolve_item_id(reference: &str, menu: &[MenuItem]) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if menu.iter().any(|i| i.id == reference) {
        return Some(reference.to_string());
    }
    if let Some(item) = menu.iter().find(|i| i.name == reference) {
        return Some(item.id.clone());
    }

    let lower = reference.to_lowercase();
    if let Some(item) = menu.iter().find(|i| i.name.to_lowercase() == lower) {
        return Some(item.id.clone());
    }
    menu.iter()
        .find(|i| {
            let name = i.name.to_lowercase();
            name.contains(&lower) || lower.contains(&name)
        })
        .map(|i| i.id.clone())
}

fn map_severity(sev: Option<&str>) -> InsightSeverity {
    match sev {
        Some("w") | Some("warning") => InsightSeverity::Warning,
        _ => InsightSeverity::Info,
    }
}

/// Parse insights output, dropping entries that reference no known item.
/// Returns an empty vec when nothing can be recovered.
pub fn parse_insights(raw: &str, menu: &[MenuItem]) -> Vec<MenuInsight> {
    let Some(json_str) = extract_between(raw, '[', ']') else {
        return vec![];
    };

    let parsed: Vec<LlmInsight> = match serde_json::from_str(json_str) {
        Ok(all) => all,
        Err(_) => parse_object_by_object(json_str),
    };

    parsed
        .into_iter()
        .filter_map(|raw| {
            let item_id = resolve_item_id(&raw.item, menu)?;
            Some(MenuInsight {
                item_id,
                message: raw.msg,
                severity: map_severity(raw.sev.as_deref()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DishDescription;
    use backroom_core::MenuCategory;

    fn menu() -> Vec<MenuItem> {
        let mut pizza = MenuItem::new("Margherita Pizza", MenuCategory::Main, 1100);
        pizza.id = "item-1".into();
        let mut soda = MenuItem::new("Lemon Soda", MenuCategory::Drink, 350);
        soda.id = "item-2".into();
        vec![pizza, soda]
    }

    #[test]
    fn objects_are_found_inside_chatter() {
        let raw = "Sure! ```json\n{\"description\": \"Crisp crust {wood-fired}.\"}\n```";
        let out: DishDescription = decode_object(raw).unwrap();
        assert_eq!(out.description, "Crisp crust {wood-fired}.");
        assert!(matches!(
            decode_object::<DishDescription>("no json here"),
            Err(SuggestError::InvalidOutput(_))
        ));
    }

    #[test]
    fn references_resolve_by_id_then_name() {
        let menu = menu();
        assert_eq!(resolve_item_id("item-2", &menu).as_deref(), Some("item-2"));
        assert_eq!(resolve_item_id("Margherita Pizza", &menu).as_deref(), Some("item-1"));
        assert_eq!(resolve_item_id("lemon soda", &menu).as_deref(), Some("item-2"));
        assert_eq!(resolve_item_id("margherita", &menu).as_deref(), Some("item-1"));
        assert_eq!(resolve_item_id("Tiramisu", &menu), None);
        assert_eq!(resolve_item_id("  ", &menu), None);
    }

    #[test]
    fn broken_arrays_are_salvaged() {
        let raw = r#"[
            {"item":"item-1","msg":"Mozzarella is low {2 kg}","sev":"w"},
            {"item":"item-2","msg": oops},
            {"item":"Lemon Soda","msg":"Price is below other drinks","sev":"i"}
        ]"#;
        let insights = parse_insights(raw, &menu());
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].item_id, "item-1");
        assert_eq!(insights[0].message, "Mozzarella is low {2 kg}");
        assert_eq!(insights[0].severity, InsightSeverity::Warning);
        assert_eq!(insights[1].item_id, "item-2");
        assert_eq!(insights[1].severity, InsightSeverity::Info);
    }

    #[test]
    fn unknown_items_and_garbage_yield_nothing() {
        assert!(parse_insights("[]", &menu()).is_empty());
        assert!(parse_insights("I have no comments.", &menu()).is_empty());
        let raw = r#"[{"item":"item-99","msg":"ghost dish"}]"#;
        assert!(parse_insights(raw, &menu()).is_empty());
    }
}
