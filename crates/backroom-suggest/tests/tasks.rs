use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use backroom_core::{InventoryItem, MenuCategory, MenuItem};
use backroom_suggest::{
    describe_dish, menu_insights, suggest_price, suggest_recipe, DishRequest, InsightSeverity,
    PriceRequest, RecipeRequest, SuggestError, TextGenerator,
};

/// Replays canned replies in order and records the prompts it was given.
#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            ..Default::default()
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_user(&self) -> String {
        self.prompts.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, system: &str, user: &str) -> Result<String, SuggestError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(SuggestError::Backend(e)),
            None => Err(SuggestError::Backend("script exhausted".to_string())),
        }
    }
}

fn dish(name: &str) -> DishRequest {
    DishRequest {
        name: name.to_string(),
        category: Some(MenuCategory::Main),
        ingredients: vec!["tomato".into(), "basil".into()],
        style: Some("rustic".into()),
    }
}

fn price(name: &str) -> PriceRequest {
    PriceRequest {
        name: name.to_string(),
        category: None,
        ingredients: vec![],
        food_cost_cents: Some(320),
        current_price_cents: None,
    }
}

#[tokio::test]
async fn describe_dish_trims_and_checks_length() {
    let gen = Scripted::replying(&[
        "{\"description\": \"  Slow-cooked tomato with torn basil.  \"}",
        &format!("{{\"description\": \"{}\"}}", "a".repeat(401)),
        "{\"description\": \"   \"}",
    ]);
    let out = describe_dish(&gen, &dish("Pomodoro")).await.unwrap();
    assert_eq!(out.description, "Slow-cooked tomato with torn basil.");
    assert!(gen.last_user().contains("Ingredients: tomato, basil"));
    assert!(gen.last_user().contains("Style: rustic"));

    for _ in 0..2 {
        let err = describe_dish(&gen, &dish("Pomodoro")).await.unwrap_err();
        assert!(matches!(err, SuggestError::InvalidOutput(_)));
    }
}

#[tokio::test]
async fn blank_requests_never_reach_the_backend() {
    let gen = Scripted::replying(&[]);
    assert!(matches!(
        describe_dish(&gen, &dish(" ")).await,
        Err(SuggestError::InvalidInput(_))
    ));
    assert!(matches!(
        suggest_price(&gen, &price("")).await,
        Err(SuggestError::InvalidInput(_))
    ));
    let recipe = RecipeRequest {
        dish: "Risotto".into(),
        available_ingredients: vec![],
        servings: Some(0),
    };
    assert!(matches!(
        suggest_recipe(&gen, &recipe).await,
        Err(SuggestError::InvalidInput(_))
    ));
    assert_eq!(gen.calls(), 0);
}

#[tokio::test]
async fn prices_must_be_positive_and_inside_their_range() {
    let gen = Scripted::replying(&[
        r#"{"price": 12.5, "low": 11.0, "high": 14.0, "rationale": "28% food cost"}"#,
        r#"{"price": 0, "rationale": "free"}"#,
        r#"{"price": 20.0, "low": 11.0, "high": 14.0}"#,
        r#"{"cost": 3}"#,
    ]);
    let ok = suggest_price(&gen, &price("Lasagne")).await.unwrap();
    assert_eq!(ok.price_cents(), 1250);
    assert!(gen.last_user().contains("Food cost per portion: 3.20"));

    for _ in 0..3 {
        let err = suggest_price(&gen, &price("Lasagne")).await.unwrap_err();
        assert!(matches!(err, SuggestError::InvalidOutput(_)), "got {err}");
    }
}

#[tokio::test]
async fn recipes_need_ingredients_and_steps() {
    let req = RecipeRequest {
        dish: "Mushroom risotto".into(),
        available_ingredients: vec!["arborio rice".into()],
        servings: None,
    };
    let gen = Scripted::replying(&[
        r#"{"name":"Mushroom risotto","ingredients":["320 g arborio rice","250 g mushrooms"],"steps":["Toast the rice.","Add stock gradually."]}"#,
        r#"{"name":"Mushroom risotto","ingredients":[],"steps":["Stir."]}"#,
    ]);
    let recipe = suggest_recipe(&gen, &req).await.unwrap();
    assert_eq!(recipe.steps.len(), 2);
    assert!(gen.last_user().contains("Servings: 4"));

    assert!(matches!(
        suggest_recipe(&gen, &req).await,
        Err(SuggestError::InvalidOutput(_))
    ));
}

#[tokio::test]
async fn backend_errors_surface_for_single_tasks() {
    let gen = Scripted::failing("rate limited");
    let err = describe_dish(&gen, &dish("Pomodoro")).await.unwrap_err();
    assert!(matches!(err, SuggestError::Backend(ref m) if m == "rate limited"));
}

fn menu() -> Vec<MenuItem> {
    let mut pizza = MenuItem::new("Margherita", MenuCategory::Main, 1100)
        .with_ingredients(["mozzarella", "tomato"]);
    pizza.id = "item-1".into();
    vec![pizza]
}

#[tokio::test]
async fn insights_resolve_items_and_degrade_quietly() {
    let mut cheese = InventoryItem::new("Mozzarella", "kg", 0.5);
    cheese.id = "stock-1".into();
    cheese.reorder_level = 2.0;

    let gen = Scripted::replying(&[
        r#"Here you go: [{"item":"margherita","msg":"Mozzarella is nearly out","sev":"w"}]"#,
    ]);
    let insights = menu_insights(&gen, &menu(), &[cheese], None).await;
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].item_id, "item-1");
    assert_eq!(insights[0].severity, InsightSeverity::Warning);
    assert!(gen.last_user().contains("LOW"));

    let down = Scripted::failing("timeout");
    assert!(menu_insights(&down, &menu(), &[], None).await.is_empty());

    let idle = Scripted::replying(&[]);
    assert!(menu_insights(&idle, &[], &[], None).await.is_empty());
    assert_eq!(idle.calls(), 0);
}
