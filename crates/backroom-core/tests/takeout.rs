mod common;

use std::sync::Arc;
use std::time::Duration;

use backroom_core::{
    summarize, Inventory, InventoryItem, LineRequest, MemoryStore, MenuCatalog, MenuCategory,
    MenuItem, OrderError, OrderStatus, RetryPolicy, SequenceCounter, SequenceError, TakeoutDesk,
    TenantScope,
};
use common::{day, init_tracing, FlakyStore, ManualClock};

fn scope() -> TenantScope {
    TenantScope::parse("r1", "prod").unwrap()
}

fn line(id: &str, quantity: u32) -> LineRequest {
    LineRequest {
        menu_item_id: id.to_string(),
        quantity,
    }
}

async fn seeded_menu(store: Arc<MemoryStore>) -> MenuCatalog<MemoryStore> {
    let menu = MenuCatalog::new(store);
    menu.create(&scope(), MenuItem::new("Margherita", MenuCategory::Main, 1100))
        .await
        .unwrap();
    menu.create(&scope(), MenuItem::new("Lemonade", MenuCategory::Drink, 350))
        .await
        .unwrap();
    let mut special = MenuItem::new("Truffle risotto", MenuCategory::Special, 2400);
    special.available = false;
    menu.create(&scope(), special).await.unwrap();
    menu
}

fn desk_on(
    store: Arc<MemoryStore>,
) -> TakeoutDesk<MemoryStore, Arc<ManualClock>> {
    let clock = Arc::new(ManualClock::new(day(2024, 7, 26)));
    TakeoutDesk::new(store.clone()).with_counter(SequenceCounter::new(store).with_clock(clock))
}

#[tokio::test]
async fn orders_get_sequential_display_ids() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    seeded_menu(store.clone()).await;
    let desk = desk_on(store);

    let first = desk
        .create(&scope(), "Ada", &[line("item-1", 2), line("item-2", 1)])
        .await
        .unwrap();
    assert_eq!(first.id, "order-1");
    assert_eq!(first.display_id, "00001-20240726");
    assert_eq!(first.total_cents, 2 * 1100 + 350);
    assert_eq!(first.status, OrderStatus::Open);
    assert_eq!(first.lines[0].name, "Margherita");

    let second = desk.create(&scope(), "Grace", &[line("item-2", 3)]).await.unwrap();
    assert_eq!(second.id, "order-2");
    assert_eq!(second.display_id, "00002-20240726");
}

#[tokio::test]
async fn rejected_orders_do_not_consume_display_ids() {
    let store = Arc::new(MemoryStore::new());
    seeded_menu(store.clone()).await;
    let desk = desk_on(store);

    for (customer, lines) in [
        ("Ada", vec![line("item-3", 1)]),
        ("Ada", vec![line("item-99", 1)]),
        ("Ada", vec![line("item-1", 0)]),
        ("Ada", vec![]),
        ("  ", vec![line("item-1", 1)]),
    ] {
        let err = desk.create(&scope(), customer, &lines).await.unwrap_err();
        assert!(matches!(err, OrderError::Invalid(_)), "unexpected {err}");
    }

    let today = desk.counter().today();
    assert_eq!(desk.counter().current(&scope(), today).await.unwrap(), None);
    let order = desk.create(&scope(), "Ada", &[line("item-1", 1)]).await.unwrap();
    assert_eq!(order.display_id, "00001-20240726");
}

#[tokio::test]
async fn oversized_totals_are_rejected_before_numbering() {
    let store = Arc::new(MemoryStore::new());
    let menu = seeded_menu(store.clone()).await;
    let banquet = menu
        .create(&scope(), MenuItem::new("Banquet", MenuCategory::Special, u64::MAX / 2))
        .await
        .unwrap();
    let desk = desk_on(store);

    for lines in [
        vec![line(&banquet.id, 3)],
        vec![line(&banquet.id, 2), line(&banquet.id, 2)],
        vec![line(&banquet.id, 2), line("item-1", 1)],
    ] {
        let err = desk.create(&scope(), "Ada", &lines).await.unwrap_err();
        assert!(
            matches!(&err, OrderError::Invalid(msg) if msg.contains("overflows")),
            "unexpected {err}"
        );
    }

    let today = desk.counter().today();
    assert_eq!(desk.counter().current(&scope(), today).await.unwrap(), None);
    let order = desk.create(&scope(), "Ada", &[line(&banquet.id, 2)]).await.unwrap();
    assert_eq!(order.total_cents, (u64::MAX / 2) * 2);
    assert_eq!(order.display_id, "00001-20240726");
}

#[tokio::test]
async fn no_display_id_means_no_order() {
    init_tracing();
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    MenuCatalog::new(store.clone())
        .create(&scope(), MenuItem::new("Soup", MenuCategory::Starter, 600))
        .await
        .unwrap();

    let counter = SequenceCounter::new(store.clone()).with_retry_policy(RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
    });
    let desk = TakeoutDesk::new(store.clone()).with_counter(counter);

    store.fail_next(2);
    let err = desk.create(&scope(), "Ada", &[line("item-1", 1)]).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::Sequence(SequenceError::SequenceUnavailable { .. })
    ));
    assert!(desk.list(&scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn status_follows_the_kitchen_flow() {
    let store = Arc::new(MemoryStore::new());
    seeded_menu(store.clone()).await;
    let desk = desk_on(store);
    let order = desk.create(&scope(), "Ada", &[line("item-1", 1)]).await.unwrap();

    let err = desk
        .set_status(&scope(), &order.id, OrderStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Transition {
            from: OrderStatus::Open,
            to: OrderStatus::Completed
        }
    ));

    desk.set_status(&scope(), &order.id, OrderStatus::Ready).await.unwrap();
    let done = desk
        .set_status(&scope(), &order.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(desk.list_open(&scope()).await.unwrap().is_empty());
    assert_eq!(desk.get(&scope(), &order.id).await.unwrap().status, OrderStatus::Completed);
}

#[tokio::test]
async fn dashboard_summarizes_the_day() {
    let store = Arc::new(MemoryStore::new());
    let menu = seeded_menu(store.clone()).await;
    let inventory = Inventory::new(store.clone());
    let mut mozzarella = InventoryItem::new("Mozzarella", "kg", 1.0);
    mozzarella.reorder_level = 2.0;
    inventory.create(&scope(), mozzarella).await.unwrap();
    inventory
        .create(&scope(), InventoryItem::new("Flour", "kg", 25.0))
        .await
        .unwrap();

    let desk = desk_on(store);
    let first = desk.create(&scope(), "Ada", &[line("item-1", 1)]).await.unwrap();
    desk.create(&scope(), "Grace", &[line("item-2", 2)]).await.unwrap();
    desk.set_status(&scope(), &first.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let summary = summarize(&menu, &inventory, &desk, &scope()).await.unwrap();
    assert_eq!(summary.day, "20240726");
    assert_eq!(summary.menu_items, 3);
    assert_eq!(summary.unavailable_items, vec!["Truffle risotto"]);
    assert_eq!(summary.low_stock, vec!["Mozzarella"]);
    assert_eq!(summary.open_orders, 1);
    assert_eq!(summary.orders_today, 2);
}
