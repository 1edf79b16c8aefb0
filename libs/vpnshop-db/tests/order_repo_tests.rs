use vpnshop_db::StoreError;
use vpnshop_db::db::init_memory_db;
use vpnshop_db::models::order::{NewOrder, OrderStatus, StatusUpdate};
use vpnshop_db::repositories::{OrderRepository, UserRepository};

fn new_order(order_id: &str, owner_id: i64) -> NewOrder {
    NewOrder {
        order_id: order_id.to_string(),
        owner_id,
        amount: 100,
        currency: "RUB".to_string(),
        description: Some("VPN 30 days".to_string()),
        fulfillment_token: uuid::Uuid::new_v4().to_string(),
    }
}

async fn repo() -> OrderRepository {
    let pool = init_memory_db().await.expect("in-memory db");
    OrderRepository::new(pool)
}

#[tokio::test]
async fn create_inserts_pending_order() {
    let repo = repo().await;
    let order = repo.create(&new_order("vpn_42_1000", 42)).await.unwrap();

    assert_eq!(order.order_id, "vpn_42_1000");
    assert_eq!(order.owner_id, 42);
    assert_eq!(order.amount, 100);
    assert_eq!(order.currency, "RUB");
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.completed_at.is_none());
    assert!(order.external_transaction_id.is_none());

    let fetched = repo.get_by_fulfillment_token(&order.fulfillment_token).await.unwrap();
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn duplicate_order_id_is_rejected_and_store_unchanged() {
    let repo = repo().await;
    let first = repo.create(&new_order("vpn_42_1000", 42)).await.unwrap();

    let mut dup = new_order("vpn_42_1000", 7);
    dup.amount = 999;
    let err = repo.create(&dup).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateOrder(ref id) if id == "vpn_42_1000"));

    let stored = repo.get_by_order_id("vpn_42_1000").await.unwrap();
    assert_eq!(stored, first);
    assert_eq!(repo.totals().await.unwrap().orders, 1);
    assert!(matches!(
        repo.get_by_fulfillment_token(&dup.fulfillment_token).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn lookups_report_not_found() {
    let repo = repo().await;
    assert!(matches!(repo.get_by_order_id("missing").await, Err(StoreError::NotFound)));
    assert!(matches!(repo.get_by_fulfillment_token("missing").await, Err(StoreError::NotFound)));
    assert!(matches!(
        repo.update_status("missing", OrderStatus::Success, None).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn terminal_transition_sets_completed_at_once() {
    let repo = repo().await;
    repo.create(&new_order("vpn_1_1", 1)).await.unwrap();

    let first = repo.update_status("vpn_1_1", OrderStatus::Success, Some("tx-9")).await.unwrap();
    let StatusUpdate::Applied(applied) = first else {
        panic!("expected Applied, got {:?}", first);
    };
    assert_eq!(applied.status, OrderStatus::Success);
    assert_eq!(applied.external_transaction_id.as_deref(), Some("tx-9"));
    assert!(applied.completed_at.is_some());

    let second = repo.update_status("vpn_1_1", OrderStatus::Success, Some("tx-9")).await.unwrap();
    assert_eq!(second, StatusUpdate::Unchanged(applied.clone()));
    assert_eq!(repo.get_by_order_id("vpn_1_1").await.unwrap(), applied);
}

#[tokio::test]
async fn terminal_state_is_never_left() {
    let repo = repo().await;
    repo.create(&new_order("vpn_1_2", 1)).await.unwrap();
    repo.update_status("vpn_1_2", OrderStatus::Success, None).await.unwrap();

    let result = repo.update_status("vpn_1_2", OrderStatus::Failed, Some("tx-other")).await.unwrap();
    let StatusUpdate::Rejected(current) = result else {
        panic!("expected Rejected, got {:?}", result);
    };
    assert_eq!(current.status, OrderStatus::Success);
    assert!(current.external_transaction_id.is_none());
}

#[tokio::test]
async fn pending_write_records_transaction_id_without_completing() {
    let repo = repo().await;
    repo.create(&new_order("vpn_1_3", 1)).await.unwrap();

    let update = repo.update_status("vpn_1_3", OrderStatus::Pending, Some("tx-1")).await.unwrap();
    let order = update.into_order();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.external_transaction_id.as_deref(), Some("tx-1"));
    assert!(order.completed_at.is_none());

    // A later write without an id keeps the recorded one.
    let order = repo
        .update_status("vpn_1_3", OrderStatus::Failed, None)
        .await
        .unwrap()
        .into_order();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.external_transaction_id.as_deref(), Some("tx-1"));
}

#[tokio::test]
async fn summaries_count_only_successful_income() {
    let repo = repo().await;
    repo.create(&new_order("vpn_5_1", 5)).await.unwrap();
    repo.create(&new_order("vpn_5_2", 5)).await.unwrap();
    repo.create(&new_order("vpn_6_1", 6)).await.unwrap();
    repo.update_status("vpn_5_1", OrderStatus::Success, None).await.unwrap();
    repo.update_status("vpn_6_1", OrderStatus::Failed, None).await.unwrap();

    let owner = repo.owner_summary(5).await.unwrap();
    assert_eq!(owner.total, 2);
    assert_eq!(owner.successful, 1);

    let empty = repo.owner_summary(99).await.unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.successful, 0);

    let totals = repo.totals().await.unwrap();
    assert_eq!(totals.orders, 3);
    assert_eq!(totals.successful, 1);
    assert_eq!(totals.income, 100);

    let listed = repo.list_for_owner(5, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].order_id, "vpn_5_2");
    assert_eq!(repo.recent(1).await.unwrap()[0].order_id, "vpn_6_1");
}

#[tokio::test]
async fn user_upsert_keeps_known_names() {
    let pool = init_memory_db().await.unwrap();
    let users = UserRepository::new(pool);

    let created = users.upsert(42, Some("alice"), Some("Alice")).await.unwrap();
    let refreshed = users.upsert(42, None, Some("Alicia")).await.unwrap();

    assert_eq!(created.id, refreshed.id);
    assert_eq!(refreshed.username.as_deref(), Some("alice"));
    assert_eq!(refreshed.display_name(), Some("Alicia"));
    assert_eq!(users.count().await.unwrap(), 1);
    assert!(users.get_by_telegram_id(7).await.unwrap().is_none());

    users.upsert(7, Some("bob"), None).await.unwrap();
    let recent = users.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].telegram_id, 7);
}
