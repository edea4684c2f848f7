//! Listing tests: a user's orders and active order items, paginated.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use inventory_system::{
    errors::ServiceError, pagination::PageQuery, repositories::Identity,
};
use rstest::rstest;
use rust_decimal_macros::dec;

#[tokio::test]
async fn user_without_orders_gets_an_empty_page() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let page = app
        .state
        .order_workflow()
        .list_orders_for_user(&Identity::new("alice"), PageQuery::new(10, 1))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.total_pages, 0);
    assert_eq!(page.message, "Data is not found");
}

#[tokio::test]
async fn orders_are_paginated_newest_first() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    let mut ids = Vec::new();
    for product_id in 1..=3 {
        let created = app.place_order("alice", &[(product_id, 1, dec!(1.00))]).await;
        ids.push(created.order.id);
    }
    let workflow = app.state.order_workflow();
    let alice = Identity::new("alice");

    let first = workflow
        .list_orders_for_user(&alice, PageQuery::new(2, 1))
        .await
        .unwrap();
    assert_eq!(first.total_count, 3);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.message, "Data is found");
    let first_ids: Vec<i32> = first.items.iter().map(|o| o.id).collect();
    assert_eq!(first_ids, vec![ids[2], ids[1]]);

    let second = workflow
        .list_orders_for_user(&alice, PageQuery::new(2, 2))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, ids[0]);
    assert_eq!(second.page, 2);

    let beyond = workflow
        .list_orders_for_user(&alice, PageQuery::new(2, 3))
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 3);
}

#[tokio::test]
async fn page_zero_reads_as_the_first_page() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.place_order("alice", &[(1, 1, dec!(1.00))]).await;

    let page = app
        .state
        .order_workflow()
        .list_orders_for_user(&Identity::new("alice"), PageQuery::new(5, 0))
        .await
        .unwrap();

    assert_eq!(page.page, 1);
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn listings_only_show_the_callers_rows() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;
    app.place_order("alice", &[(1, 1, dec!(1.00))]).await;
    let bobs = app.place_order("bob", &[(2, 3, dec!(2.00))]).await;
    let workflow = app.state.order_workflow();

    let orders = workflow
        .list_orders_for_user(&Identity::new("bob"), PageQuery::new(10, 1))
        .await
        .unwrap();
    assert_eq!(orders.total_count, 1);
    assert_eq!(orders.items[0].id, bobs.order.id);

    let items = workflow
        .list_order_items_for_user(&Identity::new("bob"), PageQuery::new(10, 1))
        .await
        .unwrap();
    assert_eq!(items.total_count, 1);
    assert_eq!(items.items[0].order_id, bobs.order.id);
}

#[tokio::test]
async fn item_listing_skips_removed_items_and_carries_the_order_total() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    let created = app
        .place_order("alice", &[(11, 2, dec!(10.00)), (12, 1, dec!(5.50))])
        .await;
    let workflow = app.state.order_workflow();
    workflow
        .remove_order_item(created.items[0].id)
        .await
        .unwrap();

    let page = workflow
        .list_order_items_for_user(&Identity::new("alice"), PageQuery::new(10, 1))
        .await
        .unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.total_pages, 1);
    let row = &page.items[0];
    assert_eq!(row.order_item_id, created.items[1].id);
    assert_eq!(row.product_id, 12);
    assert_eq!(row.price.to_string(), "5.50");
    assert_eq!(row.order_total_amount.to_string(), "5.50");
}

#[tokio::test]
async fn listing_for_unknown_user_is_not_found() {
    let app = TestApp::new().await;

    let result = app
        .state
        .order_workflow()
        .list_orders_for_user(&Identity::new("ghost"), PageQuery::new(10, 1))
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[rstest]
#[case(0, 1)]
#[case(101, 1)]
#[case(10, -2)]
#[tokio::test]
async fn out_of_range_pages_are_rejected(#[case] size: u32, #[case] page_no: i32) {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    let workflow = app.state.order_workflow();
    let alice = Identity::new("alice");

    assert_matches!(
        workflow
            .list_orders_for_user(&alice, PageQuery::new(size, page_no))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        workflow
            .list_order_items_for_user(&alice, PageQuery::new(size, page_no))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}
