#![allow(dead_code)]

use std::sync::Arc;

use inventory_system::{
    config::AppConfig,
    db,
    entities::{order, order_item, user, UserModel, UserRole},
    events::{Event, EventSender},
    repositories::{Identity, NewUser},
    services::orders::{CreateOrderItemRequest, CreateOrderRequest, OrderDetailsResponse},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Schema};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Application state over a throwaway SQLite file whose schema is built from
/// the entity definitions.
pub struct TestApp {
    pub state: AppState,
    events: mpsc::Receiver<Event>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir for test database");
        let db_path = dir.path().join("inventory_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test".to_string(),
        );
        // Writes inside a transaction must not wait on a second pooled connection.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        create_schema(&pool).await;

        let (event_sender, events) = EventSender::channel(64);
        let state = AppState::new(Arc::new(pool), cfg, Some(Arc::new(event_sender)));

        Self {
            state,
            events,
            _dir: dir,
        }
    }

    pub async fn seed_user(&self, username: &str) -> UserModel {
        self.state
            .user_repository()
            .create_user(NewUser {
                username: username.to_string(),
                full_name: format!("{} Tester", username),
                email: format!("{}@example.com", username),
                role: UserRole::Employee,
            })
            .await
            .expect("failed to seed user")
    }

    /// Places an order for `username` from `(product_id, quantity, price)` triples.
    pub async fn place_order(
        &self,
        username: &str,
        items: &[(i32, i32, Decimal)],
    ) -> OrderDetailsResponse {
        self.state
            .order_workflow()
            .create_order(&Identity::new(username), order_request(items))
            .await
            .expect("failed to place order")
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count orders")
    }

    pub async fn order_item_count(&self) -> u64 {
        order_item::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count order items")
    }

    /// Events published so far, without waiting for more.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn order_request(items: &[(i32, i32, Decimal)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .iter()
            .map(|&(product_id, quantity, price)| CreateOrderItemRequest {
                product_id,
                quantity,
                price,
            })
            .collect(),
    }
}

async fn create_schema(pool: &db::DbPool) {
    let backend = pool.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
    ];
    for stmt in statements {
        pool.execute(backend.build(&stmt))
            .await
            .expect("failed to create test table");
    }
}
