//! Inventory order workflow library
//!
//! Orders own line items whose prices are captured at creation. An order's
//! total always equals the sum of its active items, and removing an item
//! deactivates it and recalculates the total in the same transaction.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod money;
pub mod pagination;
pub mod repositories;
pub mod services;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use repositories::UserRepository;
use services::OrderWorkflowService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        Self {
            db,
            config,
            event_sender,
        }
    }

    pub fn user_repository(&self) -> UserRepository {
        UserRepository::new(self.db.clone())
    }

    pub fn order_workflow(&self) -> OrderWorkflowService {
        OrderWorkflowService::new(
            self.db.clone(),
            Arc::new(self.user_repository()),
            self.event_sender.clone(),
        )
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl From<&errors::ServiceError> for ApiResponse<()> {
    fn from(err: &errors::ServiceError) -> Self {
        ApiResponse::error(err.response_message())
    }
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::errors::ServiceError;
    pub use crate::money::Money;
    pub use crate::pagination::{Page, PageQuery};
    pub use crate::repositories::{Identity, OrderGateway, UserResolver};
    pub use crate::services::orders::{
        CreateOrderItemRequest, CreateOrderRequest, OrderWorkflowService,
        UpdateOrderStatusRequest,
    };
    pub use crate::ApiResponse;
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_carries_message_and_timestamp() {
        let response = ApiResponse::success(3).with_message("Order created successfully");
        assert!(response.success);
        assert_eq!(response.data, Some(3));
        assert_eq!(response.message.as_deref(), Some("Order created successfully"));
        DateTime::parse_from_rfc3339(&response.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn payload_free_success_omits_data() {
        let json = serde_json::to_value(ApiResponse::ok("Deleted successfully")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn error_response_hides_persistence_details() {
        let err = errors::ServiceError::DatabaseError(sea_orm::DbErr::Custom(
            "relation \"orders\" does not exist".into(),
        ));
        let response = ApiResponse::from(&err);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("Database error"));
    }
}
