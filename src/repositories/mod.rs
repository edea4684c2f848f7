//! Persistence gateways consumed by the order workflow.

pub mod order_repository;
pub mod user_repository;

pub use order_repository::{OrderGateway, OrderItemView, OrderRepository};
pub use user_repository::{Identity, NewUser, UserRepository, UserResolver};
