use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use tracing::error;

use crate::entities::order::{self, ActiveModel as OrderActiveModel, Entity as Order};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItem, OrderItemStatus,
};
use crate::entities::{OrderItemModel, OrderModel};
use crate::errors::ServiceError;
use crate::money::{self, Money};

/// An order item joined with the order that owns it.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct OrderItemView {
    pub order_item_id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: String,
    pub status: OrderItemStatus,
    pub item_created_at: DateTime<Utc>,
    pub item_updated_at: DateTime<Utc>,
    pub order_total_amount: String,
    pub order_created_at: DateTime<Utc>,
    pub order_updated_at: DateTime<Utc>,
}

/// Persistence operations the order workflow depends on.
///
/// Lookups by id fail with [`ServiceError::NotFound`]; every other failure is
/// reported as [`ServiceError::DatabaseError`]. Listings are newest first.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Inserts an `active` order. Pass [`Money::zero`] for an empty order.
    async fn create_order(&self, user_id: i32, total: Money) -> Result<OrderModel, ServiceError>;

    async fn create_order_item(
        &self,
        order_id: i32,
        product_id: i32,
        quantity: i32,
        price: Money,
    ) -> Result<OrderItemModel, ServiceError>;

    async fn get_order(&self, order_id: i32) -> Result<OrderModel, ServiceError>;

    /// Like [`get_order`](Self::get_order), but also takes a row lock held
    /// until the enclosing transaction ends. Outside a transaction this is a
    /// plain read.
    async fn lock_order(&self, order_id: i32) -> Result<OrderModel, ServiceError>;

    async fn get_order_item(&self, order_item_id: i32) -> Result<OrderItemModel, ServiceError>;

    /// Every item of one order in creation order, whatever its status.
    async fn list_items_for_order(&self, order_id: i32)
        -> Result<Vec<OrderItemModel>, ServiceError>;

    async fn update_order_item_status(
        &self,
        order_item_id: i32,
        status: OrderItemStatus,
    ) -> Result<OrderItemModel, ServiceError>;

    /// Recomputes and persists `total_amount` from the order's active items.
    async fn recalculate_order_total(&self, order_id: i32) -> Result<OrderModel, ServiceError>;

    async fn update_order_status(
        &self,
        order_id: i32,
        status: &str,
    ) -> Result<OrderModel, ServiceError>;

    async fn list_orders_by_user(
        &self,
        user_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<OrderModel>, ServiceError>;

    async fn count_orders_by_user(&self, user_id: i32) -> Result<u64, ServiceError>;

    /// Active items across all of the user's orders.
    async fn list_order_items_by_user(
        &self,
        user_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<OrderItemView>, ServiceError>;

    async fn count_active_order_items_by_user(&self, user_id: i32) -> Result<u64, ServiceError>;
}

/// Sea-ORM backed gateway. Works against the pool or an open transaction.
#[derive(Debug)]
pub struct OrderRepository<'c, C> {
    db: &'c C,
}

impl<'c, C> OrderRepository<'c, C>
where
    C: ConnectionTrait,
{
    pub fn new(db: &'c C) -> Self {
        Self { db }
    }
}

/// `SELECT ... FOR UPDATE` on one order. SQLite has no row locks and runs
/// write transactions one at a time, so the clause is dropped there.
fn order_for_update(order_id: i32) -> Select<Order> {
    Order::find_by_id(order_id).lock_exclusive()
}

fn order_not_found(order_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Order {} not found", order_id))
}

fn order_item_not_found(order_item_id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Order item {} not found", order_item_id))
}

fn corrupt_amount(what: &str, id: i32, err: money::MoneyError) -> ServiceError {
    error!(error = %err, id = id, "Stored {} amount is not a valid decimal", what);
    ServiceError::InternalError(format!("stored {} amount for {} is invalid: {}", what, id, err))
}

#[async_trait]
impl<'c, C> OrderGateway for OrderRepository<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create_order(&self, user_id: i32, total: Money) -> Result<OrderModel, ServiceError> {
        let model = OrderActiveModel {
            user_id: Set(user_id),
            total_amount: Set(total.to_string()),
            status: Set(order::INITIAL_STATUS.to_string()),
            ..Default::default()
        };
        Ok(model.insert(self.db).await?)
    }

    async fn create_order_item(
        &self,
        order_id: i32,
        product_id: i32,
        quantity: i32,
        price: Money,
    ) -> Result<OrderItemModel, ServiceError> {
        let model = OrderItemActiveModel {
            order_id: Set(order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price.to_string()),
            status: Set(OrderItemStatus::Active),
            ..Default::default()
        };
        Ok(model.insert(self.db).await?)
    }

    async fn get_order(&self, order_id: i32) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(self.db)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    async fn lock_order(&self, order_id: i32) -> Result<OrderModel, ServiceError> {
        order_for_update(order_id)
            .one(self.db)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    async fn get_order_item(&self, order_item_id: i32) -> Result<OrderItemModel, ServiceError> {
        OrderItem::find_by_id(order_item_id)
            .one(self.db)
            .await?
            .ok_or_else(|| order_item_not_found(order_item_id))
    }

    async fn list_items_for_order(
        &self,
        order_id: i32,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .all(self.db)
            .await?)
    }

    async fn update_order_item_status(
        &self,
        order_item_id: i32,
        status: OrderItemStatus,
    ) -> Result<OrderItemModel, ServiceError> {
        let item = self.get_order_item(order_item_id).await?;
        let mut model: OrderItemActiveModel = item.into();
        model.status = Set(status);
        Ok(model.update(self.db).await?)
    }

    async fn recalculate_order_total(&self, order_id: i32) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;

        let active_items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::Status.eq(OrderItemStatus::Active))
            .all(self.db)
            .await?;

        let mut lines = Vec::with_capacity(active_items.len());
        for item in &active_items {
            let price = item
                .unit_price()
                .map_err(|e| corrupt_amount("order item price", item.id, e))?;
            lines.push((price, item.quantity));
        }
        let total =
            money::order_total(lines).map_err(|e| corrupt_amount("order total", order_id, e))?;

        let mut model: OrderActiveModel = order.into();
        model.total_amount = Set(total.to_string());
        Ok(model.update(self.db).await?)
    }

    async fn update_order_status(
        &self,
        order_id: i32,
        status: &str,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;
        let mut model: OrderActiveModel = order.into();
        model.status = Set(status.to_string());
        Ok(model.update(self.db).await?)
    }

    async fn list_orders_by_user(
        &self,
        user_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db)
            .await?)
    }

    async fn count_orders_by_user(&self, user_id: i32) -> Result<u64, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .count(self.db)
            .await?)
    }

    async fn list_order_items_by_user(
        &self,
        user_id: i32,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<OrderItemView>, ServiceError> {
        Ok(OrderItem::find()
            .select_only()
            .column_as(order_item::Column::Id, "order_item_id")
            .column_as(order_item::Column::OrderId, "order_id")
            .column_as(order_item::Column::ProductId, "product_id")
            .column_as(order_item::Column::Quantity, "quantity")
            .column_as(order_item::Column::Price, "price")
            .column_as(order_item::Column::Status, "status")
            .column_as(order_item::Column::CreatedAt, "item_created_at")
            .column_as(order_item::Column::UpdatedAt, "item_updated_at")
            .column_as(order::Column::TotalAmount, "order_total_amount")
            .column_as(order::Column::CreatedAt, "order_created_at")
            .column_as(order::Column::UpdatedAt, "order_updated_at")
            .inner_join(Order)
            .filter(order::Column::UserId.eq(user_id))
            .filter(order_item::Column::Status.eq(OrderItemStatus::Active))
            .order_by_desc(order_item::Column::CreatedAt)
            .order_by_desc(order_item::Column::Id)
            .limit(limit)
            .offset(offset)
            .into_model::<OrderItemView>()
            .all(self.db)
            .await?)
    }

    async fn count_active_order_items_by_user(&self, user_id: i32) -> Result<u64, ServiceError> {
        Ok(OrderItem::find()
            .inner_join(Order)
            .filter(order::Column::UserId.eq(user_id))
            .filter(order_item::Column::Status.eq(OrderItemStatus::Active))
            .count(self.db)
            .await?)
    }
}
