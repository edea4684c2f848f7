use crate::{
    db::{DatabaseAccess, DbPool},
    entities::{OrderItemModel, OrderItemStatus, OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    money::{self, Money},
    pagination::{Page, PageQuery},
    repositories::{Identity, OrderGateway, OrderItemView, OrderRepository, UserResolver},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::{Validate, ValidationError};

/// Request/Response types for the order workflow
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderItemRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "at least one order item is required"))]
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    #[validate(custom = "validate_status")]
    pub status: String,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    Money::new(*price).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("price");
        err.message = Some(e.to_string().into());
        err
    })
}

fn validate_status(status: &str) -> Result<(), ValidationError> {
    if status.trim().is_empty() {
        let mut err = ValidationError::new("status");
        err.message = Some("status must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// A validated line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i32,
    pub quantity: i32,
    pub price: Money,
}

impl CreateOrderRequest {
    /// Checks the whole request and converts it into order lines, keeping
    /// submission order. Unit prices are captured rounded to cents. The first
    /// offending item is named in the error.
    pub fn into_lines(self) -> Result<Vec<OrderLine>, ServiceError> {
        self.validate()?;

        let mut lines = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            item.validate().map_err(|e| {
                ServiceError::ValidationError(format!("items[{}]: {}", index, e))
            })?;
            let price = Money::new(item.price).map_err(|e| {
                ServiceError::ValidationError(format!("items[{}].price: {}", index, e))
            })?;
            lines.push(OrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
                price,
            });
        }
        Ok(lines)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: i32,
    pub user_id: i32,
    pub total_amount: Money,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Money,
    pub status: OrderItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetailsResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

/// A user's order item together with the figures of the order it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrderItemResponse {
    pub order_item_id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Money,
    pub status: OrderItemStatus,
    pub item_created_at: DateTime<Utc>,
    pub item_updated_at: DateTime<Utc>,
    pub order_total_amount: Money,
    pub order_created_at: DateTime<Utc>,
    pub order_updated_at: DateTime<Utc>,
}

fn stored_amount(value: &str, what: &str, id: i32) -> Result<Money, ServiceError> {
    Money::parse(value).map_err(|e| {
        error!(error = %e, id = id, "Stored {} is not a valid amount", what);
        ServiceError::InternalError(format!("stored {} of {} is invalid", what, id))
    })
}

impl TryFrom<OrderModel> for OrderResponse {
    type Error = ServiceError;

    fn try_from(model: OrderModel) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            total_amount: stored_amount(&model.total_amount, "order total", model.id)?,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<OrderItemModel> for OrderItemResponse {
    type Error = ServiceError;

    fn try_from(model: OrderItemModel) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            quantity: model.quantity,
            price: stored_amount(&model.price, "order item price", model.id)?,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

impl TryFrom<OrderItemView> for UserOrderItemResponse {
    type Error = ServiceError;

    fn try_from(view: OrderItemView) -> Result<Self, Self::Error> {
        Ok(Self {
            order_item_id: view.order_item_id,
            order_id: view.order_id,
            product_id: view.product_id,
            quantity: view.quantity,
            price: stored_amount(&view.price, "order item price", view.order_item_id)?,
            status: view.status,
            item_created_at: view.item_created_at,
            item_updated_at: view.item_updated_at,
            order_total_amount: stored_amount(
                &view.order_total_amount,
                "order total",
                view.order_id,
            )?,
            order_created_at: view.order_created_at,
            order_updated_at: view.order_updated_at,
        })
    }
}

fn details(
    order: OrderModel,
    items: Vec<OrderItemModel>,
) -> Result<OrderDetailsResponse, ServiceError> {
    Ok(OrderDetailsResponse {
        order: order.try_into()?,
        items: items
            .into_iter()
            .map(OrderItemResponse::try_from)
            .collect::<Result<_, _>>()?,
    })
}

/// Creates the order with the aggregate total, then its items in submission order.
pub async fn place_order(
    gateway: &dyn OrderGateway,
    user_id: i32,
    lines: &[OrderLine],
) -> Result<(OrderModel, Vec<OrderItemModel>), ServiceError> {
    let total = money::order_total(lines.iter().map(|line| (line.price, line.quantity)))?;
    let order = gateway.create_order(user_id, total).await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = gateway
            .create_order_item(order.id, line.product_id, line.quantity, line.price)
            .await?;
        items.push(item);
    }
    Ok((order, items))
}

/// Moves an active item to `de-active` and returns its order with the
/// recalculated total. The parent order stays locked until the surrounding
/// transaction ends.
pub async fn deactivate_order_item(
    gateway: &dyn OrderGateway,
    order_item_id: i32,
) -> Result<OrderModel, ServiceError> {
    let item = gateway.get_order_item(order_item_id).await?;
    let order = gateway.lock_order(item.order_id).await?;

    // Re-read under the order lock; a concurrent removal may have won.
    let item = gateway.get_order_item(order_item_id).await?;
    if !item.is_active() {
        return Err(ServiceError::InvalidState(format!(
            "Order item {} is {}, not active",
            order_item_id, item.status
        )));
    }

    gateway
        .update_order_item_status(item.id, OrderItemStatus::DeActive)
        .await?;
    gateway.recalculate_order_total(order.id).await
}

/// Stores `status` on the order. Returns the previous status and the updated order.
pub async fn change_order_status(
    gateway: &dyn OrderGateway,
    order_id: i32,
    status: &str,
) -> Result<(String, OrderModel), ServiceError> {
    let order = gateway.lock_order(order_id).await?;
    let updated = gateway.update_order_status(order.id, status).await?;
    Ok((order.status, updated))
}

pub async fn orders_page(
    gateway: &dyn OrderGateway,
    user_id: i32,
    query: &PageQuery,
) -> Result<Page<OrderModel>, ServiceError> {
    query.validate()?;
    let total = gateway.count_orders_by_user(user_id).await?;
    let rows = gateway
        .list_orders_by_user(user_id, query.limit(), query.offset())
        .await?;
    Ok(Page::new(rows, query, total))
}

pub async fn order_items_page(
    gateway: &dyn OrderGateway,
    user_id: i32,
    query: &PageQuery,
) -> Result<Page<OrderItemView>, ServiceError> {
    query.validate()?;
    let total = gateway.count_active_order_items_by_user(user_id).await?;
    let rows = gateway
        .list_order_items_by_user(user_id, query.limit(), query.offset())
        .await?;
    Ok(Page::new(rows, query, total))
}

/// Service orchestrating order creation, item removal, status changes and listings
#[derive(Clone)]
pub struct OrderWorkflowService {
    db: DatabaseAccess,
    users: Arc<dyn UserResolver>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderWorkflowService {
    pub fn new(
        db_pool: Arc<DbPool>,
        users: Arc<dyn UserResolver>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db: DatabaseAccess::new(db_pool),
            users,
            event_sender,
        }
    }

    /// Creates an order and all of its items in one transaction
    #[instrument(skip(self, identity, request), fields(username = %identity.username(), item_count = request.items.len()))]
    pub async fn create_order(
        &self,
        identity: &Identity,
        request: CreateOrderRequest,
    ) -> Result<OrderDetailsResponse, ServiceError> {
        let lines = request.into_lines().map_err(|e| {
            warn!(error = %e, "Rejected order request");
            e
        })?;
        let user = self.users.resolve(identity).await?;
        let user_id = user.id;

        let response = self
            .db
            .transaction(move |txn| {
                Box::pin(async move {
                    let gateway = OrderRepository::new(txn);
                    let (order, items) = place_order(&gateway, user_id, &lines).await?;
                    details(order, items)
                })
            })
            .await
            .map_err(|e| {
                error!(error = %e, user_id = user_id, "Failed to create order");
                e
            })?;

        info!(order_id = response.order.id, user_id = user_id, total = %response.order.total_amount, "Order created successfully");

        self.publish(Event::OrderCreated {
            order_id: response.order.id,
            user_id,
            total: response.order.total_amount,
            item_count: response.items.len(),
        })
        .await;

        Ok(response)
    }

    /// Logically deletes an order item and recalculates its order's total
    #[instrument(skip(self), fields(order_item_id = %order_item_id))]
    pub async fn remove_order_item(&self, order_item_id: i32) -> Result<(), ServiceError> {
        let order = self
            .db
            .transaction(move |txn| {
                Box::pin(async move {
                    let gateway = OrderRepository::new(txn);
                    let order = deactivate_order_item(&gateway, order_item_id).await?;
                    OrderResponse::try_from(order)
                })
            })
            .await
            .map_err(|e| {
                warn!(error = %e, order_item_id = order_item_id, "Failed to remove order item");
                e
            })?;

        info!(order_id = order.id, order_item_id = order_item_id, new_total = %order.total_amount, "Order item removed successfully");

        self.publish(Event::OrderItemRemoved {
            order_id: order.id,
            order_item_id,
            new_total: order.total_amount,
        })
        .await;

        Ok(())
    }

    /// Updates an order's status; any non-blank status is accepted
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: i32,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let status = request.status.trim().to_string();
        let new_status = status.clone();

        let (old_status, response) = self
            .db
            .transaction(move |txn| {
                Box::pin(async move {
                    let gateway = OrderRepository::new(txn);
                    let (old_status, updated) =
                        change_order_status(&gateway, order_id, &status).await?;
                    Ok::<_, ServiceError>((old_status, OrderResponse::try_from(updated)?))
                })
            })
            .await
            .map_err(|e| {
                warn!(error = %e, order_id = order_id, "Failed to update order status");
                e
            })?;

        info!(order_id = order_id, old_status = %old_status, new_status = %new_status, "Order status updated successfully");

        self.publish(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status,
        })
        .await;

        Ok(response)
    }

    /// Retrieves an order with every item it ever had
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderDetailsResponse, ServiceError> {
        let gateway = OrderRepository::new(self.db.get_pool());
        let order = gateway.get_order(order_id).await?;
        let items = gateway.list_items_for_order(order_id).await?;
        details(order, items)
    }

    /// Lists the caller's orders, newest first
    #[instrument(skip(self, identity), fields(username = %identity.username(), size = query.size, page_no = query.page_no))]
    pub async fn list_orders_for_user(
        &self,
        identity: &Identity,
        query: PageQuery,
    ) -> Result<Page<OrderResponse>, ServiceError> {
        query.validate()?;
        let user = self.users.resolve(identity).await?;

        let gateway = OrderRepository::new(self.db.get_pool());
        let page = orders_page(&gateway, user.id, &query).await.map_err(|e| {
            error!(error = %e, user_id = user.id, "Failed to list orders");
            e
        })?;

        info!(user_id = user.id, total = page.total_count, returned_count = page.items.len(), "Orders listed successfully");
        page.try_map(OrderResponse::try_from)
    }

    /// Lists the caller's active order items across all orders, newest first
    #[instrument(skip(self, identity), fields(username = %identity.username(), size = query.size, page_no = query.page_no))]
    pub async fn list_order_items_for_user(
        &self,
        identity: &Identity,
        query: PageQuery,
    ) -> Result<Page<UserOrderItemResponse>, ServiceError> {
        query.validate()?;
        let user = self.users.resolve(identity).await?;

        let gateway = OrderRepository::new(self.db.get_pool());
        let page = order_items_page(&gateway, user.id, &query)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = user.id, "Failed to list order items");
                e
            })?;

        info!(user_id = user.id, total = page.total_count, returned_count = page.items.len(), "Order items listed successfully");
        page.try_map(UserOrderItemResponse::try_from)
    }

    async fn publish(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            let order_id = event.order_id();
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = order_id, "Failed to send order event");
            }
        }
    }
}
