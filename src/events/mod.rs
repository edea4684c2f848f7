use crate::money::Money;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Opens a bounded channel and returns both ends.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Facts published after an order change has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        user_id: i32,
        total: Money,
        item_count: usize,
    },
    OrderItemRemoved {
        order_id: i32,
        order_item_id: i32,
        new_total: Money,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: String,
        new_status: String,
    },
}

impl Event {
    pub fn order_id(&self) -> i32 {
        match self {
            Event::OrderCreated { order_id, .. }
            | Event::OrderItemRemoved { order_id, .. }
            | Event::OrderStatusChanged { order_id, .. } => *order_id,
        }
    }
}

/// Drains `rx` until every sender is dropped, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                user_id,
                total,
                item_count,
            } => {
                info!(order_id, user_id, total = %total, item_count, "Order created");
            }
            Event::OrderItemRemoved {
                order_id,
                order_item_id,
                new_total,
            } => {
                info!(order_id, order_item_id, new_total = %new_total, "Order item removed");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, old_status = %old_status, new_status = %new_status, "Order status changed");
            }
        }
    }

    warn!("Event channel closed; event processing loop stopped");
}
