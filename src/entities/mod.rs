pub mod order;
pub mod order_item;
pub mod user;

pub use order::{Entity as Order, Model as OrderModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel, OrderItemStatus};
pub use user::{Entity as User, Model as UserModel, UserRole};
