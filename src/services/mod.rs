// Order workflow: creation, item removal, status changes and listings
pub mod orders;

pub use orders::OrderWorkflowService;
