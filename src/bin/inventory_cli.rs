use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use inventory_system::{
    config::{self, AppConfig},
    db,
    entities::UserRole,
    errors::{ErrorResponse, ServiceError},
    events::{self, EventSender},
    pagination::{Page, PageQuery},
    repositories::{Identity, NewUser},
    services::orders::{
        CreateOrderItemRequest, CreateOrderRequest, OrderDetailsResponse, OrderResponse,
        UpdateOrderStatusRequest, UserOrderItemResponse,
    },
    ApiResponse, AppState,
};
use rust_decimal::Decimal;
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    let json = cli.json;
    if let Err(err) = run(&context, cli).await {
        report_error(&err, json)?;
        std::process::exit(1);
    }

    Ok(())
}

async fn run(context: &CliContext, cli: Cli) -> Result<(), ServiceError> {
    let json = cli.json;
    let user = cli.user;

    match cli.command {
        Commands::CreateOrder(args) => {
            let identity = require_identity(user)?;
            let response = context
                .state
                .order_workflow()
                .create_order(&identity, CreateOrderRequest { items: args.items })
                .await?;
            emit(
                ApiResponse::success(response).with_message("Order created successfully"),
                json,
                render_details,
            )
        }
        Commands::RemoveItem { order_item_id } => {
            context
                .state
                .order_workflow()
                .remove_order_item(order_item_id)
                .await?;
            emit(ApiResponse::ok("Deleted successfully"), json, |_| {
                println!("Order item {} removed", order_item_id)
            })
        }
        Commands::UpdateStatus { order_id, status } => {
            let order = context
                .state
                .order_workflow()
                .update_order_status(order_id, UpdateOrderStatusRequest { status })
                .await?;
            emit(
                ApiResponse::success(order).with_message("Status update successfully"),
                json,
                |r| {
                    if let Some(order) = &r.data {
                        render_order(order);
                    }
                },
            )
        }
        Commands::GetOrder { order_id } => {
            let details = context.state.order_workflow().get_order(order_id).await?;
            emit(ApiResponse::success(details), json, render_details)
        }
        Commands::ListOrders(args) => {
            let identity = require_identity(user)?;
            let query = args.query(&context.state.config);
            let page = context
                .state
                .order_workflow()
                .list_orders_for_user(&identity, query)
                .await?;
            let message = page.message.clone();
            emit(ApiResponse::success(page).with_message(message), json, |r| {
                if let Some(page) = &r.data {
                    render_page(page, render_order);
                }
            })
        }
        Commands::ListItems(args) => {
            let identity = require_identity(user)?;
            let query = args.query(&context.state.config);
            let page = context
                .state
                .order_workflow()
                .list_order_items_for_user(&identity, query)
                .await?;
            let message = page.message.clone();
            emit(ApiResponse::success(page).with_message(message), json, |r| {
                if let Some(page) = &r.data {
                    render_page(page, render_user_item);
                }
            })
        }
        Commands::AddUser(args) => {
            let created = context
                .state
                .user_repository()
                .create_user(NewUser {
                    username: args.username,
                    full_name: args.full_name,
                    email: args.email,
                    role: args.role.into(),
                })
                .await?;
            emit(
                ApiResponse::success(created).with_message("User created successfully"),
                json,
                |r| {
                    if let Some(user) = &r.data {
                        println!("User {} created (id {})", user.username, user.id);
                    }
                },
            )
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "inventory",
    about = "Inventory CLI for orders and order items",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        help = "Username the command acts on behalf of"
    )]
    user: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an order from one or more items
    CreateOrder(CreateOrderArgs),
    /// Remove (deactivate) an order item and recalculate its order total
    RemoveItem { order_item_id: i32 },
    /// Set an order's status
    UpdateStatus { order_id: i32, status: String },
    /// Show an order with all of its items
    GetOrder { order_id: i32 },
    /// List the current user's orders
    ListOrders(PageArgs),
    /// List the current user's active order items
    ListItems(PageArgs),
    /// Register a user that orders can be placed for
    AddUser(AddUserArgs),
}

#[derive(Debug, Args)]
struct CreateOrderArgs {
    #[arg(
        long = "item",
        required = true,
        value_parser = parse_item,
        help = "Order item as <product_id>:<quantity>:<price>, repeatable"
    )]
    items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(long, help = "Rows per page (1-100); defaults to the configured page size")]
    size: Option<u32>,
    #[arg(long, default_value_t = 1, allow_negative_numbers = true, help = "1-based page number")]
    page: i32,
}

impl PageArgs {
    fn query(&self, config: &AppConfig) -> PageQuery {
        PageQuery::new(self.size.unwrap_or(config.default_page_size), self.page)
    }
}

#[derive(Debug, Args)]
struct AddUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Employee)]
    role: RoleArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Employee,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => UserRole::Admin,
            RoleArg::Employee => UserRole::Employee,
        }
    }
}

fn parse_item(raw: &str) -> Result<CreateOrderItemRequest, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [product_id, quantity, price] = parts.as_slice() else {
        return Err(format!(
            "expected <product_id>:<quantity>:<price>, got '{}'",
            raw
        ));
    };

    Ok(CreateOrderItemRequest {
        product_id: product_id
            .parse()
            .map_err(|_| format!("invalid product id '{}'", product_id))?,
        quantity: quantity
            .parse()
            .map_err(|_| format!("invalid quantity '{}'", quantity))?,
        price: Decimal::from_str(price).map_err(|_| format!("invalid price '{}'", price))?,
    })
}

fn require_identity(user: Option<String>) -> Result<Identity, ServiceError> {
    user.filter(|u| !u.trim().is_empty())
        .map(Identity::new)
        .ok_or_else(|| ServiceError::ValidationError("--user is required for this command".into()))
}

struct CliContext {
    state: AppState,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        db::check_connection(&db_pool)
            .await
            .context("database is not reachable")?;
        let db = Arc::new(db_pool);

        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        Ok(Self {
            state: AppState::new(db, config, Some(Arc::new(event_sender))),
        })
    }
}

fn emit<T: Serialize>(
    response: ApiResponse<T>,
    json: bool,
    render: impl FnOnce(&ApiResponse<T>),
) -> Result<(), ServiceError> {
    if json {
        print_json(&response).map_err(ServiceError::Other)?;
    } else {
        if let Some(message) = &response.message {
            println!("{}", message);
        }
        render(&response);
    }
    Ok(())
}

fn report_error(err: &ServiceError, json: bool) -> Result<()> {
    let status = err.status_code();
    if json {
        print_json(&ErrorResponse::from(err))?;
    } else {
        eprintln!(
            "error ({} {}): {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error"),
            err.response_message()
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_order(order: &OrderResponse) {
    println!(
        "- Order {} • user {} • status {} • total {} • created {}",
        order.id,
        order.user_id,
        order.status,
        order.total_amount,
        order.created_at.to_rfc3339()
    );
}

fn render_details(response: &ApiResponse<OrderDetailsResponse>) {
    if let Some(details) = &response.data {
        render_order(&details.order);
        for item in &details.items {
            println!(
                "  • item {} • product {} • {} @ {} ({})",
                item.id, item.product_id, item.quantity, item.price, item.status
            );
        }
    }
}

fn render_user_item(item: &UserOrderItemResponse) {
    println!(
        "- Item {} • order {} (total {}) • product {} • {} @ {}",
        item.order_item_id,
        item.order_id,
        item.order_total_amount,
        item.product_id,
        item.quantity,
        item.price
    );
}

fn render_page<T>(page: &Page<T>, render: fn(&T)) {
    for row in &page.items {
        render(row);
    }
    println!(
        "page {} of {} • {} total",
        page.page, page.total_pages, page.total_count
    );
}
