//! Route definitions for the kitchen ledger API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/items", item_routes())
        .nest("/inventory", inventory_routes())
        .nest("/locations", location_routes())
        .nest("/transfers", transfer_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/supplier-ingredients", offer_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/recipes", recipe_routes())
        .nest("/menu-items", menu_routes())
        .nest("/waste", waste_routes())
        .nest("/variance", variance_routes())
        .nest("/periods", period_routes())
        .nest("/meta", meta_routes())
}

/// Inventory items and their ledgers
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route(
            "/:item_id/transactions",
            get(handlers::list_transactions).post(handlers::adjust),
        )
        .route("/:item_id/ledger-check", get(handlers::verify_ledger))
        .route("/:item_id/usage", get(handlers::actual_usage))
}

/// Stock-level reports
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(handlers::low_stock))
        .route("/alerts", get(handlers::low_stock_alerts))
        .route("/value", get(handlers::total_value))
        .route("/valuation", get(handlers::valuation_by_location))
}

fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_locations).post(handlers::create_location))
        .route(
            "/:location_id",
            get(handlers::get_location).delete(handlers::delete_location),
        )
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::request_transfer))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/approve", post(handlers::approve_transfer))
        .route("/:transfer_id/complete", post(handlers::complete_transfer))
        .route("/:transfer_id/reject", post(handlers::reject_transfer))
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .put(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
        .route("/:supplier_id/performance", get(handlers::supplier_performance))
        .route("/:supplier_id/ingredients", post(handlers::add_offer))
}

/// Supplier catalogue entries and their prices
fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_offers))
        .route("/preferred", get(handlers::preferred_offer))
        .route("/:offer_id", get(handlers::get_offer))
        .route(
            "/:offer_id/price",
            get(handlers::price_history).put(handlers::update_price),
        )
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/overdue", get(handlers::overdue_orders))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/items", post(handlers::add_order_item))
        .route("/:order_id/submit", post(handlers::submit_order))
        .route("/:order_id/approve", post(handlers::approve_order))
        .route("/:order_id/order", post(handlers::mark_order_ordered))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route(
            "/:order_id/receipts",
            get(handlers::list_receipts).post(handlers::receive_goods),
        )
}

fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_recipes).post(handlers::create_recipe))
        .route("/:recipe_id", get(handlers::get_recipe))
        .route("/:recipe_id/pricing", put(handlers::update_pricing))
        .route("/:recipe_id/refresh-costs", post(handlers::refresh_costs))
        .route("/:recipe_id/production", post(handlers::record_production))
        .route(
            "/:recipe_id/cost-history",
            get(handlers::cost_trend).post(handlers::create_snapshot),
        )
}

fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_menu_items).post(handlers::add_menu_item))
        .route("/engineering", get(handlers::menu_engineering))
        .route("/:menu_item_id/sales", post(handlers::record_sale))
}

fn waste_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_waste_logs).post(handlers::log_waste))
        .route("/total", get(handlers::waste_total))
        .route("/by-category", get(handlers::waste_by_category))
}

fn variance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_variance_records).post(handlers::record_variance),
        )
        .route("/theoretical-usage", post(handlers::theoretical_usage))
}

fn period_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_periods).post(handlers::close_period))
}

fn meta_routes() -> Router<AppState> {
    Router::new()
        .route("/display", get(handlers::display_tables))
        .route("/category", get(handlers::infer_ingredient_category))
}
