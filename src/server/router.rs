//! Route table of the ledger API

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::ledger::handlers::{self, AppState};

/// Build every ledger route
///
/// ```text
/// /entries                              POST create, GET list
/// /entries/{id}                         GET, PUT, DELETE
/// /entries/{id}/pay|reverse|cancel      POST
/// /plans                                POST
/// /plans/{id}                           GET, DELETE
/// /plans/{id}/installments[/{index}]    GET, PUT
/// /cards[/{id}/invoices[/{y}/{m}]]      invoices per card and month
/// /partners[/{id}/deductions|draws]     partner draws
/// /cost-centers[/{code}]
/// /cash-flow
/// /maintenance/reconcile
/// ```
pub fn build_ledger_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        // entries
        .route(
            "/entries",
            post(handlers::create_entry).get(handlers::list_entries),
        )
        .route(
            "/entries/{id}",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route("/entries/{id}/pay", post(handlers::pay_entry))
        .route("/entries/{id}/reverse", post(handlers::reverse_payment))
        .route("/entries/{id}/cancel", post(handlers::cancel_entry))
        // installment plans
        .route("/plans", post(handlers::create_plan))
        .route(
            "/plans/{id}",
            get(handlers::get_plan).delete(handlers::delete_plan),
        )
        .route(
            "/plans/{id}/installments",
            get(handlers::list_installments),
        )
        .route(
            "/plans/{id}/installments/{index}",
            put(handlers::update_installment),
        )
        // cards and invoices
        .route(
            "/cards",
            post(handlers::create_card).get(handlers::list_cards),
        )
        .route("/cards/{id}/invoices", get(handlers::list_invoices))
        .route(
            "/cards/{id}/invoices/{year}/{month}",
            get(handlers::get_invoice),
        )
        .route(
            "/cards/{id}/invoices/{year}/{month}/recompute",
            post(handlers::recompute_invoice),
        )
        .route(
            "/cards/{id}/invoices/{year}/{month}/pay",
            post(handlers::pay_invoice),
        )
        // partners and draws
        .route(
            "/partners",
            post(handlers::create_partner).get(handlers::list_partners),
        )
        .route(
            "/partners/{id}/deductions",
            post(handlers::add_deduction).get(handlers::list_deductions),
        )
        .route(
            "/partners/{id}/deductions/{deduction_id}",
            delete(handlers::deactivate_deduction),
        )
        .route("/partners/{id}/draws", get(handlers::list_draws))
        .route(
            "/partners/{id}/draws/{year}/{month}",
            get(handlers::get_draw),
        )
        .route(
            "/partners/{id}/draws/{year}/{month}/commit",
            post(handlers::commit_draw),
        )
        .route(
            "/partners/{id}/draws/{year}/{month}/pay",
            post(handlers::pay_draw),
        )
        // cost centers, cash flow, maintenance
        .route(
            "/cost-centers",
            post(handlers::create_cost_center).get(handlers::list_cost_centers),
        )
        .route("/cost-centers/{code}", get(handlers::get_cost_center))
        .route("/cash-flow", get(handlers::cash_flow))
        .route("/maintenance/reconcile", post(handlers::reconcile))
        .with_state(state)
}
