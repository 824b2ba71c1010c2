//! HTTP handlers for the ledger API
//!
//! Every handler takes the caller's [`Scope`] from the request headers and
//! delegates to [`LedgerService`]. Errors render through [`FynnessError`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::core::error::FynnessResult;
use crate::core::extractors::{JsonBody, PathParams, QueryParams};
use crate::core::period::Period;
use crate::core::query::{CashFlowQuery, EntryQuery, PageParams, PaginatedResponse};
use crate::core::records::{
    Card, CostCenter, Invoice, LedgerEntry, Partner, PartnerDrawRecord, RecurringDeduction,
};
use crate::core::scope::Scope;
use crate::ledger::draws::DrawPayment;
use crate::ledger::invoices::InvoicePayment;
use crate::ledger::{
    CashFlowReport, CreateCardRequest, CreateCostCenterRequest, CreateDeductionRequest,
    CreateEntryRequest, CreatePartnerRequest, DeleteOutcome, LedgerService, PayDrawRequest,
    PayEntryRequest, PayInvoiceRequest, PlanRequest, PlanView, ReconciliationReport,
    UpdateEntryRequest, UpdateInstallmentRequest,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerService,
}

impl AppState {
    pub fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }
}

type JsonResult<T> = FynnessResult<Json<T>>;

fn created<T: Serialize>(value: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(value))
}

/// Period of a `/{year}/{month}` path suffix
fn period_of(year: i32, month: u32) -> FynnessResult<Period> {
    Period::new(year, month)
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "fynness",
        "storage": state.ledger.backend(),
    }))
}

// =============================================================================
// Entries
// =============================================================================

pub async fn create_entry(
    State(state): State<AppState>,
    scope: Scope,
    JsonBody(request): JsonBody<CreateEntryRequest>,
) -> FynnessResult<impl IntoResponse> {
    let entry = state.ledger.create_entry(&scope, request).await?;
    Ok(created(entry))
}

/// GET /entries?due_from=&due_to=&status=&card_id=&page=&limit=
pub async fn list_entries(
    State(state): State<AppState>,
    scope: Scope,
    QueryParams(query): QueryParams<EntryQuery>,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<LedgerEntry>> {
    Ok(Json(state.ledger.list_entries(&scope, query, page).await?))
}

pub async fn get_entry(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> JsonResult<LedgerEntry> {
    Ok(Json(state.ledger.get_entry(&scope, id).await?))
}

pub async fn update_entry(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
    JsonBody(request): JsonBody<UpdateEntryRequest>,
) -> JsonResult<LedgerEntry> {
    Ok(Json(state.ledger.update_entry(&scope, id, request).await?))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> JsonResult<DeleteOutcome> {
    Ok(Json(state.ledger.delete_entry(&scope, id).await?))
}

/// POST /entries/{id}/pay; the body is optional
pub async fn pay_entry(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
    body: Option<JsonBody<PayEntryRequest>>,
) -> JsonResult<LedgerEntry> {
    let request = JsonBody::or_default(body);
    Ok(Json(state.ledger.pay_entry(&scope, id, request).await?))
}

pub async fn reverse_payment(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> JsonResult<LedgerEntry> {
    Ok(Json(state.ledger.reverse_payment(&scope, id).await?))
}

pub async fn cancel_entry(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> JsonResult<LedgerEntry> {
    Ok(Json(state.ledger.cancel_entry(&scope, id).await?))
}

// =============================================================================
// Installment plans
// =============================================================================

pub async fn create_plan(
    State(state): State<AppState>,
    scope: Scope,
    JsonBody(request): JsonBody<PlanRequest>,
) -> FynnessResult<impl IntoResponse> {
    let view = state.ledger.create_plan(&scope, request).await?;
    Ok(created(view))
}

pub async fn get_plan(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> JsonResult<PlanView> {
    Ok(Json(state.ledger.get_plan(&scope, id).await?))
}

pub async fn list_installments(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<LedgerEntry>> {
    let installments = state.ledger.list_installments(&scope, id).await?;
    Ok(Json(page.paginate(installments)))
}

pub async fn update_installment(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((id, index)): PathParams<(Uuid, u32)>,
    JsonBody(request): JsonBody<UpdateInstallmentRequest>,
) -> JsonResult<PlanView> {
    Ok(Json(
        state
            .ledger
            .update_installment(&scope, id, index, request)
            .await?,
    ))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(id): PathParams<Uuid>,
) -> FynnessResult<StatusCode> {
    state.ledger.delete_plan(&scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Cards and invoices
// =============================================================================

pub async fn create_card(
    State(state): State<AppState>,
    scope: Scope,
    JsonBody(request): JsonBody<CreateCardRequest>,
) -> FynnessResult<impl IntoResponse> {
    let card = state.ledger.create_card(&scope, request).await?;
    Ok(created(card))
}

pub async fn list_cards(
    State(state): State<AppState>,
    scope: Scope,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<Card>> {
    let cards = state.ledger.list_cards(&scope).await?;
    Ok(Json(page.paginate(cards)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(card_id): PathParams<Uuid>,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<Invoice>> {
    let invoices = state.ledger.list_invoices(&scope, card_id).await?;
    Ok(Json(page.paginate(invoices)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((card_id, year, month)): PathParams<(Uuid, i32, u32)>,
) -> JsonResult<Invoice> {
    let period = period_of(year, month)?;
    Ok(Json(state.ledger.get_invoice(&scope, card_id, period).await?))
}

pub async fn recompute_invoice(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((card_id, year, month)): PathParams<(Uuid, i32, u32)>,
) -> JsonResult<Invoice> {
    let period = period_of(year, month)?;
    Ok(Json(
        state.ledger.recompute_invoice(&scope, card_id, period).await?,
    ))
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((card_id, year, month)): PathParams<(Uuid, i32, u32)>,
    body: Option<JsonBody<PayInvoiceRequest>>,
) -> JsonResult<InvoicePayment> {
    let period = period_of(year, month)?;
    let request = JsonBody::or_default(body);
    Ok(Json(
        state
            .ledger
            .pay_invoice(&scope, card_id, period, request)
            .await?,
    ))
}

// =============================================================================
// Partners and draws
// =============================================================================

pub async fn create_partner(
    State(state): State<AppState>,
    scope: Scope,
    JsonBody(request): JsonBody<CreatePartnerRequest>,
) -> FynnessResult<impl IntoResponse> {
    let partner = state.ledger.create_partner(&scope, request).await?;
    Ok(created(partner))
}

pub async fn list_partners(
    State(state): State<AppState>,
    scope: Scope,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<Partner>> {
    let partners = state.ledger.list_partners(&scope).await?;
    Ok(Json(page.paginate(partners)))
}

pub async fn add_deduction(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(partner_id): PathParams<Uuid>,
    JsonBody(request): JsonBody<CreateDeductionRequest>,
) -> FynnessResult<impl IntoResponse> {
    let deduction = state
        .ledger
        .add_deduction(&scope, partner_id, request)
        .await?;
    Ok(created(deduction))
}

pub async fn list_deductions(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(partner_id): PathParams<Uuid>,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<RecurringDeduction>> {
    let deductions = state.ledger.list_deductions(&scope, partner_id).await?;
    Ok(Json(page.paginate(deductions)))
}

pub async fn deactivate_deduction(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((partner_id, deduction_id)): PathParams<(Uuid, Uuid)>,
) -> JsonResult<RecurringDeduction> {
    Ok(Json(
        state
            .ledger
            .deactivate_deduction(&scope, partner_id, deduction_id)
            .await?,
    ))
}

pub async fn list_draws(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(partner_id): PathParams<Uuid>,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<PartnerDrawRecord>> {
    let draws = state.ledger.list_draws(&scope, partner_id).await?;
    Ok(Json(page.paginate(draws)))
}

pub async fn get_draw(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((partner_id, year, month)): PathParams<(Uuid, i32, u32)>,
) -> JsonResult<PartnerDrawRecord> {
    let period = period_of(year, month)?;
    let today = LedgerService::today();
    Ok(Json(
        state
            .ledger
            .draw_for_month(&scope, partner_id, period, today)
            .await?,
    ))
}

pub async fn commit_draw(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((partner_id, year, month)): PathParams<(Uuid, i32, u32)>,
) -> JsonResult<PartnerDrawRecord> {
    let period = period_of(year, month)?;
    let today = LedgerService::today();
    Ok(Json(
        state
            .ledger
            .commit_draw(&scope, partner_id, period, today)
            .await?,
    ))
}

pub async fn pay_draw(
    State(state): State<AppState>,
    scope: Scope,
    PathParams((partner_id, year, month)): PathParams<(Uuid, i32, u32)>,
    body: Option<JsonBody<PayDrawRequest>>,
) -> JsonResult<DrawPayment> {
    let period = period_of(year, month)?;
    let request = JsonBody::or_default(body);
    let today = LedgerService::today();
    Ok(Json(
        state
            .ledger
            .pay_draw(&scope, partner_id, period, request, today)
            .await?,
    ))
}

// =============================================================================
// Cost centers, cash flow, maintenance
// =============================================================================

pub async fn create_cost_center(
    State(state): State<AppState>,
    scope: Scope,
    JsonBody(request): JsonBody<CreateCostCenterRequest>,
) -> FynnessResult<impl IntoResponse> {
    let center = state.ledger.create_cost_center(&scope, request).await?;
    Ok(created(center))
}

pub async fn list_cost_centers(
    State(state): State<AppState>,
    scope: Scope,
    QueryParams(page): QueryParams<PageParams>,
) -> JsonResult<PaginatedResponse<CostCenter>> {
    let centers = state.ledger.list_cost_centers(&scope).await?;
    Ok(Json(page.paginate(centers)))
}

pub async fn get_cost_center(
    State(state): State<AppState>,
    scope: Scope,
    PathParams(code): PathParams<String>,
) -> JsonResult<CostCenter> {
    Ok(Json(state.ledger.get_cost_center(&scope, &code).await?))
}

/// GET /cash-flow?from=2026-01-01&to=2026-01-31
pub async fn cash_flow(
    State(state): State<AppState>,
    scope: Scope,
    QueryParams(query): QueryParams<CashFlowQuery>,
) -> JsonResult<CashFlowReport> {
    Ok(Json(state.ledger.cash_flow(&scope, query).await?))
}

/// Sweep the caller's scope; the binary's `reconcile` command sweeps all scopes
pub async fn reconcile(
    State(state): State<AppState>,
    scope: Scope,
) -> JsonResult<ReconciliationReport> {
    Ok(Json(state.ledger.reconcile(Some(scope)).await?))
}
