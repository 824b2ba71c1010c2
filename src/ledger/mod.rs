//! The ledger service: every operation of the reconciliation core
//!
//! Each public operation opens one storage transaction, performs the entry
//! mutation, recomputes the aggregates it touched inside that same
//! transaction, commits, and only then publishes events.
//!
//! ```text
//! entry mutation ──▶ Effects ──▶ invoice / draw / cost-center recompute ──▶ commit ──▶ EventBus
//! ```

pub mod cost_centers;
pub mod draws;
pub mod effects;
pub mod entries;
pub mod handlers;
pub mod installments;
pub mod invoices;
pub mod payments;
pub mod reconcile;

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::core::error::{FynnessError, FynnessResult};
use crate::core::events::{EventBus, LedgerEvent};
use crate::core::records::{Card, InstallmentPlan, LedgerEntry, Partner};
use crate::core::scope::Scope;
use crate::core::store::{LedgerStore, LedgerTx};

pub use cost_centers::{CashFlowReport, CashFlowSummary, CreateCostCenterRequest};
pub use draws::{CreateDeductionRequest, CreatePartnerRequest, PayDrawRequest};
pub use entries::{CreateEntryRequest, DeleteOutcome, UpdateEntryRequest};
pub use installments::{PlanRequest, PlanView, UpdateInstallmentRequest, expand_plan};
pub use invoices::{CreateCardRequest, PayInvoiceRequest};
pub use payments::PayEntryRequest;
pub use reconcile::{Correction, ReconciliationReport};

/// Entry point of the reconciliation core
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    settings: LedgerSettings,
    events: Option<EventBus>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            settings,
            events: None,
        }
    }

    /// Publish committed mutations on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub(crate) async fn begin(&self) -> FynnessResult<Box<dyn LedgerTx>> {
        Ok(self.store.begin().await?)
    }

    pub(crate) async fn commit(
        &self,
        tx: Box<dyn LedgerTx>,
        scope: &Scope,
        events: Vec<LedgerEvent>,
    ) -> FynnessResult<()> {
        tx.commit().await?;
        if let Some(bus) = &self.events {
            bus.publish(*scope, events);
        }
        Ok(())
    }

    pub(crate) fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Load a live entry; soft-deleted entries are reported as absent
pub(crate) async fn load_entry(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    id: Uuid,
) -> FynnessResult<LedgerEntry> {
    tx.get_entry(scope, id)
        .await?
        .filter(|e| !e.is_deleted())
        .ok_or_else(|| FynnessError::not_found("entry", id))
}

pub(crate) async fn load_plan(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    id: Uuid,
) -> FynnessResult<InstallmentPlan> {
    tx.get_plan(scope, id)
        .await?
        .ok_or_else(|| FynnessError::not_found("plan", id))
}

pub(crate) async fn load_card(tx: &mut dyn LedgerTx, scope: &Scope, id: Uuid) -> FynnessResult<Card> {
    tx.get_card(scope, id)
        .await?
        .ok_or_else(|| FynnessError::not_found("card", id))
}

pub(crate) async fn load_partner(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    id: Uuid,
) -> FynnessResult<Partner> {
    tx.get_partner(scope, id)
        .await?
        .ok_or_else(|| FynnessError::not_found("partner", id))
}

/// Card, partner and cost center an entry is tagged with must exist in scope
pub(crate) async fn check_references(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    card_id: Option<Uuid>,
    partner_id: Option<Uuid>,
    cost_center: Option<&str>,
) -> FynnessResult<()> {
    if let Some(card_id) = card_id {
        if tx.get_card(scope, card_id).await?.is_none() {
            return Err(FynnessError::field("card_id", format!("unknown card '{}'", card_id)));
        }
    }
    if let Some(partner_id) = partner_id {
        if tx.get_partner(scope, partner_id).await?.is_none() {
            return Err(FynnessError::field(
                "partner_id",
                format!("unknown partner '{}'", partner_id),
            ));
        }
    }
    if let Some(code) = cost_center {
        if tx.find_cost_center(scope, code).await?.is_none() {
            return Err(FynnessError::field(
                "cost_center",
                format!("unknown cost center '{}'", code),
            ));
        }
    }
    Ok(())
}
