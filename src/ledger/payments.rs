//! Payment reconciler: the per-entry state machine
//!
//! ```text
//! pending ──pay──▶ paid
//!    │    ◀─reverse─┘
//!    └──cancel──▶ canceled
//! ```
//!
//! Plan headers never move through this machine; only their installments do.
//! Card charges are settled and reversed only through their invoice.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::error::{ConflictError, FynnessResult, ValidationError};
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::query::EntryQuery;
use crate::core::records::{CashFlowRow, EntryStatus, LedgerEntry, PlanChangeKind};
use crate::core::scope::Scope;
use crate::ledger::effects::Effects;
use crate::ledger::installments::plan_total;
use crate::ledger::{LedgerService, load_entry};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PayEntryRequest {
    /// Defaults to today
    pub paid_at: Option<NaiveDate>,
    /// Actual amount paid when it differs from the nominal amount
    pub paid_amount: Option<Decimal>,
    pub include_in_cash_flow: bool,
}

fn transition(entry: &LedgerEntry, action: &'static str) -> ConflictError {
    ConflictError::InvalidTransition {
        entry_id: entry.id,
        status: entry.status.to_string(),
        action,
    }
}

impl LedgerService {
    /// `pending -> paid`
    pub async fn pay_entry(
        &self,
        scope: &Scope,
        id: Uuid,
        request: PayEntryRequest,
    ) -> FynnessResult<LedgerEntry> {
        let paid_amount = request
            .paid_amount
            .map(|amount| money::positive_amount("paid_amount", amount))
            .transpose()?;
        let today = Self::today();

        let mut tx = self.begin().await?;
        let before = load_entry(tx.as_mut(), scope, id).await?;

        if before.is_plan_header() {
            return Err(ValidationError::PlanHeaderNotPayable { entry_id: id }.into());
        }
        match before.status {
            EntryStatus::Pending => {}
            EntryStatus::Paid => return Err(ConflictError::AlreadyPaid { entry_id: id }.into()),
            EntryStatus::Canceled => return Err(transition(&before, "paid").into()),
        }
        if let Some(card_id) = before.card_id {
            return Err(ConflictError::ChargedToCard {
                entry_id: id,
                card_id,
                action: "paid",
            }
            .into());
        }

        let mut entry = before.clone();
        entry.status = EntryStatus::Paid;
        entry.paid_at = Some(request.paid_at.unwrap_or(today));
        entry.paid_amount = paid_amount;
        entry.in_cash_flow = request.include_in_cash_flow;
        entry.touch();
        tx.put_entry(&entry).await?;

        if entry.in_cash_flow {
            tx.put_cash_flow(&CashFlowRow::for_entry(&entry)).await?;
        }

        let mut effects = Effects::new();
        effects.changed(&before, &entry);
        effects.emit(LedgerEvent::EntryPaid {
            entry_id: id,
            amount: entry.settled_amount(),
        });
        let events = effects.apply(tx.as_mut(), scope, today).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(
            entry_id = %id,
            amount = %entry.settled_amount(),
            in_cash_flow = entry.in_cash_flow,
            "entry paid"
        );
        Ok(entry)
    }

    /// `paid -> pending`, removing every cash-flow row keyed to the entry
    pub async fn reverse_payment(&self, scope: &Scope, id: Uuid) -> FynnessResult<LedgerEntry> {
        let today = Self::today();
        let mut tx = self.begin().await?;
        let before = load_entry(tx.as_mut(), scope, id).await?;

        if let Some(invoice_id) = before.invoice_ref {
            return Err(ConflictError::SettlesInvoice {
                entry_id: id,
                invoice_id,
                action: "reversed",
            }
            .into());
        }
        if let Some(draw_id) = before.draw_ref {
            return Err(ConflictError::SettlesDraw {
                entry_id: id,
                draw_id,
                action: "reversed",
            }
            .into());
        }
        if !before.is_paid() {
            return Err(transition(&before, "reversed").into());
        }
        if let Some(card_id) = before.card_id {
            return Err(ConflictError::ChargedToCard {
                entry_id: id,
                card_id,
                action: "reversed",
            }
            .into());
        }

        let mut entry = before.clone();
        entry.status = EntryStatus::Pending;
        entry.paid_at = None;
        entry.paid_amount = None;
        entry.in_cash_flow = false;
        entry.touch();
        tx.put_entry(&entry).await?;
        let removed_rows = tx.delete_cash_flow_for_entry(id).await?;

        let mut effects = Effects::new();
        effects.changed(&before, &entry);
        effects.emit(LedgerEvent::PaymentReversed { entry_id: id });
        let events = effects.apply(tx.as_mut(), scope, today).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(entry_id = %id, removed_rows, "payment reversed");
        Ok(entry)
    }

    /// `pending -> canceled`
    pub async fn cancel_entry(&self, scope: &Scope, id: Uuid) -> FynnessResult<LedgerEntry> {
        let today = Self::today();
        let mut tx = self.begin().await?;
        let before = load_entry(tx.as_mut(), scope, id).await?;

        if before.is_plan_header() {
            return Err(ValidationError::PlanHeaderImmutable {
                entry_id: id,
                action: "cancel",
            }
            .into());
        }
        if !before.is_pending() {
            return Err(transition(&before, "canceled").into());
        }

        let mut entry = before.clone();
        entry.status = EntryStatus::Canceled;
        entry.touch();
        tx.put_entry(&entry).await?;

        let mut effects = Effects::new();
        effects.changed(&before, &entry);

        if let (Some(plan_id), Some(header_id)) = (entry.plan_id, entry.parent_id) {
            if let Some(mut plan) = tx.get_plan(scope, plan_id).await? {
                let members = tx.find_entries(scope, &EntryQuery::for_plan(plan_id)).await?;
                let total = plan_total(&members);
                plan.record(
                    PlanChangeKind::InstallmentCanceled,
                    entry.installment_index,
                    Some(entry.amount),
                    total,
                );
                plan.total = total;
                tx.put_plan(&plan).await?;

                if let Some(mut header) = members.into_iter().find(|e| e.id == header_id) {
                    header.amount = total;
                    header.touch();
                    tx.put_entry(&header).await?;
                }
            }
        }

        effects.emit(LedgerEvent::EntryCanceled { entry_id: id });
        let events = effects.apply(tx.as_mut(), scope, today).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(entry_id = %id, "entry canceled");
        Ok(entry)
    }
}
