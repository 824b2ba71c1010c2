//! Downstream projections touched by entry mutations
//!
//! Every mutation describes the entries it changed (`before` / `after`);
//! [`Effects::apply`] then updates, inside the same transaction, each
//! projection those entries feed:
//!
//! - invoices: full resum of every touched (card, month) window; a paid
//!   window refuses the mutation unless it is the invoice being settled
//! - partner draws: refresh of every touched open (partner, month) record
//! - cost centers: incremental projected / actual deltas

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::core::error::{ConflictError, FynnessResult};
use crate::core::events::LedgerEvent;
use crate::core::period::Period;
use crate::core::records::LedgerEntry;
use crate::core::scope::Scope;
use crate::core::store::LedgerTx;
use crate::ledger::{draws, invoices};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct CostCenterDelta {
    projected: Decimal,
    actual: Decimal,
}

/// Accumulated side effects of one transaction
#[derive(Debug, Default)]
pub(crate) struct Effects {
    invoices: BTreeSet<(Uuid, Period)>,
    settling: Option<(Uuid, Period)>,
    draws: BTreeSet<(Uuid, Period)>,
    cost_centers: BTreeMap<String, CostCenterDelta>,
    events: Vec<LedgerEvent>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// `entry` now exists in its current state
    pub fn added(&mut self, entry: &LedgerEntry) {
        self.account(entry, Decimal::ONE);
    }

    /// `entry` no longer exists in this state
    pub fn removed(&mut self, entry: &LedgerEntry) {
        self.account(entry, Decimal::NEGATIVE_ONE);
    }

    pub fn changed(&mut self, before: &LedgerEntry, after: &LedgerEntry) {
        self.removed(before);
        self.added(after);
    }

    /// The invoice of (`card_id`, `period`) is being paid by this transaction
    pub fn settling_invoice(&mut self, card_id: Uuid, period: Period) {
        self.settling = Some((card_id, period));
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    fn account(&mut self, entry: &LedgerEntry, sign: Decimal) {
        if !entry.counts_toward_aggregates() {
            return;
        }
        let period = Period::of(entry.due_date);
        if let Some(card_id) = entry.card_id {
            self.invoices.insert((card_id, period));
        }
        if let Some(partner_id) = entry.partner_id {
            self.draws.insert((partner_id, period));
        }
        if let Some(code) = &entry.cost_center {
            let delta = self.cost_centers.entry(code.clone()).or_default();
            delta.projected += sign * entry.amount;
            if entry.is_paid() {
                delta.actual += sign * entry.settled_amount();
            }
        }
    }

    /// Bring every touched projection up to date; returns the events to publish
    pub async fn apply(
        mut self,
        tx: &mut dyn LedgerTx,
        scope: &Scope,
        today: NaiveDate,
    ) -> FynnessResult<Vec<LedgerEvent>> {
        for (code, delta) in std::mem::take(&mut self.cost_centers) {
            if delta == CostCenterDelta::default() {
                continue;
            }
            let Some(mut center) = tx.find_cost_center(scope, &code).await? else {
                tracing::warn!(cost_center = %code, "entry tagged with unknown cost center");
                continue;
            };
            center.projected_total += delta.projected;
            center.actual_total += delta.actual;
            center.updated_at = Utc::now();
            tx.put_cost_center(&center).await?;
        }

        for (card_id, period) in std::mem::take(&mut self.invoices) {
            let Some(card) = tx.get_card(scope, card_id).await? else {
                continue;
            };
            let invoice = invoices::recompute_in(tx, scope, &card, period).await?;
            if invoice.paid && self.settling != Some((card_id, period)) {
                return Err(ConflictError::InvoiceClosed { card_id, period }.into());
            }
            if !invoice.paid {
                self.events.push(LedgerEvent::InvoiceRecomputed {
                    card_id,
                    period,
                    total: invoice.total,
                });
            }
        }

        for (partner_id, period) in std::mem::take(&mut self.draws) {
            draws::recompute_in(tx, scope, partner_id, period, today).await?;
        }

        Ok(self.events)
    }
}
