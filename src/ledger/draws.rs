//! Partners, recurring deductions and monthly draws (pró-labore)
//!
//! `net = base - (recurring + ad_hoc)` where recurring sums the partner's
//! active deductions and ad hoc sums the entries tagged to the partner that
//! fall due in the month, split into pending and paid subtotals.
//!
//! A month without a committed snapshot is computed on every read and flagged
//! `real_time`. Mutations touching a partner refresh the stored open record
//! of the affected month; committed records are never modified.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{ConflictError, FynnessError, FynnessResult, ValidationError};
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::period::Period;
use crate::core::query::EntryQuery;
use crate::core::records::{
    CashFlowRow, EntryKind, EntryStatus, LedgerEntry, Partner, PartnerDrawRecord,
    RecurringDeduction,
};
use crate::core::scope::{Scope, Scoped};
use crate::core::store::LedgerTx;
use crate::ledger::{LedgerService, load_partner};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartnerRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub base_draw: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDeductionRequest {
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PayDrawRequest {
    pub paid_at: Option<NaiveDate>,
    pub include_in_cash_flow: bool,
}

/// Outcome of a draw payment
#[derive(Debug, Clone, Serialize)]
pub struct DrawPayment {
    pub draw: PartnerDrawRecord,
    pub payment_entry: LedgerEntry,
}

/// Compute the draw of `partner` for `period` from current state
pub(crate) async fn compute_in(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    partner: &Partner,
    period: Period,
    today: NaiveDate,
) -> FynnessResult<PartnerDrawRecord> {
    let deductions = tx.list_deductions(scope, partner.id).await?;
    let recurring = money::sum(deductions.iter().filter(|d| d.active).map(|d| d.amount));

    let entries = tx
        .find_entries(scope, &EntryQuery::for_partner(partner.id, period))
        .await?;
    let pending = money::sum(entries.iter().filter(|e| e.is_pending()).map(|e| e.amount));
    let paid = money::sum(
        entries
            .iter()
            .filter(|e| e.is_paid())
            .map(|e| e.settled_amount()),
    );

    let mut record = PartnerDrawRecord::compute(partner, period, recurring, pending, paid);
    record.month_closed = period.is_closed(today);
    Ok(record)
}

/// Refresh the stored open record of (partner, month)
///
/// Committed records are left alone. Returns the stored record, if any.
pub(crate) async fn recompute_in(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    partner_id: Uuid,
    period: Period,
    today: NaiveDate,
) -> FynnessResult<Option<PartnerDrawRecord>> {
    let Some(partner) = tx.get_partner(scope, partner_id).await? else {
        return Ok(None);
    };
    let stored = tx.find_draw(scope, partner_id, period).await?;
    if let Some(record) = stored.as_ref().filter(|r| r.committed) {
        tracing::debug!(partner_id = %partner_id, period = %period, "draw committed, not refreshed");
        return Ok(Some(record.clone()));
    }

    let computed = compute_in(tx, scope, &partner, period, today).await?;
    let record = match stored {
        Some(mut record) => {
            record.refresh_from(&computed);
            record.month_closed = computed.month_closed;
            record
        }
        None => computed,
    };
    tx.put_draw(&record).await?;
    Ok(Some(record))
}

/// Refresh every open stored record of a partner (recurring deductions changed)
async fn refresh_open_draws(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    partner_id: Uuid,
    today: NaiveDate,
) -> FynnessResult<()> {
    let draws = tx.list_draws(scope, partner_id).await?;
    for draw in draws.into_iter().filter(|d| !d.committed) {
        recompute_in(tx, scope, partner_id, draw.period, today).await?;
    }
    Ok(())
}

impl LedgerService {
    pub async fn create_partner(
        &self,
        scope: &Scope,
        request: CreatePartnerRequest,
    ) -> FynnessResult<Partner> {
        request.validate()?;
        let base_draw = money::cents_precision("base_draw", request.base_draw)?;
        if base_draw < Decimal::ZERO {
            return Err(FynnessError::field("base_draw", "must not be negative"));
        }

        let partner = Partner {
            id: Uuid::new_v4(),
            user_id: scope.user_id,
            company_id: scope.company_id,
            name: request.name,
            base_draw,
            created_at: Utc::now(),
        };

        let mut tx = self.begin().await?;
        tx.put_partner(&partner).await?;
        self.commit(tx, scope, Vec::new()).await?;
        Ok(partner)
    }

    pub async fn list_partners(&self, scope: &Scope) -> FynnessResult<Vec<Partner>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_partners(scope).await?)
    }

    pub async fn add_deduction(
        &self,
        scope: &Scope,
        partner_id: Uuid,
        request: CreateDeductionRequest,
    ) -> FynnessResult<RecurringDeduction> {
        request.validate()?;
        let amount = money::positive_amount("amount", request.amount)?;

        let mut tx = self.begin().await?;
        let partner = load_partner(tx.as_mut(), scope, partner_id).await?;
        let deduction = RecurringDeduction {
            id: Uuid::new_v4(),
            user_id: partner.user_id,
            company_id: partner.company_id,
            partner_id,
            description: request.description,
            amount,
            active: true,
            created_at: Utc::now(),
            deactivated_at: None,
        };
        tx.put_deduction(&deduction).await?;
        refresh_open_draws(tx.as_mut(), scope, partner_id, Self::today()).await?;
        self.commit(tx, scope, Vec::new()).await?;
        Ok(deduction)
    }

    pub async fn list_deductions(
        &self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> FynnessResult<Vec<RecurringDeduction>> {
        let mut tx = self.begin().await?;
        load_partner(tx.as_mut(), scope, partner_id).await?;
        Ok(tx.list_deductions(scope, partner_id).await?)
    }

    /// Stop applying a recurring deduction to future computations
    pub async fn deactivate_deduction(
        &self,
        scope: &Scope,
        partner_id: Uuid,
        deduction_id: Uuid,
    ) -> FynnessResult<RecurringDeduction> {
        let mut tx = self.begin().await?;
        load_partner(tx.as_mut(), scope, partner_id).await?;
        let mut deduction = tx
            .list_deductions(scope, partner_id)
            .await?
            .into_iter()
            .find(|d| d.id == deduction_id)
            .ok_or_else(|| FynnessError::not_found("deduction", deduction_id))?;

        if !deduction.active {
            return Err(ConflictError::DeductionInactive { deduction_id }.into());
        }
        deduction.active = false;
        deduction.deactivated_at = Some(Utc::now());
        tx.put_deduction(&deduction).await?;
        refresh_open_draws(tx.as_mut(), scope, partner_id, Self::today()).await?;
        self.commit(tx, scope, Vec::new()).await?;
        Ok(deduction)
    }

    /// The draw of a month: the committed snapshot if any, else computed now
    pub async fn draw_for_month(
        &self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
        today: NaiveDate,
    ) -> FynnessResult<PartnerDrawRecord> {
        let mut tx = self.begin().await?;
        let partner = load_partner(tx.as_mut(), scope, partner_id).await?;

        let stored = tx.find_draw(scope, partner_id, period).await?;
        if let Some(record) = stored.as_ref().filter(|r| r.committed) {
            return Ok(record.clone());
        }

        let computed = compute_in(tx.as_mut(), scope, &partner, period, today).await?;
        Ok(match stored {
            Some(mut record) => {
                record.refresh_from(&computed);
                record.month_closed = computed.month_closed;
                record
            }
            None => computed,
        })
    }

    /// Stored draw records of a partner, oldest month first
    pub async fn list_draws(
        &self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> FynnessResult<Vec<PartnerDrawRecord>> {
        let mut tx = self.begin().await?;
        load_partner(tx.as_mut(), scope, partner_id).await?;
        Ok(tx.list_draws(scope, partner_id).await?)
    }

    /// Persist the month's draw as a permanent historical snapshot
    pub async fn commit_draw(
        &self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
        today: NaiveDate,
    ) -> FynnessResult<PartnerDrawRecord> {
        let mut tx = self.begin().await?;
        let record = commit_in(tx.as_mut(), scope, partner_id, period, today).await?;
        let event = LedgerEvent::DrawCommitted {
            partner_id,
            period,
            net: record.net,
        };
        self.commit(tx, scope, vec![event]).await?;

        tracing::info!(partner_id = %partner_id, period = %period, net = %record.net, "draw committed");
        Ok(record)
    }

    /// Pay the month's draw, committing it first when still open
    pub async fn pay_draw(
        &self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
        request: PayDrawRequest,
        today: NaiveDate,
    ) -> FynnessResult<DrawPayment> {
        let mut tx = self.begin().await?;
        let partner = load_partner(tx.as_mut(), scope, partner_id).await?;

        let mut events = Vec::new();
        let mut draw = match tx.find_draw(scope, partner_id, period).await? {
            Some(record) if record.paid => {
                return Err(ConflictError::DrawAlreadySettled {
                    partner_id,
                    period,
                    state: "paid",
                }
                .into());
            }
            Some(record) if record.committed => record,
            _ => {
                let record = commit_in(tx.as_mut(), scope, partner_id, period, today).await?;
                events.push(LedgerEvent::DrawCommitted {
                    partner_id,
                    period,
                    net: record.net,
                });
                record
            }
        };

        if draw.net <= Decimal::ZERO {
            return Err(FynnessError::field(
                "net",
                format!("draw for {} nets {}; nothing to pay", period, draw.net),
            ));
        }

        let paid_at = request.paid_at.unwrap_or(today);
        // no partner tag: the payment itself must not count as a deduction
        let mut payment_entry = LedgerEntry::new(
            &partner.scope(),
            EntryKind::Payable,
            format!("Pró-labore {} {}", partner.name, period),
            draw.net,
            paid_at,
        );
        payment_entry.category = Some("partner_draw".to_string());
        payment_entry.status = EntryStatus::Paid;
        payment_entry.paid_at = Some(paid_at);
        payment_entry.in_cash_flow = request.include_in_cash_flow;
        payment_entry.draw_ref = Some(draw.id);
        tx.put_entry(&payment_entry).await?;
        if request.include_in_cash_flow {
            tx.put_cash_flow(&CashFlowRow::for_entry(&payment_entry))
                .await?;
        }

        draw.paid = true;
        draw.paid_at = Some(paid_at);
        draw.payment_entry_id = Some(payment_entry.id);
        tx.put_draw(&draw).await?;

        events.push(LedgerEvent::DrawPaid {
            partner_id,
            period,
            net: draw.net,
        });
        self.commit(tx, scope, events).await?;

        tracing::info!(partner_id = %partner_id, period = %period, net = %draw.net, "draw paid");
        Ok(DrawPayment {
            draw,
            payment_entry,
        })
    }
}

async fn commit_in(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    partner_id: Uuid,
    period: Period,
    today: NaiveDate,
) -> FynnessResult<PartnerDrawRecord> {
    if !period.has_started(today) {
        return Err(ValidationError::FuturePeriod { period }.into());
    }
    let partner = load_partner(tx, scope, partner_id).await?;
    let stored = tx.find_draw(scope, partner_id, period).await?;
    if stored.as_ref().is_some_and(|r| r.committed) {
        return Err(ConflictError::DrawAlreadySettled {
            partner_id,
            period,
            state: "committed",
        }
        .into());
    }

    let computed = compute_in(tx, scope, &partner, period, today).await?;
    let mut record = match stored {
        Some(mut record) => {
            record.refresh_from(&computed);
            record
        }
        None => computed,
    };
    record.committed = true;
    record.committed_at = Some(Utc::now());
    record.real_time = false;
    record.month_closed = period.is_closed(today);
    tx.put_draw(&record).await?;
    Ok(record)
}
