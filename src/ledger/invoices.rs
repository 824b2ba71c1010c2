//! Credit cards and their monthly invoices
//!
//! An invoice's total is always a full resum of the qualifying entries of its
//! (card, month) window, computed inside the transaction that stores it.
//! Paid invoices are immutable snapshots.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{ConflictError, FynnessResult, ValidationError};
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::period::Period;
use crate::core::query::EntryQuery;
use crate::core::records::{Card, CashFlowRow, EntryKind, EntryStatus, Invoice, LedgerEntry};
use crate::core::scope::{Scope, Scoped};
use crate::core::store::LedgerTx;
use crate::ledger::effects::Effects;
use crate::ledger::{LedgerService, load_card};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCardRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 1, max = 31, message = "must be between 1 and 31"))]
    pub closing_day: u32,
    #[validate(range(min = 1, max = 31, message = "must be between 1 and 31"))]
    pub due_day: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PayInvoiceRequest {
    /// Defaults to today
    pub paid_at: Option<NaiveDate>,
    /// Defaults to `ledger.invoice_cash_flow_default`
    pub include_in_cash_flow: Option<bool>,
}

/// Outcome of an invoice payment
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePayment {
    pub invoice: Invoice,
    /// The consolidated entry created for the invoice amount
    pub payment_entry: LedgerEntry,
    /// Pending entries of the window marked paid
    pub settled_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<CashFlowRow>,
}

/// Resum the window of `card` for `period` without storing anything
///
/// Returns the stored invoice untouched when it is paid.
pub(crate) async fn compute(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    card: &Card,
    period: Period,
) -> FynnessResult<(Invoice, Vec<LedgerEntry>)> {
    let stored = tx.find_invoice(scope, card.id, period).await?;
    let entries = tx
        .find_entries(scope, &EntryQuery::for_card(card.id, period))
        .await?;

    if let Some(invoice) = stored.as_ref().filter(|i| i.paid) {
        return Ok((invoice.clone(), entries));
    }

    let mut invoice = stored.unwrap_or_else(|| Invoice::open(card, period));
    invoice.total = money::sum(entries.iter().map(|e| e.amount));
    invoice.entry_count = entries.len();
    Ok((invoice, entries))
}

/// Resum and store the invoice of a (card, month) window
pub(crate) async fn recompute_in(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    card: &Card,
    period: Period,
) -> FynnessResult<Invoice> {
    let (mut invoice, _) = compute(tx, scope, card, period).await?;
    if invoice.paid {
        return Ok(invoice);
    }
    invoice.materialized = true;
    invoice.updated_at = Utc::now();
    tx.put_invoice(&invoice).await?;
    tracing::debug!(card_id = %card.id, period = %period, total = %invoice.total, "invoice recomputed");
    Ok(invoice)
}

impl LedgerService {
    pub async fn create_card(&self, scope: &Scope, request: CreateCardRequest) -> FynnessResult<Card> {
        request.validate()?;

        let card = Card {
            id: Uuid::new_v4(),
            user_id: scope.user_id,
            company_id: scope.company_id,
            name: request.name,
            closing_day: request.closing_day,
            due_day: request.due_day,
            created_at: Utc::now(),
        };

        let mut tx = self.begin().await?;
        tx.put_card(&card).await?;
        self.commit(tx, scope, Vec::new()).await?;
        Ok(card)
    }

    pub async fn list_cards(&self, scope: &Scope) -> FynnessResult<Vec<Card>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_cards(scope).await?)
    }

    /// Current state of an invoice, computed on read when nothing is stored
    pub async fn get_invoice(
        &self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
    ) -> FynnessResult<Invoice> {
        let mut tx = self.begin().await?;
        let card = load_card(tx.as_mut(), scope, card_id).await?;
        let (invoice, _) = compute(tx.as_mut(), scope, &card, period).await?;
        Ok(invoice)
    }

    /// Stored invoices of a card, oldest first
    pub async fn list_invoices(&self, scope: &Scope, card_id: Uuid) -> FynnessResult<Vec<Invoice>> {
        let mut tx = self.begin().await?;
        load_card(tx.as_mut(), scope, card_id).await?;
        Ok(tx.list_invoices(scope, Some(card_id)).await?)
    }

    /// Resum and store an invoice; idempotent
    pub async fn recompute_invoice(
        &self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
    ) -> FynnessResult<Invoice> {
        let mut tx = self.begin().await?;
        let card = load_card(tx.as_mut(), scope, card_id).await?;
        let invoice = recompute_in(tx.as_mut(), scope, &card, period).await?;

        let events = if invoice.paid {
            Vec::new()
        } else {
            vec![LedgerEvent::InvoiceRecomputed {
                card_id,
                period,
                total: invoice.total,
            }]
        };
        self.commit(tx, scope, events).await?;
        Ok(invoice)
    }

    /// Pay an invoice in one all-or-nothing transaction
    ///
    /// Creates the consolidated payment entry, marks the window's pending
    /// entries paid, marks the invoice paid and optionally appends the
    /// cash-flow row.
    pub async fn pay_invoice(
        &self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
        request: PayInvoiceRequest,
    ) -> FynnessResult<InvoicePayment> {
        let today = Self::today();
        let paid_at = request.paid_at.unwrap_or(today);
        let include_in_cash_flow = request
            .include_in_cash_flow
            .unwrap_or(self.settings.invoice_cash_flow_default);

        let mut tx = self.begin().await?;
        let card = load_card(tx.as_mut(), scope, card_id).await?;
        let (mut invoice, entries) = compute(tx.as_mut(), scope, &card, period).await?;

        if invoice.paid {
            return Err(ConflictError::InvoiceAlreadyPaid { card_id, period }.into());
        }
        if entries.is_empty() {
            return Err(ValidationError::EmptyInvoice { card_id, period }.into());
        }

        let mut payment_entry = LedgerEntry::new(
            &card.scope(),
            EntryKind::Payable,
            format!("Fatura {} {}", card.name, period),
            invoice.total,
            invoice.due_date,
        );
        payment_entry.category = Some("credit_card_invoice".to_string());
        payment_entry.status = EntryStatus::Paid;
        payment_entry.paid_at = Some(paid_at);
        payment_entry.in_cash_flow = include_in_cash_flow;
        payment_entry.invoice_ref = Some(invoice.id);
        tx.put_entry(&payment_entry).await?;

        let mut effects = Effects::new();
        effects.settling_invoice(card_id, period);
        let mut settled_entries = 0;
        for entry in entries.iter().filter(|e| e.is_pending()) {
            let mut paid = entry.clone();
            paid.status = EntryStatus::Paid;
            paid.paid_at = Some(paid_at);
            paid.touch();
            tx.put_entry(&paid).await?;
            effects.changed(entry, &paid);
            settled_entries += 1;
        }

        invoice.paid = true;
        invoice.paid_at = Some(paid_at);
        invoice.payment_entry_id = Some(payment_entry.id);
        invoice.materialized = true;
        invoice.updated_at = Utc::now();
        tx.put_invoice(&invoice).await?;

        let cash_flow = if include_in_cash_flow {
            let row = CashFlowRow::for_entry(&payment_entry);
            tx.put_cash_flow(&row).await?;
            Some(row)
        } else {
            None
        };

        effects.emit(LedgerEvent::InvoicePaid {
            card_id,
            period,
            total: invoice.total,
        });
        let events = effects.apply(tx.as_mut(), scope, today).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(
            card_id = %card_id,
            period = %period,
            total = %invoice.total,
            settled_entries,
            "invoice paid"
        );

        Ok(InvoicePayment {
            invoice,
            payment_entry,
            settled_entries,
            cash_flow,
        })
    }
}
