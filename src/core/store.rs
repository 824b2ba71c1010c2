//! Storage traits for the ledger core
//!
//! A [`LedgerStore`] hands out [`LedgerTx`] units of work. Everything read and
//! written through one transaction commits together or not at all: dropping a
//! transaction without calling [`LedgerTx::commit`] discards its writes.
//!
//! Reads inside a transaction observe authoritative state, so aggregates
//! recomputed inside the same transaction that stores them cannot be based on
//! a stale snapshot.
//!
//! Reads are scoped: a record outside the scope is reported as absent. Writes
//! and deletes take records or ids the caller already loaded through a scoped
//! read.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::core::period::Period;
use crate::core::query::{CashFlowQuery, EntryQuery};
use crate::core::records::{
    Card, CashFlowRow, CostCenter, InstallmentPlan, Invoice, LedgerEntry, Partner,
    PartnerDrawRecord, RecurringDeduction,
};
use crate::core::scope::Scope;

/// Factory of transactions over the persistent ledger state
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Start a new unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;
}

/// One all-or-nothing unit of work
#[async_trait]
pub trait LedgerTx: Send {
    // === Entries ===

    async fn get_entry(&mut self, scope: &Scope, id: Uuid) -> Result<Option<LedgerEntry>>;

    /// Entries matching `query`, ordered by due date then installment index
    async fn find_entries(&mut self, scope: &Scope, query: &EntryQuery)
    -> Result<Vec<LedgerEntry>>;

    async fn put_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    async fn delete_entry(&mut self, id: Uuid) -> Result<()>;

    // === Installment plans ===

    async fn get_plan(&mut self, scope: &Scope, id: Uuid) -> Result<Option<InstallmentPlan>>;

    async fn list_plans(&mut self, scope: &Scope) -> Result<Vec<InstallmentPlan>>;

    async fn put_plan(&mut self, plan: &InstallmentPlan) -> Result<()>;

    async fn delete_plan(&mut self, id: Uuid) -> Result<()>;

    // === Cards and invoices ===

    async fn get_card(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Card>>;

    async fn list_cards(&mut self, scope: &Scope) -> Result<Vec<Card>>;

    async fn put_card(&mut self, card: &Card) -> Result<()>;

    async fn find_invoice(
        &mut self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
    ) -> Result<Option<Invoice>>;

    /// Stored invoices, optionally restricted to one card
    async fn list_invoices(&mut self, scope: &Scope, card_id: Option<Uuid>)
    -> Result<Vec<Invoice>>;

    async fn put_invoice(&mut self, invoice: &Invoice) -> Result<()>;

    // === Partners, deductions and draws ===

    async fn get_partner(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Partner>>;

    async fn list_partners(&mut self, scope: &Scope) -> Result<Vec<Partner>>;

    async fn put_partner(&mut self, partner: &Partner) -> Result<()>;

    async fn list_deductions(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> Result<Vec<RecurringDeduction>>;

    async fn put_deduction(&mut self, deduction: &RecurringDeduction) -> Result<()>;

    async fn find_draw(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
    ) -> Result<Option<PartnerDrawRecord>>;

    /// Stored draw records of a partner, oldest period first
    async fn list_draws(&mut self, scope: &Scope, partner_id: Uuid)
    -> Result<Vec<PartnerDrawRecord>>;

    async fn put_draw(&mut self, draw: &PartnerDrawRecord) -> Result<()>;

    // === Cost centers ===

    async fn find_cost_center(&mut self, scope: &Scope, code: &str) -> Result<Option<CostCenter>>;

    async fn list_cost_centers(&mut self, scope: &Scope) -> Result<Vec<CostCenter>>;

    async fn put_cost_center(&mut self, cost_center: &CostCenter) -> Result<()>;

    // === Cash flow ===

    /// Rows matching `query`, ordered by date
    async fn find_cash_flow(
        &mut self,
        scope: &Scope,
        query: &CashFlowQuery,
    ) -> Result<Vec<CashFlowRow>>;

    async fn put_cash_flow(&mut self, row: &CashFlowRow) -> Result<()>;

    /// Remove every row keyed to `entry_id`; returns how many were removed
    async fn delete_cash_flow_for_entry(&mut self, entry_id: Uuid) -> Result<usize>;

    // === Maintenance ===

    /// Every scope that owns at least one record
    async fn scopes(&mut self) -> Result<Vec<Scope>>;

    /// Make every write of this transaction durable
    async fn commit(self: Box<Self>) -> Result<()>;
}
