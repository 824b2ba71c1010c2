//! In-memory implementation of LedgerStore for testing and development

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::period::Period;
use crate::core::query::{CashFlowQuery, EntryQuery};
use crate::core::records::{
    Card, CashFlowRow, CostCenter, InstallmentPlan, Invoice, LedgerEntry, Partner,
    PartnerDrawRecord, RecurringDeduction,
};
use crate::core::scope::{Scope, Scoped};
use crate::core::store::{LedgerStore, LedgerTx};

/// Every record of the ledger, keyed by id
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    entries: HashMap<Uuid, LedgerEntry>,
    plans: HashMap<Uuid, InstallmentPlan>,
    cards: HashMap<Uuid, Card>,
    invoices: HashMap<Uuid, Invoice>,
    partners: HashMap<Uuid, Partner>,
    deductions: HashMap<Uuid, RecurringDeduction>,
    draws: HashMap<Uuid, PartnerDrawRecord>,
    cost_centers: HashMap<Uuid, CostCenter>,
    cash_flow: HashMap<Uuid, CashFlowRow>,
}

fn owned<'a, R, I>(scope: &'a Scope, records: I) -> impl Iterator<Item = &'a R> + 'a
where
    R: Scoped + 'a,
    I: IntoIterator<Item = &'a R> + 'a,
{
    records.into_iter().filter(move |r| scope.owns_record(*r))
}

/// In-memory ledger store
///
/// A transaction holds the state lock for its whole lifetime, so
/// read-modify-write cycles never interleave. The first write copies the
/// state; commit swaps the copy in and a dropped transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx { guard, work: None }))
    }
}

/// Unit of work over [`InMemoryLedgerStore`]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    /// Copy-on-write working state; `None` until the first write
    work: Option<LedgerState>,
}

impl InMemoryTx {
    fn state(&self) -> &LedgerState {
        self.work.as_ref().unwrap_or(&*self.guard)
    }

    fn state_mut(&mut self) -> &mut LedgerState {
        let committed: &LedgerState = &self.guard;
        self.work.get_or_insert_with(|| LedgerState::clone(committed))
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn get_entry(&mut self, scope: &Scope, id: Uuid) -> Result<Option<LedgerEntry>> {
        Ok(self
            .state()
            .entries
            .get(&id)
            .filter(|e| scope.owns_record(*e))
            .cloned())
    }

    async fn find_entries(
        &mut self,
        scope: &Scope,
        query: &EntryQuery,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = owned(scope, self.state().entries.values())
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            (a.due_date, a.installment_index, a.created_at).cmp(&(
                b.due_date,
                b.installment_index,
                b.created_at,
            ))
        });
        Ok(entries)
    }

    async fn put_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.state_mut().entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_entry(&mut self, id: Uuid) -> Result<()> {
        self.state_mut().entries.remove(&id);
        Ok(())
    }

    async fn get_plan(&mut self, scope: &Scope, id: Uuid) -> Result<Option<InstallmentPlan>> {
        Ok(self
            .state()
            .plans
            .get(&id)
            .filter(|p| scope.owns_record(*p))
            .cloned())
    }

    async fn list_plans(&mut self, scope: &Scope) -> Result<Vec<InstallmentPlan>> {
        let mut plans: Vec<InstallmentPlan> =
            owned(scope, self.state().plans.values()).cloned().collect();
        plans.sort_by_key(|p| p.generated_at);
        Ok(plans)
    }

    async fn put_plan(&mut self, plan: &InstallmentPlan) -> Result<()> {
        self.state_mut().plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn delete_plan(&mut self, id: Uuid) -> Result<()> {
        self.state_mut().plans.remove(&id);
        Ok(())
    }

    async fn get_card(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Card>> {
        Ok(self
            .state()
            .cards
            .get(&id)
            .filter(|c| scope.owns_record(*c))
            .cloned())
    }

    async fn list_cards(&mut self, scope: &Scope) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = owned(scope, self.state().cards.values()).cloned().collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn put_card(&mut self, card: &Card) -> Result<()> {
        self.state_mut().cards.insert(card.id, card.clone());
        Ok(())
    }

    async fn find_invoice(
        &mut self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
    ) -> Result<Option<Invoice>> {
        Ok(owned(scope, self.state().invoices.values())
            .find(|i| i.card_id == card_id && i.period == period)
            .cloned())
    }

    async fn list_invoices(
        &mut self,
        scope: &Scope,
        card_id: Option<Uuid>,
    ) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = owned(scope, self.state().invoices.values())
            .filter(|i| card_id.is_none_or(|card| i.card_id == card))
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.period, i.created_at));
        Ok(invoices)
    }

    async fn put_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.state_mut().invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get_partner(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Partner>> {
        Ok(self
            .state()
            .partners
            .get(&id)
            .filter(|p| scope.owns_record(*p))
            .cloned())
    }

    async fn list_partners(&mut self, scope: &Scope) -> Result<Vec<Partner>> {
        let mut partners: Vec<Partner> =
            owned(scope, self.state().partners.values()).cloned().collect();
        partners.sort_by_key(|p| p.created_at);
        Ok(partners)
    }

    async fn put_partner(&mut self, partner: &Partner) -> Result<()> {
        self.state_mut().partners.insert(partner.id, partner.clone());
        Ok(())
    }

    async fn list_deductions(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> Result<Vec<RecurringDeduction>> {
        let mut deductions: Vec<RecurringDeduction> = owned(scope, self.state().deductions.values())
            .filter(|d| d.partner_id == partner_id)
            .cloned()
            .collect();
        deductions.sort_by_key(|d| d.created_at);
        Ok(deductions)
    }

    async fn put_deduction(&mut self, deduction: &RecurringDeduction) -> Result<()> {
        self.state_mut().deductions.insert(deduction.id, deduction.clone());
        Ok(())
    }

    async fn find_draw(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
    ) -> Result<Option<PartnerDrawRecord>> {
        Ok(owned(scope, self.state().draws.values())
            .find(|d| d.partner_id == partner_id && d.period == period)
            .cloned())
    }

    async fn list_draws(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> Result<Vec<PartnerDrawRecord>> {
        let mut draws: Vec<PartnerDrawRecord> = owned(scope, self.state().draws.values())
            .filter(|d| d.partner_id == partner_id)
            .cloned()
            .collect();
        draws.sort_by_key(|d| d.period);
        Ok(draws)
    }

    async fn put_draw(&mut self, draw: &PartnerDrawRecord) -> Result<()> {
        self.state_mut().draws.insert(draw.id, draw.clone());
        Ok(())
    }

    async fn find_cost_center(&mut self, scope: &Scope, code: &str) -> Result<Option<CostCenter>> {
        Ok(owned(scope, self.state().cost_centers.values())
            .find(|c| c.code == code)
            .cloned())
    }

    async fn list_cost_centers(&mut self, scope: &Scope) -> Result<Vec<CostCenter>> {
        let mut centers: Vec<CostCenter> =
            owned(scope, self.state().cost_centers.values()).cloned().collect();
        centers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(centers)
    }

    async fn put_cost_center(&mut self, cost_center: &CostCenter) -> Result<()> {
        self.state_mut()
            .cost_centers
            .insert(cost_center.id, cost_center.clone());
        Ok(())
    }

    async fn find_cash_flow(
        &mut self,
        scope: &Scope,
        query: &CashFlowQuery,
    ) -> Result<Vec<CashFlowRow>> {
        let mut rows: Vec<CashFlowRow> = owned(scope, self.state().cash_flow.values())
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.date, r.created_at));
        Ok(rows)
    }

    async fn put_cash_flow(&mut self, row: &CashFlowRow) -> Result<()> {
        self.state_mut().cash_flow.insert(row.id, row.clone());
        Ok(())
    }

    async fn delete_cash_flow_for_entry(&mut self, entry_id: Uuid) -> Result<usize> {
        let rows = &mut self.state_mut().cash_flow;
        let before = rows.len();
        rows.retain(|_, row| row.entry_id != entry_id);
        Ok(before - rows.len())
    }

    async fn scopes(&mut self) -> Result<Vec<Scope>> {
        let state = self.state();
        let scopes: BTreeSet<Scope> = state
            .entries
            .values()
            .map(Scoped::scope)
            .chain(state.plans.values().map(Scoped::scope))
            .chain(state.cards.values().map(Scoped::scope))
            .chain(state.invoices.values().map(Scoped::scope))
            .chain(state.partners.values().map(Scoped::scope))
            .chain(state.cost_centers.values().map(Scoped::scope))
            .collect();
        Ok(scopes.into_iter().collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, work } = *self;
        if let Some(work) = work {
            *guard = work;
        }
        Ok(())
    }
}
