//! Installment plans ("parcelamentos")
//!
//! A plan is one header entry representing the whole purchase plus N child
//! entries, one per month. The header never feeds any aggregate; the children
//! do. The header amount always equals the sum of the live children.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{ConflictError, FynnessError, FynnessResult};
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::period::add_months;
use crate::core::query::EntryQuery;
use crate::core::records::{
    EntryKind, EntryStatus, InstallmentPlan, LedgerEntry, PlanChangeKind,
};
use crate::core::scope::Scope;
use crate::core::store::LedgerTx;
use crate::ledger::effects::Effects;
use crate::ledger::{LedgerService, check_references, load_plan};

fn default_kind() -> EntryKind {
    EntryKind::Payable
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlanRequest {
    #[serde(default = "default_kind")]
    pub kind: EntryKind,
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    pub total: Decimal,
    /// Signed so that zero and negative counts reach validation
    pub count: i64,
    pub first_due_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub card_id: Option<Uuid>,
    #[serde(default)]
    pub partner_id: Option<Uuid>,
    #[serde(default)]
    pub cost_center: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInstallmentRequest {
    pub amount: Decimal,
}

/// A plan with its header and installments ordered by index
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub plan: InstallmentPlan,
    pub header: LedgerEntry,
    pub installments: Vec<LedgerEntry>,
}

/// Expand a plan request into the plan record, its header and its children
///
/// Due dates advance one calendar month per installment from the first due
/// date, clamping the day to short months. Remainder cents land on the last
/// installment so the children always sum to the total.
pub fn expand_plan(
    scope: &Scope,
    request: &PlanRequest,
    max_installments: u32,
) -> FynnessResult<PlanView> {
    request.validate()?;
    let total = money::positive_amount("total", request.total)?;
    if request.count <= 0 {
        return Err(FynnessError::field(
            "count",
            format!("must be at least 1 (got {})", request.count),
        ));
    }
    if request.count > i64::from(max_installments) {
        return Err(FynnessError::field(
            "count",
            format!("must be at most {} (got {})", max_installments, request.count),
        ));
    }
    let count = u32::try_from(request.count)
        .map_err(|_| FynnessError::field("count", "out of range"))?;
    let amounts = money::split_evenly(total, count)?;

    let plan_id = Uuid::new_v4();
    let mut header = LedgerEntry::new(
        scope,
        request.kind,
        request.description.clone(),
        total,
        request.first_due_date,
    );
    header.plan_id = Some(plan_id);
    header.installment_total = Some(count);
    tag(&mut header, request);

    let mut installments = Vec::with_capacity(amounts.len());
    for (offset, amount) in (0u32..).zip(amounts) {
        let index = offset + 1;
        let mut child = LedgerEntry::new(
            scope,
            request.kind,
            format!("{} ({}/{})", request.description, index, count),
            amount,
            add_months(request.first_due_date, offset)?,
        );
        child.plan_id = Some(plan_id);
        child.parent_id = Some(header.id);
        child.installment_index = Some(index);
        child.installment_total = Some(count);
        tag(&mut child, request);
        installments.push(child);
    }

    let now = Utc::now();
    let mut plan = InstallmentPlan {
        id: plan_id,
        user_id: scope.user_id,
        company_id: scope.company_id,
        header_id: header.id,
        description: request.description.clone(),
        total,
        count,
        first_due_date: request.first_due_date,
        generated_at: now,
        updated_at: now,
        history: Vec::new(),
    };
    plan.record(PlanChangeKind::Generated, None, None, total);

    Ok(PlanView {
        plan,
        header,
        installments,
    })
}

fn tag(entry: &mut LedgerEntry, request: &PlanRequest) {
    entry.category = request.category.clone();
    entry.counterparty = request.counterparty.clone();
    entry.card_id = request.card_id;
    entry.partner_id = request.partner_id;
    entry.cost_center = request.cost_center.clone();
}

/// Sum of a plan's live installments
pub(crate) fn plan_total(members: &[LedgerEntry]) -> Decimal {
    money::sum(
        members
            .iter()
            .filter(|e| e.is_installment() && e.counts_toward_aggregates())
            .map(|e| e.amount),
    )
}

/// Resum the header after one installment changed amount
pub(crate) async fn installment_amount_changed(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    before: &LedgerEntry,
    after: &LedgerEntry,
) -> FynnessResult<()> {
    let (Some(plan_id), Some(header_id)) = (after.plan_id, after.parent_id) else {
        return Ok(());
    };
    let mut plan = load_plan(tx, scope, plan_id).await?;
    let members = tx.find_entries(scope, &EntryQuery::for_plan(plan_id)).await?;
    let total = plan_total(&members);

    plan.record(
        PlanChangeKind::InstallmentAmountChanged,
        after.installment_index,
        Some(before.amount),
        after.amount,
    );
    if total != plan.total {
        plan.record(PlanChangeKind::TotalRecomputed, None, Some(plan.total), total);
        plan.total = total;
    }
    tx.put_plan(&plan).await?;

    if let Some(mut header) = members.into_iter().find(|e| e.id == header_id) {
        header.amount = total;
        header.touch();
        tx.put_entry(&header).await?;
    }
    Ok(())
}

async fn load_view(tx: &mut dyn LedgerTx, scope: &Scope, plan_id: Uuid) -> FynnessResult<PlanView> {
    let plan = load_plan(tx, scope, plan_id).await?;
    let members = tx.find_entries(scope, &EntryQuery::for_plan(plan_id)).await?;

    let mut header = None;
    let mut installments = Vec::with_capacity(members.len());
    for entry in members {
        if entry.id == plan.header_id {
            header = Some(entry);
        } else if entry.is_installment() {
            installments.push(entry);
        }
    }
    installments.sort_by_key(|e| e.installment_index);
    let header = header.ok_or_else(|| FynnessError::not_found("entry", plan.header_id))?;

    Ok(PlanView {
        plan,
        header,
        installments,
    })
}

impl LedgerService {
    /// Expand and persist a plan atomically
    pub async fn create_plan(&self, scope: &Scope, request: PlanRequest) -> FynnessResult<PlanView> {
        let view = expand_plan(scope, &request, self.settings.max_installments)?;

        let mut tx = self.begin().await?;
        check_references(
            tx.as_mut(),
            scope,
            request.card_id,
            request.partner_id,
            request.cost_center.as_deref(),
        )
        .await?;

        tx.put_plan(&view.plan).await?;
        tx.put_entry(&view.header).await?;
        let mut effects = Effects::new();
        for child in &view.installments {
            tx.put_entry(child).await?;
            effects.added(child);
        }
        effects.emit(LedgerEvent::PlanCreated {
            plan_id: view.plan.id,
            installments: view.plan.count,
        });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(
            plan_id = %view.plan.id,
            total = %view.plan.total,
            installments = view.plan.count,
            "installment plan created"
        );
        Ok(view)
    }

    pub async fn get_plan(&self, scope: &Scope, plan_id: Uuid) -> FynnessResult<PlanView> {
        let mut tx = self.begin().await?;
        load_view(tx.as_mut(), scope, plan_id).await
    }

    /// Installments of a plan ordered by index
    pub async fn list_installments(
        &self,
        scope: &Scope,
        plan_id: Uuid,
    ) -> FynnessResult<Vec<LedgerEntry>> {
        Ok(self.get_plan(scope, plan_id).await?.installments)
    }

    /// Delete a plan with its header and installments
    ///
    /// Refused while any installment is paid.
    pub async fn delete_plan(&self, scope: &Scope, plan_id: Uuid) -> FynnessResult<()> {
        let mut tx = self.begin().await?;
        let plan = load_plan(tx.as_mut(), scope, plan_id).await?;
        let query = EntryQuery {
            include_deleted: true,
            ..EntryQuery::for_plan(plan_id)
        };
        let members = tx.find_entries(scope, &query).await?;

        let paid = members
            .iter()
            .filter(|e| e.is_installment() && e.is_paid())
            .count();
        if paid > 0 {
            return Err(ConflictError::PlanHasPaidInstallments { plan_id, paid }.into());
        }

        let mut effects = Effects::new();
        for entry in &members {
            tx.delete_entry(entry.id).await?;
            tx.delete_cash_flow_for_entry(entry.id).await?;
            effects.removed(entry);
        }
        tx.delete_plan(plan.id).await?;

        effects.emit(LedgerEvent::PlanDeleted { plan_id });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(plan_id = %plan_id, entries = members.len(), "installment plan deleted");
        Ok(())
    }

    /// Change one pending installment's amount; the header total follows
    pub async fn update_installment(
        &self,
        scope: &Scope,
        plan_id: Uuid,
        index: u32,
        request: UpdateInstallmentRequest,
    ) -> FynnessResult<PlanView> {
        let amount = money::positive_amount("amount", request.amount)?;

        let mut tx = self.begin().await?;
        let view = load_view(tx.as_mut(), scope, plan_id).await?;
        let before = view
            .installments
            .into_iter()
            .find(|e| e.installment_index == Some(index))
            .ok_or_else(|| FynnessError::not_found("installment", format!("{}/{}", plan_id, index)))?;

        if before.status != EntryStatus::Pending {
            return Err(ConflictError::InvalidTransition {
                entry_id: before.id,
                status: before.status.to_string(),
                action: "updated",
            }
            .into());
        }

        let mut after = before.clone();
        after.amount = amount;
        after.touch();
        tx.put_entry(&after).await?;
        installment_amount_changed(tx.as_mut(), scope, &before, &after).await?;

        let mut effects = Effects::new();
        effects.changed(&before, &after);
        effects.emit(LedgerEvent::EntryUpdated { entry_id: after.id });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;

        let view = load_view(tx.as_mut(), scope, plan_id).await?;
        self.commit(tx, scope, events).await?;
        Ok(view)
    }
}
