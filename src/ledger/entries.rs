//! Single-entry management: create, read, list, update, delete

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{ConflictError, FynnessError, FynnessResult, ValidationError};
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::query::{CashFlowQuery, EntryQuery, PageParams, PaginatedResponse};
use crate::core::records::{EntryKind, LedgerEntry};
use crate::core::scope::Scope;
use crate::ledger::effects::Effects;
use crate::ledger::installments::installment_amount_changed;
use crate::ledger::{LedgerService, check_references, load_entry};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEntryRequest {
    pub kind: EntryKind,
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
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

/// Partial update; `null` clears an optional field, absence leaves it alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateEntryRequest {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    #[serde(deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub counterparty: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub card_id: Option<Option<Uuid>>,
    #[serde(deserialize_with = "nullable")]
    pub partner_id: Option<Option<Uuid>>,
    #[serde(deserialize_with = "nullable")]
    pub cost_center: Option<Option<String>>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateEntryRequest {
    fn changes_schedule(&self) -> bool {
        self.amount.is_some() || self.due_date.is_some()
    }

    fn validate(&self) -> FynnessResult<()> {
        if let Some(description) = &self.description {
            let len = description.chars().count();
            if !(1..=200).contains(&len) {
                return Err(FynnessError::field(
                    "description",
                    "must be between 1 and 200 characters",
                ));
            }
        }
        if let Some(amount) = self.amount {
            money::positive_amount("amount", amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub id: Uuid,
    /// Kept with `deleted_at` set because cash-flow rows reference it
    pub soft: bool,
    /// The entry was a plan header and the whole plan went with it
    pub plan_deleted: bool,
}

impl LedgerService {
    pub async fn create_entry(
        &self,
        scope: &Scope,
        request: CreateEntryRequest,
    ) -> FynnessResult<LedgerEntry> {
        request.validate()?;
        let amount = money::positive_amount("amount", request.amount)?;

        let mut tx = self.begin().await?;
        check_references(
            tx.as_mut(),
            scope,
            request.card_id,
            request.partner_id,
            request.cost_center.as_deref(),
        )
        .await?;

        let mut entry = LedgerEntry::new(
            scope,
            request.kind,
            request.description,
            amount,
            request.due_date,
        );
        entry.category = request.category;
        entry.counterparty = request.counterparty;
        entry.card_id = request.card_id;
        entry.partner_id = request.partner_id;
        entry.cost_center = request.cost_center;
        tx.put_entry(&entry).await?;

        let mut effects = Effects::new();
        effects.added(&entry);
        effects.emit(LedgerEvent::EntryCreated { entry_id: entry.id });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;
        self.commit(tx, scope, events).await?;

        tracing::debug!(entry_id = %entry.id, amount = %entry.amount, "entry created");
        Ok(entry)
    }

    pub async fn get_entry(&self, scope: &Scope, id: Uuid) -> FynnessResult<LedgerEntry> {
        let mut tx = self.begin().await?;
        load_entry(tx.as_mut(), scope, id).await
    }

    pub async fn list_entries(
        &self,
        scope: &Scope,
        query: EntryQuery,
        page: PageParams,
    ) -> FynnessResult<PaginatedResponse<LedgerEntry>> {
        query.validate()?;
        let mut tx = self.begin().await?;
        let entries = tx.find_entries(scope, &query).await?;
        Ok(page.paginate(entries))
    }

    /// Edit a pending entry
    ///
    /// Paid entries change only through reversal. A plan header's amount and
    /// due date follow its installments and cannot be edited directly.
    pub async fn update_entry(
        &self,
        scope: &Scope,
        id: Uuid,
        request: UpdateEntryRequest,
    ) -> FynnessResult<LedgerEntry> {
        request.validate()?;

        let mut tx = self.begin().await?;
        let before = load_entry(tx.as_mut(), scope, id).await?;

        if before.is_plan_header() && request.changes_schedule() {
            return Err(ValidationError::PlanHeaderImmutable {
                entry_id: id,
                action: "update",
            }
            .into());
        }
        if !before.is_pending() {
            return Err(ConflictError::InvalidTransition {
                entry_id: id,
                status: before.status.to_string(),
                action: "updated",
            }
            .into());
        }

        check_references(
            tx.as_mut(),
            scope,
            request.card_id.flatten(),
            request.partner_id.flatten(),
            request.cost_center.clone().flatten().as_deref(),
        )
        .await?;

        let mut entry = before.clone();
        if let Some(description) = request.description {
            entry.description = description;
        }
        if let Some(amount) = request.amount {
            entry.amount = money::positive_amount("amount", amount)?;
        }
        if let Some(due_date) = request.due_date {
            entry.due_date = due_date;
        }
        if let Some(category) = request.category {
            entry.category = category;
        }
        if let Some(counterparty) = request.counterparty {
            entry.counterparty = counterparty;
        }
        if let Some(card_id) = request.card_id {
            entry.card_id = card_id;
        }
        if let Some(partner_id) = request.partner_id {
            entry.partner_id = partner_id;
        }
        if let Some(cost_center) = request.cost_center {
            entry.cost_center = cost_center;
        }
        entry.touch();
        tx.put_entry(&entry).await?;

        if entry.is_installment() && entry.amount != before.amount {
            installment_amount_changed(tx.as_mut(), scope, &before, &entry).await?;
        }

        let mut effects = Effects::new();
        effects.changed(&before, &entry);
        effects.emit(LedgerEvent::EntryUpdated { entry_id: id });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;
        self.commit(tx, scope, events).await?;
        Ok(entry)
    }

    /// Delete an entry
    ///
    /// Entries referenced by cash-flow rows are soft-deleted. Installments
    /// go only with their plan; deleting a plan header deletes the plan.
    pub async fn delete_entry(&self, scope: &Scope, id: Uuid) -> FynnessResult<DeleteOutcome> {
        let mut tx = self.begin().await?;
        let before = load_entry(tx.as_mut(), scope, id).await?;

        if before.is_plan_header() {
            let plan_id = before.plan_id.ok_or_else(|| {
                FynnessError::Internal(format!("plan header '{}' has no plan id", id))
            })?;
            drop(tx);
            self.delete_plan(scope, plan_id).await?;
            return Ok(DeleteOutcome {
                id,
                soft: false,
                plan_deleted: true,
            });
        }
        if let (Some(plan_id), Some(index)) = (before.plan_id, before.installment_index) {
            return Err(ConflictError::InstallmentNotDeletable {
                entry_id: id,
                plan_id,
                index,
            }
            .into());
        }
        if let Some(invoice_id) = before.invoice_ref {
            return Err(ConflictError::SettlesInvoice {
                entry_id: id,
                invoice_id,
                action: "deleted",
            }
            .into());
        }
        if let Some(draw_id) = before.draw_ref {
            return Err(ConflictError::SettlesDraw {
                entry_id: id,
                draw_id,
                action: "deleted",
            }
            .into());
        }

        let referenced = !tx
            .find_cash_flow(scope, &CashFlowQuery::for_entry(id))
            .await?
            .is_empty();

        let mut effects = Effects::new();
        if referenced {
            let mut entry = before.clone();
            entry.deleted_at = Some(Utc::now());
            entry.touch();
            tx.put_entry(&entry).await?;
            effects.changed(&before, &entry);
        } else {
            tx.delete_entry(id).await?;
            effects.removed(&before);
        }

        effects.emit(LedgerEvent::EntryDeleted {
            entry_id: id,
            soft: referenced,
        });
        let events = effects.apply(tx.as_mut(), scope, Self::today()).await?;
        self.commit(tx, scope, events).await?;

        tracing::info!(entry_id = %id, soft = referenced, "entry deleted");
        Ok(DeleteOutcome {
            id,
            soft: referenced,
            plan_deleted: false,
        })
    }
}
