//! PostgreSQL storage backend using sqlx.
//!
//! Every record lives in a single `ledger_records` table: scope columns used
//! for filtering plus a JSONB `data` column holding the serialized record.
//! Transactions run at SERIALIZABLE isolation so concurrent read-modify-write
//! cycles on the same plan or invoice cannot lose updates.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! fynness = { version = "0.1", features = ["postgres"] }
//! ```

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::error::StorageError;
use crate::core::period::Period;
use crate::core::query::{CashFlowQuery, EntryQuery};
use crate::core::records::{
    Card, CashFlowRow, CostCenter, InstallmentPlan, Invoice, LedgerEntry, Partner,
    PartnerDrawRecord, RecurringDeduction,
};
use crate::core::scope::{Scope, Scoped};
use crate::core::store::{LedgerStore, LedgerTx};

const ENTRY: &str = "entry";
const PLAN: &str = "plan";
const CARD: &str = "card";
const INVOICE: &str = "invoice";
const PARTNER: &str = "partner";
const DEDUCTION: &str = "deduction";
const DRAW: &str = "draw";
const COST_CENTER: &str = "cost_center";
const CASH_FLOW: &str = "cash_flow";

/// Create the `ledger_records` table and its indexes if they don't exist
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ledger_records (
            kind TEXT NOT NULL,
            id UUID NOT NULL,
            user_id UUID NOT NULL,
            company_id UUID,
            data JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (kind, id)
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| anyhow!("Failed to create ledger_records table: {}", e))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ledger_records_scope
            ON ledger_records (kind, user_id, company_id)",
    )
    .execute(pool)
    .await
    .map_err(|e| anyhow!("Failed to create scope index: {}", e))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ledger_records_cash_flow_entry
            ON ledger_records ((data->>'entry_id')) WHERE kind = 'cash_flow'",
    )
    .execute(pool)
    .await
    .map_err(|e| anyhow!("Failed to create cash flow index: {}", e))?;

    Ok(())
}

/// Ledger store backed by PostgreSQL
#[derive(Clone, Debug)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Wrap an existing pool; the schema must already exist
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to PostgreSQL: {}", e))?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await.map_err(|e| StorageError::Transaction {
            message: e.to_string(),
        })?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Transaction {
                message: e.to_string(),
            })?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// Unit of work over [`PostgresLedgerStore`]
///
/// Dropping it without commit rolls the database transaction back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn query_error(e: sqlx::Error) -> StorageError {
    StorageError::Query {
        backend: "PostgreSQL",
        message: e.to_string(),
    }
}

impl PostgresTx {
    async fn fetch_one<T: DeserializeOwned>(
        &mut self,
        kind: &'static str,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<T>> {
        let data = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT data FROM ledger_records
             WHERE kind = $1 AND id = $2 AND user_id = $3
               AND ($4::uuid IS NULL OR company_id = $4)",
        )
        .bind(kind)
        .bind(id)
        .bind(scope.user_id)
        .bind(scope.company_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(query_error)?;

        data.map(|value| decode(kind, &id.to_string(), value))
            .transpose()
    }

    async fn fetch_all<T: DeserializeOwned>(
        &mut self,
        kind: &'static str,
        scope: &Scope,
    ) -> Result<Vec<T>> {
        let rows = sqlx::query_as::<_, (Uuid, serde_json::Value)>(
            "SELECT id, data FROM ledger_records
             WHERE kind = $1 AND user_id = $2
               AND ($3::uuid IS NULL OR company_id = $3)",
        )
        .bind(kind)
        .bind(scope.user_id)
        .bind(scope.company_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(query_error)?;

        rows.into_iter()
            .map(|(id, value)| decode(kind, &id.to_string(), value))
            .collect()
    }

    async fn upsert<T: Serialize + Scoped>(
        &mut self,
        kind: &'static str,
        id: Uuid,
        record: &T,
    ) -> Result<()> {
        let data = serde_json::to_value(record)
            .map_err(|e| anyhow!("Failed to serialize {} record: {}", kind, e))?;

        sqlx::query(
            "INSERT INTO ledger_records (kind, id, user_id, company_id, data, updated_at)
             VALUES ($1, $2, $3, $4, $5, now())
             ON CONFLICT (kind, id) DO UPDATE
             SET user_id = EXCLUDED.user_id,
                 company_id = EXCLUDED.company_id,
                 data = EXCLUDED.data,
                 updated_at = now()",
        )
        .bind(kind)
        .bind(id)
        .bind(record.user_id())
        .bind(record.company_id())
        .bind(data)
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn remove(&mut self, kind: &'static str, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM ledger_records WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    record: &'static str,
    key: &str,
    value: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        StorageError::Corrupt {
            record,
            key: key.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl LedgerTx for PostgresTx {
    async fn get_entry(&mut self, scope: &Scope, id: Uuid) -> Result<Option<LedgerEntry>> {
        self.fetch_one(ENTRY, scope, id).await
    }

    async fn find_entries(
        &mut self,
        scope: &Scope,
        query: &EntryQuery,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self.fetch_all(ENTRY, scope).await?;
        entries.retain(|e| query.matches(e));
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
        self.upsert(ENTRY, entry.id, entry).await
    }

    async fn delete_entry(&mut self, id: Uuid) -> Result<()> {
        self.remove(ENTRY, id).await
    }

    async fn get_plan(&mut self, scope: &Scope, id: Uuid) -> Result<Option<InstallmentPlan>> {
        self.fetch_one(PLAN, scope, id).await
    }

    async fn list_plans(&mut self, scope: &Scope) -> Result<Vec<InstallmentPlan>> {
        let mut plans: Vec<InstallmentPlan> = self.fetch_all(PLAN, scope).await?;
        plans.sort_by_key(|p| p.generated_at);
        Ok(plans)
    }

    async fn put_plan(&mut self, plan: &InstallmentPlan) -> Result<()> {
        self.upsert(PLAN, plan.id, plan).await
    }

    async fn delete_plan(&mut self, id: Uuid) -> Result<()> {
        self.remove(PLAN, id).await
    }

    async fn get_card(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Card>> {
        self.fetch_one(CARD, scope, id).await
    }

    async fn list_cards(&mut self, scope: &Scope) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self.fetch_all(CARD, scope).await?;
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn put_card(&mut self, card: &Card) -> Result<()> {
        self.upsert(CARD, card.id, card).await
    }

    async fn find_invoice(
        &mut self,
        scope: &Scope,
        card_id: Uuid,
        period: Period,
    ) -> Result<Option<Invoice>> {
        let invoices: Vec<Invoice> = self.fetch_all(INVOICE, scope).await?;
        Ok(invoices
            .into_iter()
            .find(|i| i.card_id == card_id && i.period == period))
    }

    async fn list_invoices(
        &mut self,
        scope: &Scope,
        card_id: Option<Uuid>,
    ) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.fetch_all(INVOICE, scope).await?;
        invoices.retain(|i| card_id.is_none_or(|card| i.card_id == card));
        invoices.sort_by_key(|i| (i.period, i.created_at));
        Ok(invoices)
    }

    async fn put_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.upsert(INVOICE, invoice.id, invoice).await
    }

    async fn get_partner(&mut self, scope: &Scope, id: Uuid) -> Result<Option<Partner>> {
        self.fetch_one(PARTNER, scope, id).await
    }

    async fn list_partners(&mut self, scope: &Scope) -> Result<Vec<Partner>> {
        let mut partners: Vec<Partner> = self.fetch_all(PARTNER, scope).await?;
        partners.sort_by_key(|p| p.created_at);
        Ok(partners)
    }

    async fn put_partner(&mut self, partner: &Partner) -> Result<()> {
        self.upsert(PARTNER, partner.id, partner).await
    }

    async fn list_deductions(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> Result<Vec<RecurringDeduction>> {
        let mut deductions: Vec<RecurringDeduction> = self.fetch_all(DEDUCTION, scope).await?;
        deductions.retain(|d| d.partner_id == partner_id);
        deductions.sort_by_key(|d| d.created_at);
        Ok(deductions)
    }

    async fn put_deduction(&mut self, deduction: &RecurringDeduction) -> Result<()> {
        self.upsert(DEDUCTION, deduction.id, deduction).await
    }

    async fn find_draw(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
        period: Period,
    ) -> Result<Option<PartnerDrawRecord>> {
        let draws: Vec<PartnerDrawRecord> = self.fetch_all(DRAW, scope).await?;
        Ok(draws
            .into_iter()
            .find(|d| d.partner_id == partner_id && d.period == period))
    }

    async fn list_draws(
        &mut self,
        scope: &Scope,
        partner_id: Uuid,
    ) -> Result<Vec<PartnerDrawRecord>> {
        let mut draws: Vec<PartnerDrawRecord> = self.fetch_all(DRAW, scope).await?;
        draws.retain(|d| d.partner_id == partner_id);
        draws.sort_by_key(|d| d.period);
        Ok(draws)
    }

    async fn put_draw(&mut self, draw: &PartnerDrawRecord) -> Result<()> {
        self.upsert(DRAW, draw.id, draw).await
    }

    async fn find_cost_center(&mut self, scope: &Scope, code: &str) -> Result<Option<CostCenter>> {
        let centers: Vec<CostCenter> = self.fetch_all(COST_CENTER, scope).await?;
        Ok(centers.into_iter().find(|c| c.code == code))
    }

    async fn list_cost_centers(&mut self, scope: &Scope) -> Result<Vec<CostCenter>> {
        let mut centers: Vec<CostCenter> = self.fetch_all(COST_CENTER, scope).await?;
        centers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(centers)
    }

    async fn put_cost_center(&mut self, cost_center: &CostCenter) -> Result<()> {
        self.upsert(COST_CENTER, cost_center.id, cost_center).await
    }

    async fn find_cash_flow(
        &mut self,
        scope: &Scope,
        query: &CashFlowQuery,
    ) -> Result<Vec<CashFlowRow>> {
        let mut rows: Vec<CashFlowRow> = self.fetch_all(CASH_FLOW, scope).await?;
        rows.retain(|r| query.matches(r));
        rows.sort_by_key(|r| (r.date, r.created_at));
        Ok(rows)
    }

    async fn put_cash_flow(&mut self, row: &CashFlowRow) -> Result<()> {
        self.upsert(CASH_FLOW, row.id, row).await
    }

    async fn delete_cash_flow_for_entry(&mut self, entry_id: Uuid) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM ledger_records WHERE kind = $1 AND data->>'entry_id' = $2",
        )
        .bind(CASH_FLOW)
        .bind(entry_id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(query_error)?;
        Ok(result.rows_affected() as usize)
    }

    async fn scopes(&mut self) -> Result<Vec<Scope>> {
        let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            "SELECT DISTINCT user_id, company_id FROM ledger_records
             ORDER BY user_id, company_id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|(user_id, company_id)| Scope {
                user_id,
                company_id,
            })
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            StorageError::Transaction {
                message: e.to_string(),
            }
            .into()
        })
    }
}
