//! Cost centers and the realized cash-flow ledger

use chrono::Utc;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{ConflictError, FynnessError, FynnessResult};
use crate::core::money;
use crate::core::query::{CashFlowQuery, EntryQuery};
use crate::core::records::{CashFlowDirection, CashFlowRow, CostCenter, CostCenterKind};
use crate::core::scope::Scope;
use crate::core::store::LedgerTx;
use crate::ledger::LedgerService;

fn validate_code(code: &str) -> Result<(), validator::ValidationError> {
    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Z0-9][A-Z0-9._-]{0,31}$").expect("cost center code pattern")
    });
    if regex.is_match(code) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("code");
        err.message = Some("must be 1-32 uppercase letters, digits, '.', '_' or '-'".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCostCenterRequest {
    #[validate(custom(function = "validate_code"))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub kind: CostCenterKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CashFlowSummary {
    pub inflow: Decimal,
    pub outflow: Decimal,
    /// Inflow minus outflow
    pub net: Decimal,
}

impl CashFlowSummary {
    pub fn of(rows: &[CashFlowRow]) -> Self {
        let total = |direction: CashFlowDirection| {
            money::sum(
                rows.iter()
                    .filter(|r| r.direction == direction)
                    .map(|r| r.amount),
            )
        };
        let inflow = total(CashFlowDirection::Inflow);
        let outflow = total(CashFlowDirection::Outflow);
        Self {
            inflow,
            outflow,
            net: inflow - outflow,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowReport {
    pub rows: Vec<CashFlowRow>,
    pub summary: CashFlowSummary,
}

/// Projected and actual totals of `code`, summed from its tagged entries
pub(crate) async fn totals_in(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    code: &str,
) -> FynnessResult<(Decimal, Decimal)> {
    let entries = tx
        .find_entries(scope, &EntryQuery::for_cost_center(code))
        .await?;
    let projected = money::sum(entries.iter().map(|e| e.amount));
    let actual = money::sum(
        entries
            .iter()
            .filter(|e| e.is_paid())
            .map(|e| e.settled_amount()),
    );
    Ok((projected, actual))
}

impl LedgerService {
    pub async fn create_cost_center(
        &self,
        scope: &Scope,
        request: CreateCostCenterRequest,
    ) -> FynnessResult<CostCenter> {
        request.validate()?;

        let mut tx = self.begin().await?;
        if tx.find_cost_center(scope, &request.code).await?.is_some() {
            return Err(ConflictError::Duplicate {
                record: "cost center",
                key: request.code,
            }
            .into());
        }

        let now = Utc::now();
        let center = CostCenter {
            id: Uuid::new_v4(),
            user_id: scope.user_id,
            company_id: scope.company_id,
            code: request.code,
            name: request.name,
            kind: request.kind,
            projected_total: Decimal::ZERO,
            actual_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        tx.put_cost_center(&center).await?;
        self.commit(tx, scope, Vec::new()).await?;

        tracing::debug!(code = %center.code, "cost center created");
        Ok(center)
    }

    pub async fn list_cost_centers(&self, scope: &Scope) -> FynnessResult<Vec<CostCenter>> {
        let mut tx = self.begin().await?;
        let mut centers = tx.list_cost_centers(scope).await?;
        centers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(centers)
    }

    pub async fn get_cost_center(&self, scope: &Scope, code: &str) -> FynnessResult<CostCenter> {
        let mut tx = self.begin().await?;
        tx.find_cost_center(scope, code)
            .await?
            .ok_or_else(|| FynnessError::not_found("cost center", code))
    }

    /// Realized movements in a date range with their totals
    pub async fn cash_flow(
        &self,
        scope: &Scope,
        query: CashFlowQuery,
    ) -> FynnessResult<CashFlowReport> {
        query.validate()?;
        let mut tx = self.begin().await?;
        let rows = tx.find_cash_flow(scope, &query).await?;
        let summary = CashFlowSummary::of(&rows);
        Ok(CashFlowReport { rows, summary })
    }
}
