//! Reconciliation sweep
//!
//! Recomputes stored aggregates from their entries and corrects the ones that
//! drifted beyond `ledger.drift_tolerance`. Each aggregate is checked and
//! corrected in its own transaction, so the sweep can run next to live
//! traffic. Running it twice in a row corrects nothing the second time.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::core::error::FynnessResult;
use crate::core::events::LedgerEvent;
use crate::core::money;
use crate::core::query::EntryQuery;
use crate::core::records::PlanChangeKind;
use crate::core::scope::{Scope, Scoped};
use crate::ledger::cost_centers::totals_in;
use crate::ledger::installments::plan_total;
use crate::ledger::{LedgerService, invoices};

/// One corrected value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub record: &'static str,
    pub key: String,
    pub field: &'static str,
    pub stored: Decimal,
    pub computed: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub scopes: usize,
    pub invoices_checked: usize,
    pub invoices_corrected: usize,
    pub plans_checked: usize,
    pub plans_corrected: usize,
    pub cost_centers_checked: usize,
    pub cost_centers_corrected: usize,
    pub corrections: Vec<Correction>,
}

impl ReconciliationReport {
    pub fn corrected(&self) -> usize {
        self.invoices_corrected + self.plans_corrected + self.cost_centers_corrected
    }
}

/// Stored aggregates of one scope, listed before checking them one by one
struct Targets {
    invoices: Vec<(Scope, Uuid, Uuid)>,
    plans: Vec<(Scope, Uuid)>,
    cost_centers: Vec<(Scope, String)>,
}

impl LedgerService {
    /// Sweep `scope`, or every scope holding records when `None`
    pub async fn reconcile(&self, scope: Option<Scope>) -> FynnessResult<ReconciliationReport> {
        let (scopes, exact) = match scope {
            Some(scope) => (vec![scope], false),
            None => {
                let mut tx = self.begin().await?;
                (tx.scopes().await?, true)
            }
        };

        let mut report = ReconciliationReport {
            scopes: scopes.len(),
            ..Default::default()
        };
        for scope in &scopes {
            let targets = self.targets(scope, exact).await?;
            for (owner, card_id, invoice_id) in targets.invoices {
                self.check_invoice(&owner, card_id, invoice_id, &mut report)
                    .await?;
            }
            for (owner, plan_id) in targets.plans {
                self.check_plan(&owner, plan_id, &mut report).await?;
            }
            for (owner, code) in targets.cost_centers {
                self.check_cost_center(&owner, &code, &mut report).await?;
            }
        }

        tracing::info!(
            scopes = report.scopes,
            corrected = report.corrected(),
            "reconciliation sweep finished"
        );
        Ok(report)
    }

    /// With `exact`, only records stamped with exactly `scope` are listed so
    /// a user-wide scope does not also sweep its companies' records.
    async fn targets(&self, scope: &Scope, exact: bool) -> FynnessResult<Targets> {
        let keep = |owner: Scope| !exact || owner == *scope;
        let mut tx = self.begin().await?;

        let invoices = tx
            .list_invoices(scope, None)
            .await?
            .into_iter()
            .filter(|i| !i.paid && keep(i.scope()))
            .map(|i| (i.scope(), i.card_id, i.id))
            .collect();
        let plans = tx
            .list_plans(scope)
            .await?
            .into_iter()
            .filter(|p| keep(p.scope()))
            .map(|p| (p.scope(), p.id))
            .collect();
        let cost_centers = tx
            .list_cost_centers(scope)
            .await?
            .into_iter()
            .filter(|c| keep(c.scope()))
            .map(|c| (c.scope(), c.code))
            .collect();

        Ok(Targets {
            invoices,
            plans,
            cost_centers,
        })
    }

    async fn check_invoice(
        &self,
        scope: &Scope,
        card_id: Uuid,
        invoice_id: Uuid,
        report: &mut ReconciliationReport,
    ) -> FynnessResult<()> {
        let mut tx = self.begin().await?;
        let Some(card) = tx.get_card(scope, card_id).await? else {
            return Ok(());
        };
        let Some(stored) = tx
            .list_invoices(scope, Some(card_id))
            .await?
            .into_iter()
            .find(|i| i.id == invoice_id)
        else {
            return Ok(());
        };
        // paid between listing and now
        if stored.paid {
            return Ok(());
        }
        report.invoices_checked += 1;

        let (mut invoice, _) = invoices::compute(tx.as_mut(), scope, &card, stored.period).await?;
        if !money::drifted(stored.total, invoice.total, self.settings.drift_tolerance) {
            return Ok(());
        }

        invoice.materialized = true;
        invoice.updated_at = Utc::now();
        tx.put_invoice(&invoice).await?;

        let correction = Correction {
            record: "invoice",
            key: format!("{}/{}", card_id, stored.period),
            field: "total",
            stored: stored.total,
            computed: invoice.total,
        };
        let events = vec![drift_event(&correction)];
        self.commit(tx, scope, events).await?;

        tracing::warn!(
            card_id = %card_id,
            period = %stored.period,
            stored = %stored.total,
            computed = %invoice.total,
            "invoice total drift corrected"
        );
        report.invoices_corrected += 1;
        report.corrections.push(correction);
        Ok(())
    }

    async fn check_plan(
        &self,
        scope: &Scope,
        plan_id: Uuid,
        report: &mut ReconciliationReport,
    ) -> FynnessResult<()> {
        let mut tx = self.begin().await?;
        let Some(mut plan) = tx.get_plan(scope, plan_id).await? else {
            return Ok(());
        };
        report.plans_checked += 1;

        let members = tx.find_entries(scope, &EntryQuery::for_plan(plan_id)).await?;
        let computed = plan_total(&members);
        let header = members.into_iter().find(|e| e.id == plan.header_id);

        let tolerance = self.settings.drift_tolerance;
        let plan_drifted = money::drifted(plan.total, computed, tolerance);
        let header_drifted = header
            .as_ref()
            .is_some_and(|h| money::drifted(h.amount, computed, tolerance));
        if !plan_drifted && !header_drifted {
            return Ok(());
        }

        let stored = plan.total;
        plan.total = computed;
        plan.record(PlanChangeKind::DriftCorrected, None, Some(stored), computed);
        tx.put_plan(&plan).await?;
        if let Some(mut header) = header {
            header.amount = computed;
            header.touch();
            tx.put_entry(&header).await?;
        }

        let correction = Correction {
            record: "plan",
            key: plan_id.to_string(),
            field: "total",
            stored,
            computed,
        };
        let events = vec![drift_event(&correction)];
        self.commit(tx, scope, events).await?;

        tracing::warn!(plan_id = %plan_id, stored = %stored, computed = %computed, "plan total drift corrected");
        report.plans_corrected += 1;
        report.corrections.push(correction);
        Ok(())
    }

    async fn check_cost_center(
        &self,
        scope: &Scope,
        code: &str,
        report: &mut ReconciliationReport,
    ) -> FynnessResult<()> {
        let mut tx = self.begin().await?;
        let Some(mut center) = tx.find_cost_center(scope, code).await? else {
            return Ok(());
        };
        report.cost_centers_checked += 1;

        let (projected, actual) = totals_in(tx.as_mut(), scope, code).await?;
        let tolerance = self.settings.drift_tolerance;
        let mut corrections = Vec::new();
        if money::drifted(center.projected_total, projected, tolerance) {
            corrections.push(Correction {
                record: "cost_center",
                key: code.to_string(),
                field: "projected_total",
                stored: center.projected_total,
                computed: projected,
            });
            center.projected_total = projected;
        }
        if money::drifted(center.actual_total, actual, tolerance) {
            corrections.push(Correction {
                record: "cost_center",
                key: code.to_string(),
                field: "actual_total",
                stored: center.actual_total,
                computed: actual,
            });
            center.actual_total = actual;
        }
        if corrections.is_empty() {
            return Ok(());
        }

        center.updated_at = Utc::now();
        tx.put_cost_center(&center).await?;
        let events = corrections.iter().map(drift_event).collect();
        self.commit(tx, scope, events).await?;

        for c in &corrections {
            tracing::warn!(code = %code, field = c.field, stored = %c.stored, computed = %c.computed, "cost center drift corrected");
        }
        report.cost_centers_corrected += 1;
        report.corrections.extend(corrections);
        Ok(())
    }
}

fn drift_event(correction: &Correction) -> LedgerEvent {
    LedgerEvent::DriftCorrected {
        record: correction.record.to_string(),
        key: format!("{}.{}", correction.key, correction.field),
        stored: correction.stored,
        computed: correction.computed,
    }
}
