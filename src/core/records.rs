//! Persisted records of the ledger core
//!
//! Every record carries the scope (user id + optional company id) that owns
//! it, plus creation/update timestamps.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::period::Period;
use crate::core::scope::{Scope, Scoped};

macro_rules! impl_scoped {
    ($($record:ty),+ $(,)?) => {
        $(
            impl Scoped for $record {
                fn user_id(&self) -> Uuid {
                    self.user_id
                }

                fn company_id(&self) -> Option<Uuid> {
                    self.company_id
                }
            }
        )+
    };
}

// =============================================================================
// Ledger entries
// =============================================================================

/// Payable or receivable obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Payable,
    Receivable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Paid,
    Canceled,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Paid => write!(f, "paid"),
            EntryStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// A single payable or receivable obligation ("conta")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub kind: EntryKind,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub counterparty: Option<String>,
    /// Nominal amount
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: EntryStatus,
    #[serde(default)]
    pub paid_at: Option<NaiveDate>,
    /// Amount actually paid, kept apart from the nominal amount
    #[serde(default)]
    pub paid_amount: Option<Decimal>,
    #[serde(default)]
    pub in_cash_flow: bool,
    /// Installment plan group key
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    /// Plan header entry this installment belongs to
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub installment_index: Option<u32>,
    #[serde(default)]
    pub installment_total: Option<u32>,
    #[serde(default)]
    pub card_id: Option<Uuid>,
    #[serde(default)]
    pub partner_id: Option<Uuid>,
    #[serde(default)]
    pub cost_center: Option<String>,
    /// Set on the consolidated entry created by an invoice payment
    #[serde(default)]
    pub invoice_ref: Option<Uuid>,
    /// Set on the entry created by a draw payment
    #[serde(default)]
    pub draw_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn new(
        scope: &Scope,
        kind: EntryKind,
        description: impl Into<String>,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: scope.user_id,
            company_id: scope.company_id,
            kind,
            description: description.into(),
            category: None,
            counterparty: None,
            amount,
            due_date,
            status: EntryStatus::Pending,
            paid_at: None,
            paid_amount: None,
            in_cash_flow: false,
            plan_id: None,
            parent_id: None,
            installment_index: None,
            installment_total: None,
            card_id: None,
            partner_id: None,
            cost_center: None,
            invoice_ref: None,
            draw_ref: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// An entry with an installment total and no parent represents a whole plan
    pub fn is_plan_header(&self) -> bool {
        self.installment_total.is_some() && self.parent_id.is_none()
    }

    pub fn is_installment(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_paid(&self) -> bool {
        self.status == EntryStatus::Paid
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether this entry feeds invoice, draw and cost-center aggregates
    ///
    /// Plan headers are excluded so a plan is never counted twice.
    pub fn counts_toward_aggregates(&self) -> bool {
        !self.is_plan_header() && self.status != EntryStatus::Canceled && !self.is_deleted()
    }

    /// Actual amount when recorded, nominal otherwise
    pub fn settled_amount(&self) -> Decimal {
        self.paid_amount.unwrap_or(self.amount)
    }

    pub fn cash_flow_direction(&self) -> CashFlowDirection {
        match self.kind {
            EntryKind::Payable => CashFlowDirection::Outflow,
            EntryKind::Receivable => CashFlowDirection::Inflow,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Installment plans
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeKind {
    Generated,
    InstallmentAmountChanged,
    TotalRecomputed,
    DriftCorrected,
    InstallmentCanceled,
}

/// One line of a plan's change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanChange {
    pub at: DateTime<Utc>,
    pub kind: PlanChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Decimal>,
    pub current: Decimal,
}

/// Grouping record of an installment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    /// The header entry representing the plan as a whole
    pub header_id: Uuid,
    pub description: String,
    pub total: Decimal,
    pub count: u32,
    pub first_due_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<PlanChange>,
}

impl InstallmentPlan {
    pub fn record(
        &mut self,
        kind: PlanChangeKind,
        installment_index: Option<u32>,
        previous: Option<Decimal>,
        current: Decimal,
    ) {
        let at = Utc::now();
        self.history.push(PlanChange {
            at,
            kind,
            installment_index,
            previous,
            current,
        });
        self.updated_at = at;
    }
}

// =============================================================================
// Cards and invoices
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub name: String,
    /// Day of month the statement closes (clamped to short months)
    pub closing_day: u32,
    /// Day of month the invoice is due (clamped to short months)
    pub due_day: u32,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Closing and due dates of the invoice for `period`
    ///
    /// The due date falls in the reference month when the due day comes after
    /// the closing day, otherwise in the following month.
    pub fn invoice_dates(&self, period: Period) -> (NaiveDate, NaiveDate) {
        let closing = period.day_clamped(self.closing_day);
        let due = if self.due_day > self.closing_day {
            period.day_clamped(self.due_day)
        } else {
            period.next().day_clamped(self.due_day)
        };
        (closing, due)
    }
}

/// A card's monthly billing aggregate ("fatura")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub card_id: Uuid,
    pub period: Period,
    pub total: Decimal,
    #[serde(default)]
    pub entry_count: usize,
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<NaiveDate>,
    pub closing_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Consolidated entry created when the invoice was paid
    #[serde(default)]
    pub payment_entry_id: Option<Uuid>,
    /// False for invoices computed on read and never stored
    #[serde(default)]
    pub materialized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// A fresh, unpaid invoice with a zero total
    pub fn open(card: &Card, period: Period) -> Self {
        let (closing_date, due_date) = card.invoice_dates(period);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: card.user_id,
            company_id: card.company_id,
            card_id: card.id,
            period,
            total: Decimal::ZERO,
            entry_count: 0,
            paid: false,
            paid_at: None,
            closing_date,
            due_date,
            payment_entry_id: None,
            materialized: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Partners and draws
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub name: String,
    /// Monthly pró-labore base amount
    pub base_draw: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Deduction applied to every month while active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringDeduction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub partner_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// A partner's draw for one month
///
/// `net = base - (recurring + ad_hoc)` always holds; build through
/// [`PartnerDrawRecord::compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerDrawRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub partner_id: Uuid,
    pub period: Period,
    pub base: Decimal,
    pub recurring: Decimal,
    /// Deductions still pending in the month (projected)
    pub ad_hoc_pending: Decimal,
    /// Deductions already paid in the month (realized)
    pub ad_hoc_paid: Decimal,
    pub ad_hoc: Decimal,
    pub net: Decimal,
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<NaiveDate>,
    #[serde(default)]
    pub payment_entry_id: Option<Uuid>,
    /// Permanent historical snapshot
    pub committed: bool,
    #[serde(default)]
    pub committed_at: Option<DateTime<Utc>>,
    /// Computed on demand and not committed
    pub real_time: bool,
    /// Whether the month was already over when this value was produced
    #[serde(default)]
    pub month_closed: bool,
    pub computed_at: DateTime<Utc>,
}

impl PartnerDrawRecord {
    pub fn compute(
        partner: &Partner,
        period: Period,
        recurring: Decimal,
        ad_hoc_pending: Decimal,
        ad_hoc_paid: Decimal,
    ) -> Self {
        let ad_hoc = ad_hoc_pending + ad_hoc_paid;
        Self {
            id: Uuid::new_v4(),
            user_id: partner.user_id,
            company_id: partner.company_id,
            partner_id: partner.id,
            period,
            base: partner.base_draw,
            recurring,
            ad_hoc_pending,
            ad_hoc_paid,
            ad_hoc,
            net: partner.base_draw - (recurring + ad_hoc),
            paid: false,
            paid_at: None,
            payment_entry_id: None,
            committed: false,
            committed_at: None,
            real_time: true,
            month_closed: false,
            computed_at: Utc::now(),
        }
    }

    /// Copy freshly computed amounts over this record, keeping its identity
    pub fn refresh_from(&mut self, computed: &PartnerDrawRecord) {
        self.base = computed.base;
        self.recurring = computed.recurring;
        self.ad_hoc_pending = computed.ad_hoc_pending;
        self.ad_hoc_paid = computed.ad_hoc_paid;
        self.ad_hoc = computed.ad_hoc;
        self.net = computed.net;
        self.computed_at = computed.computed_at;
    }
}

// =============================================================================
// Cost centers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCenterKind {
    Revenue,
    Expense,
    Partner,
}

/// Tagging dimension with running totals ("centro de custo")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCenter {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub kind: CostCenterKind,
    /// Nominal amounts of live tagged entries
    pub projected_total: Decimal,
    /// Settled amounts of paid tagged entries
    pub actual_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Cash flow
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowDirection {
    Inflow,
    Outflow,
}

/// Realized movement keyed to the entry that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub entry_id: Uuid,
    pub direction: CashFlowDirection,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CashFlowRow {
    /// Row for a paid entry, dated on its payment date
    pub fn for_entry(entry: &LedgerEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            company_id: entry.company_id,
            entry_id: entry.id,
            direction: entry.cash_flow_direction(),
            amount: entry.settled_amount(),
            date: entry.paid_at.unwrap_or(entry.due_date),
            description: entry.description.clone(),
            created_at: Utc::now(),
        }
    }

    /// Inflows positive, outflows negative
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            CashFlowDirection::Inflow => self.amount,
            CashFlowDirection::Outflow => -self.amount,
        }
    }
}

impl_scoped!(
    LedgerEntry,
    InstallmentPlan,
    Card,
    Invoice,
    Partner,
    RecurringDeduction,
    PartnerDrawRecord,
    CostCenter,
    CashFlowRow,
);
