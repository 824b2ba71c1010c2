//! Typed ledger filters and pagination utilities
//!
//! Aggregation filters are named, validated fields rather than free-form
//! where-clauses; every backend evaluates them through [`EntryQuery::matches`]
//! (or an equivalent pushed-down predicate).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{FynnessError, FynnessResult, ValidationError};
use crate::core::period::Period;
use crate::core::records::{CashFlowRow, EntryKind, EntryStatus, LedgerEntry};

/// Filter over ledger entries
///
/// # Example
/// ```text
/// GET /entries?due_from=2026-01-01&due_to=2026-01-31&status=pending
/// GET /entries?card_id=...&include_plan_headers=true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntryQuery {
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub kind: Option<EntryKind>,
    pub status: Option<EntryStatus>,
    pub card_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub cost_center: Option<String>,
    /// Plan headers are left out unless asked for
    pub include_plan_headers: bool,
    /// Canceled entries are left out unless asked for (or filtered by status)
    pub include_canceled: bool,
    /// Soft-deleted entries are left out unless asked for
    pub include_deleted: bool,
}

impl EntryQuery {
    /// Entries that qualify for a card's invoice in `period`
    pub fn for_card(card_id: Uuid, period: Period) -> Self {
        Self {
            due_from: Some(period.first_day()),
            due_to: Some(period.last_day()),
            card_id: Some(card_id),
            ..Self::default()
        }
    }

    /// Entries tagged to a partner in `period` (ad hoc deductions)
    pub fn for_partner(partner_id: Uuid, period: Period) -> Self {
        Self {
            due_from: Some(period.first_day()),
            due_to: Some(period.last_day()),
            partner_id: Some(partner_id),
            ..Self::default()
        }
    }

    /// Header and installments of a plan, canceled ones included
    pub fn for_plan(plan_id: Uuid) -> Self {
        Self {
            plan_id: Some(plan_id),
            include_plan_headers: true,
            include_canceled: true,
            ..Self::default()
        }
    }

    /// Live entries tagged with a cost center code
    pub fn for_cost_center(code: &str) -> Self {
        Self {
            cost_center: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FynnessResult<()> {
        if let (Some(from), Some(to)) = (self.due_from, self.due_to) {
            if from > to {
                return Err(FynnessError::Validation(ValidationError::InvalidQuery {
                    message: format!("due_from ({}) is after due_to ({})", from, to),
                }));
            }
        }
        Ok(())
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if !self.include_plan_headers && entry.is_plan_header() {
            return false;
        }
        if !self.include_deleted && entry.is_deleted() {
            return false;
        }
        match self.status {
            Some(status) if entry.status != status => return false,
            None if !self.include_canceled && entry.status == EntryStatus::Canceled => {
                return false;
            }
            _ => {}
        }

        self.due_from.is_none_or(|from| entry.due_date >= from)
            && self.due_to.is_none_or(|to| entry.due_date <= to)
            && self.kind.is_none_or(|kind| entry.kind == kind)
            && self.card_id.is_none_or(|card| entry.card_id == Some(card))
            && self.partner_id.is_none_or(|partner| entry.partner_id == Some(partner))
            && self.plan_id.is_none_or(|plan| entry.plan_id == Some(plan))
            && self
                .cost_center
                .as_deref()
                .is_none_or(|code| entry.cost_center.as_deref() == Some(code))
    }
}

/// Date-range filter over cash-flow rows (inclusive)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CashFlowQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub entry_id: Option<Uuid>,
}

impl CashFlowQuery {
    pub fn for_entry(entry_id: Uuid) -> Self {
        Self {
            entry_id: Some(entry_id),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FynnessResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(FynnessError::Validation(ValidationError::InvalidQuery {
                    message: format!("from ({}) is after to ({})", from, to),
                }));
            }
        }
        Ok(())
    }

    pub fn matches(&self, row: &CashFlowRow) -> bool {
        self.from.is_none_or(|from| row.date >= from)
            && self.to.is_none_or(|to| row.date <= to)
            && self.entry_id.is_none_or(|id| row.entry_id == id)
    }
}

/// Pagination parameters
///
/// # Example
/// ```text
/// GET /entries?page=2&limit=10
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageParams {
    /// Page number (starts at 1)
    pub page: usize,

    /// Number of items per page
    pub limit: usize,
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageParams {
    /// Get page number, ensuring minimum of 1
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Get limit, ensuring it doesn't exceed the maximum
    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }

    /// Slice `items` according to these parameters
    pub fn paginate<T>(&self, items: Vec<T>) -> PaginatedResponse<T> {
        let page = self.page();
        let limit = self.limit();
        let total = items.len();
        let data = items
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        PaginatedResponse {
            data,
            pagination: PaginationMeta::new(page, limit, total),
        }
    }
}

/// Paginated response structure
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The paginated data
    pub data: Vec<T>,

    /// Pagination metadata
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: usize,
    pub limit: usize,
    /// Total number of items (after filters)
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let limit = limit.max(1);
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        let start = (page - 1) * limit;

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: start + limit < total,
            has_prev: page > 1,
        }
    }
}
