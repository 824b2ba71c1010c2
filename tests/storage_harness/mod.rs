//! Shared test harness for ledger storage backends
//!
//! Provides record builders and two macro-generated suites that every
//! backend runs:
//!
//! - [`ledger_store_tests!`]: the `LedgerStore` / `LedgerTx` contract
//! - [`ledger_api_tests!`]: HTTP round trips through the full server
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//!
//! ledger_store_tests!(InMemoryLedgerStore::new());
//! ledger_api_tests!(InMemoryLedgerStore::new());
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod api_tests;
#[macro_use]
pub mod store_tests;

use axum::http::{HeaderName, HeaderValue};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use fynness::core::period::Period;
use fynness::core::records::{
    Card, CostCenter, CostCenterKind, EntryKind, InstallmentPlan, LedgerEntry, Partner,
    RecurringDeduction,
};
use fynness::core::scope::{COMPANY_HEADER, Scope, USER_HEADER};

pub fn scope() -> Scope {
    Scope::new(Uuid::new_v4())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn period(y: i32, m: u32) -> Period {
    Period::new(y, m).unwrap()
}

pub fn entry(scope: &Scope, amount: Decimal, due: NaiveDate) -> LedgerEntry {
    LedgerEntry::new(scope, EntryKind::Payable, "Fornecedor", amount, due)
}

pub fn card(scope: &Scope) -> Card {
    Card {
        id: Uuid::new_v4(),
        user_id: scope.user_id,
        company_id: scope.company_id,
        name: "Nubank PJ".to_string(),
        closing_day: 3,
        due_day: 10,
        created_at: Utc::now(),
    }
}

pub fn partner(scope: &Scope, base: Decimal) -> Partner {
    Partner {
        id: Uuid::new_v4(),
        user_id: scope.user_id,
        company_id: scope.company_id,
        name: "Ana".to_string(),
        base_draw: base,
        created_at: Utc::now(),
    }
}

pub fn deduction(partner: &Partner, amount: Decimal) -> RecurringDeduction {
    RecurringDeduction {
        id: Uuid::new_v4(),
        user_id: partner.user_id,
        company_id: partner.company_id,
        partner_id: partner.id,
        description: "Plano de saúde".to_string(),
        amount,
        active: true,
        created_at: Utc::now(),
        deactivated_at: None,
    }
}

pub fn cost_center(scope: &Scope, code: &str) -> CostCenter {
    let now = Utc::now();
    CostCenter {
        id: Uuid::new_v4(),
        user_id: scope.user_id,
        company_id: scope.company_id,
        code: code.to_string(),
        name: code.to_string(),
        kind: CostCenterKind::Expense,
        projected_total: Decimal::ZERO,
        actual_total: Decimal::ZERO,
        created_at: now,
        updated_at: now,
    }
}

pub fn plan(scope: &Scope, header: &LedgerEntry, total: Decimal, count: u32) -> InstallmentPlan {
    let now = Utc::now();
    InstallmentPlan {
        id: Uuid::new_v4(),
        user_id: scope.user_id,
        company_id: scope.company_id,
        header_id: header.id,
        description: header.description.clone(),
        total,
        count,
        first_due_date: header.due_date,
        generated_at: now,
        updated_at: now,
        history: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub fn user_header() -> HeaderName {
    HeaderName::from_static(USER_HEADER)
}

pub fn company_header() -> HeaderName {
    HeaderName::from_static(COMPANY_HEADER)
}

pub fn header_value(id: Uuid) -> HeaderValue {
    HeaderValue::from_str(&id.to_string()).unwrap()
}

/// Amounts travel as decimal strings
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not an amount: {}", other),
    }
}

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().unwrap()).unwrap()
}
