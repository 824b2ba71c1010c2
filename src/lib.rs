//! # Fynness
//!
//! Reconciliation core of a small-business finance ledger: payables and
//! receivables ("contas"), installment plans, credit-card invoices, partner
//! draws (pró-labore), cost centers and the realized cash flow, behind a
//! REST API.
//!
//! ## Features
//!
//! - **Installment plans**: one header plus N monthly installments that sum exactly to the total
//! - **Card invoices**: monthly totals resummed inside the transaction that changes them
//! - **Partner draws**: `net = base - recurring - ad hoc`, committed as historical snapshots
//! - **Payment reconciler**: pay / reverse / cancel with every side effect in one transaction
//! - **Reconciliation sweep**: detects and corrects drifted aggregates, idempotently
//! - **Pluggable storage**: in-memory by default, PostgreSQL behind the `postgres` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fynness::prelude::*;
//!
//! let ledger = LedgerService::new(
//!     Arc::new(InMemoryLedgerStore::new()),
//!     LedgerSettings::default(),
//! );
//! let scope = Scope::new(user_id);
//!
//! let plan = ledger.create_plan(&scope, PlanRequest { .. }).await?;
//! ledger.pay_entry(&scope, plan.installments[0].id, PayEntryRequest::default()).await?;
//! ```

pub mod config;
pub mod core;
pub mod ledger;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        error::{ConflictError, FynnessError, FynnessResult, ValidationError},
        events::{EventBus, EventEnvelope, LedgerEvent},
        period::Period,
        query::{CashFlowQuery, EntryQuery, PageParams, PaginatedResponse},
        records::{
            Card, CashFlowDirection, CashFlowRow, CostCenter, CostCenterKind, EntryKind,
            EntryStatus, InstallmentPlan, Invoice, LedgerEntry, Partner, PartnerDrawRecord,
            RecurringDeduction,
        },
        scope::{Scope, Scoped},
        store::{LedgerStore, LedgerTx},
    };

    // === Ledger ===
    pub use crate::ledger::{
        CreateCardRequest, CreateCostCenterRequest, CreateDeductionRequest, CreateEntryRequest,
        CreatePartnerRequest, LedgerService, PayDrawRequest, PayEntryRequest, PayInvoiceRequest,
        PlanRequest, PlanView, ReconciliationReport, UpdateEntryRequest,
        UpdateInstallmentRequest,
    };

    // === Storage ===
    pub use crate::storage::InMemoryLedgerStore;
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresLedgerStore;

    // === Config ===
    pub use crate::config::{FynnessConfig, LedgerSettings, StorageBackend};

    // === Server ===
    pub use crate::server::ServerBuilder;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use chrono::NaiveDate;
    pub use rust_decimal::Decimal;
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
