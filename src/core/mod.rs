//! Core module containing the ledger's records, errors and storage traits

pub mod error;
pub mod events;
pub mod extractors;
pub mod money;
pub mod period;
pub mod query;
pub mod records;
pub mod scope;
pub mod store;

pub use error::{FynnessError, FynnessResult};
pub use events::{EventBus, EventEnvelope, LedgerEvent};
pub use extractors::{JsonBody, PathParams, QueryParams};
pub use period::Period;
pub use query::{CashFlowQuery, EntryQuery, PageParams, PaginatedResponse, PaginationMeta};
pub use records::{
    Card, CashFlowDirection, CashFlowRow, CostCenter, CostCenterKind, EntryKind, EntryStatus,
    InstallmentPlan, Invoice, LedgerEntry, Partner, PartnerDrawRecord, PlanChange,
    PlanChangeKind, RecurringDeduction,
};
pub use scope::{Scope, Scoped};
pub use store::{LedgerStore, LedgerTx};
