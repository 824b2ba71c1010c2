//! Ledger event bus
//!
//! Mutations publish a [`LedgerEvent`] once their transaction has committed.
//! Downstream projections subscribe through `tokio::sync::broadcast`; a
//! publish with no subscribers is a no-op.
//!
//! ```text
//! LedgerService ──▶ EventBus::publish() ──▶ broadcast channel ──▶ subscribers
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::core::period::Period;
use crate::core::scope::Scope;

/// Something that changed in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LedgerEvent {
    EntryCreated { entry_id: Uuid },
    EntryUpdated { entry_id: Uuid },
    EntryDeleted { entry_id: Uuid, soft: bool },
    EntryPaid { entry_id: Uuid, amount: Decimal },
    PaymentReversed { entry_id: Uuid },
    EntryCanceled { entry_id: Uuid },
    PlanCreated { plan_id: Uuid, installments: u32 },
    PlanDeleted { plan_id: Uuid },
    InvoiceRecomputed { card_id: Uuid, period: Period, total: Decimal },
    InvoicePaid { card_id: Uuid, period: Period, total: Decimal },
    DrawCommitted { partner_id: Uuid, period: Period, net: Decimal },
    DrawPaid { partner_id: Uuid, period: Period, net: Decimal },
    DriftCorrected { record: String, key: String, stored: Decimal, computed: Decimal },
}

impl LedgerEvent {
    /// Short action name, e.g. `entry_paid`
    pub fn action(&self) -> &'static str {
        match self {
            LedgerEvent::EntryCreated { .. } => "entry_created",
            LedgerEvent::EntryUpdated { .. } => "entry_updated",
            LedgerEvent::EntryDeleted { .. } => "entry_deleted",
            LedgerEvent::EntryPaid { .. } => "entry_paid",
            LedgerEvent::PaymentReversed { .. } => "payment_reversed",
            LedgerEvent::EntryCanceled { .. } => "entry_canceled",
            LedgerEvent::PlanCreated { .. } => "plan_created",
            LedgerEvent::PlanDeleted { .. } => "plan_deleted",
            LedgerEvent::InvoiceRecomputed { .. } => "invoice_recomputed",
            LedgerEvent::InvoicePaid { .. } => "invoice_paid",
            LedgerEvent::DrawCommitted { .. } => "draw_committed",
            LedgerEvent::DrawPaid { .. } => "draw_paid",
            LedgerEvent::DriftCorrected { .. } => "drift_corrected",
        }
    }
}

/// Event plus the scope it happened in and when it was published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub scope: Scope,
    pub timestamp: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Broadcast bus for ledger events
///
/// Cloning is cheap; every clone shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish events that happened in `scope`
    ///
    /// Returns the number of subscribers that received each event.
    pub fn publish(&self, scope: Scope, events: Vec<LedgerEvent>) -> usize {
        let mut delivered = 0;
        for event in events {
            let envelope = EventEnvelope {
                scope,
                timestamp: Utc::now(),
                event,
            };
            // send only fails when nobody is listening
            delivered = self.sender.send(envelope).unwrap_or(0);
        }
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
