//! Typed error handling for the Fynness ledger core
//!
//! Every operation returns a [`FynnessError`], which classifies the failure
//! and knows how to render itself as a structured HTTP response.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed or missing input, business-rule rejections
//! - [`NotFoundError`]: record absent *or* not owned by the calling scope
//! - [`ConflictError`]: state-machine violations and duplicate keys
//! - [`RequestError`]: missing or malformed scope headers
//! - [`StorageError`]: backend failures
//! - [`ConfigError`]: configuration parsing and validation
//!
//! # Example
//!
//! ```rust,ignore
//! match ledger.pay_entry(&scope, id, request).await {
//!     Ok(entry) => println!("paid: {}", entry.id),
//!     Err(FynnessError::Conflict(ConflictError::AlreadyPaid { .. })) => {
//!         println!("nothing to do");
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::core::period::Period;

/// Message returned to callers for storage and internal failures.
const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// The main error type of the ledger core
#[derive(Debug)]
pub enum FynnessError {
    /// Malformed input or a rejected business rule
    Validation(ValidationError),

    /// Record absent or outside the caller's scope
    NotFound(NotFoundError),

    /// State conflict (already paid, duplicate key, ...)
    Conflict(ConflictError),

    /// Request-level problems (scope headers)
    Request(RequestError),

    /// Storage backend errors
    Storage(StorageError),

    /// Configuration errors
    Config(ConfigError),

    /// Unexpected failures
    Internal(String),
}

impl fmt::Display for FynnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FynnessError::Validation(e) => write!(f, "{}", e),
            FynnessError::NotFound(e) => write!(f, "{}", e),
            FynnessError::Conflict(e) => write!(f, "{}", e),
            FynnessError::Request(e) => write!(f, "{}", e),
            FynnessError::Storage(e) => write!(f, "{}", e),
            FynnessError::Config(e) => write!(f, "{}", e),
            FynnessError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for FynnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FynnessError::Validation(e) => Some(e),
            FynnessError::NotFound(e) => Some(e),
            FynnessError::Conflict(e) => Some(e),
            FynnessError::Request(e) => Some(e),
            FynnessError::Storage(e) => Some(e),
            FynnessError::Config(e) => Some(e),
            FynnessError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Error classification (validation, not_found, conflict, ...)
    pub kind: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FynnessError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FynnessError::Validation(_) => StatusCode::BAD_REQUEST,
            FynnessError::NotFound(_) => StatusCode::NOT_FOUND,
            FynnessError::Conflict(_) => StatusCode::CONFLICT,
            FynnessError::Request(e) => e.status_code(),
            FynnessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FynnessError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FynnessError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error classification
    pub fn kind(&self) -> &'static str {
        match self {
            FynnessError::Validation(_) => "validation",
            FynnessError::NotFound(_) => "not_found",
            FynnessError::Conflict(_) => "conflict",
            FynnessError::Request(_) => "request",
            FynnessError::Storage(_) | FynnessError::Config(_) | FynnessError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            FynnessError::Validation(e) => e.error_code(),
            FynnessError::NotFound(_) => "NOT_FOUND",
            FynnessError::Conflict(e) => e.error_code(),
            FynnessError::Request(e) => e.error_code(),
            FynnessError::Storage(_) => "STORAGE_ERROR",
            FynnessError::Config(_) => "CONFIG_ERROR",
            FynnessError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message may be shown to the caller as-is
    pub fn is_internal(&self) -> bool {
        self.kind() == "internal"
    }

    /// Convert to an error response
    ///
    /// Internal failures get a generic message; the details only go to the logs.
    pub fn to_response(&self) -> ErrorResponse {
        let message = if self.is_internal() {
            GENERIC_INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        ErrorResponse {
            code: self.error_code().to_string(),
            kind: self.kind(),
            message,
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            FynnessError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            FynnessError::Validation(ValidationError::FieldError { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            FynnessError::NotFound(NotFoundError { record, .. }) => {
                Some(serde_json::json!({ "record": record }))
            }
            _ => None,
        }
    }

    /// Shorthand for a single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        FynnessError::Validation(ValidationError::FieldError {
            field: field.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a not-found error
    pub fn not_found(record: &'static str, id: impl ToString) -> Self {
        FynnessError::NotFound(NotFoundError {
            record,
            id: id.to_string(),
        })
    }
}

impl IntoResponse for FynnessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }
        (status, Json(self.to_response())).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// A single field validation error
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

/// Errors related to input validation and business-rule rejections
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Validation error for field '{field}': {message}")]
    FieldError { field: String, message: String },

    #[error("Validation errors: {}", join_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Entry '{entry_id}' is an installment plan header and cannot be paid directly")]
    PlanHeaderNotPayable { entry_id: Uuid },

    #[error("Entry '{entry_id}' is an installment plan header; {action} its installments instead")]
    PlanHeaderImmutable { entry_id: Uuid, action: &'static str },

    #[error("Invoice for card '{card_id}' in {period} has no qualifying entries")]
    EmptyInvoice { card_id: Uuid, period: Period },

    #[error("Period {period} has not started yet")]
    FuturePeriod { period: Period },
}

fn join_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::FieldError { .. } | ValidationError::FieldErrors(_) => {
                "VALIDATION_ERROR"
            }
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            ValidationError::InvalidQuery { .. } => "INVALID_QUERY",
            ValidationError::InvalidPath { .. } => "INVALID_PATH",
            ValidationError::PlanHeaderNotPayable { .. } => "PLAN_HEADER_NOT_PAYABLE",
            ValidationError::PlanHeaderImmutable { .. } => "PLAN_HEADER_IMMUTABLE",
            ValidationError::EmptyInvoice { .. } => "EMPTY_INVOICE",
            ValidationError::FuturePeriod { .. } => "FUTURE_PERIOD",
        }
    }
}

impl From<ValidationError> for FynnessError {
    fn from(err: ValidationError) -> Self {
        FynnessError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for FynnessError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        FynnessError::Validation(ValidationError::FieldErrors(fields))
    }
}

// =============================================================================
// Not Found
// =============================================================================

/// A record is absent or belongs to another scope
///
/// The two cases are deliberately indistinguishable.
#[derive(Debug, Error)]
#[error("{record} '{id}' not found")]
pub struct NotFoundError {
    pub record: &'static str,
    pub id: String,
}

impl From<NotFoundError> for FynnessError {
    fn from(err: NotFoundError) -> Self {
        FynnessError::NotFound(err)
    }
}

// =============================================================================
// Conflict Errors
// =============================================================================

/// State-machine violations and uniqueness conflicts
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Entry '{entry_id}' is already paid")]
    AlreadyPaid { entry_id: Uuid },

    #[error("Entry '{entry_id}' is {status} and cannot be {action}")]
    InvalidTransition {
        entry_id: Uuid,
        status: String,
        action: &'static str,
    },

    #[error("Entry '{entry_id}' settles invoice '{invoice_id}' and cannot be {action}")]
    SettlesInvoice {
        entry_id: Uuid,
        invoice_id: Uuid,
        action: &'static str,
    },

    #[error("Entry '{entry_id}' pays the draw '{draw_id}' and cannot be {action}")]
    SettlesDraw {
        entry_id: Uuid,
        draw_id: Uuid,
        action: &'static str,
    },

    #[error("Entry '{entry_id}' is charged to card '{card_id}' and cannot be {action} outside its invoice")]
    ChargedToCard {
        entry_id: Uuid,
        card_id: Uuid,
        action: &'static str,
    },

    #[error("Invoice for card '{card_id}' in {period} is paid; its entries cannot change")]
    InvoiceClosed { card_id: Uuid, period: Period },

    #[error("Entry '{entry_id}' is installment {index} of plan '{plan_id}'; delete the plan instead")]
    InstallmentNotDeletable {
        entry_id: Uuid,
        plan_id: Uuid,
        index: u32,
    },

    #[error("Plan '{plan_id}' has {paid} paid installment(s)")]
    PlanHasPaidInstallments { plan_id: Uuid, paid: usize },

    #[error("Invoice for card '{card_id}' in {period} is already paid")]
    InvoiceAlreadyPaid { card_id: Uuid, period: Period },

    #[error("Draw for partner '{partner_id}' in {period} is already {state}")]
    DrawAlreadySettled {
        partner_id: Uuid,
        period: Period,
        state: &'static str,
    },

    #[error("Recurring deduction '{deduction_id}' is already inactive")]
    DeductionInactive { deduction_id: Uuid },

    #[error("{record} with key '{key}' already exists")]
    Duplicate { record: &'static str, key: String },
}

impl ConflictError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConflictError::AlreadyPaid { .. } => "ENTRY_ALREADY_PAID",
            ConflictError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ConflictError::SettlesInvoice { .. } => "ENTRY_SETTLES_INVOICE",
            ConflictError::SettlesDraw { .. } => "ENTRY_SETTLES_DRAW",
            ConflictError::ChargedToCard { .. } => "CHARGED_TO_CARD",
            ConflictError::InvoiceClosed { .. } => "INVOICE_CLOSED",
            ConflictError::InstallmentNotDeletable { .. } => "INSTALLMENT_NOT_DELETABLE",
            ConflictError::PlanHasPaidInstallments { .. } => "PLAN_HAS_PAID_INSTALLMENTS",
            ConflictError::InvoiceAlreadyPaid { .. } => "INVOICE_ALREADY_PAID",
            ConflictError::DrawAlreadySettled { .. } => "DRAW_ALREADY_SETTLED",
            ConflictError::DeductionInactive { .. } => "DEDUCTION_INACTIVE",
            ConflictError::Duplicate { .. } => "DUPLICATE_KEY",
        }
    }
}

impl From<ConflictError> for FynnessError {
    fn from(err: ConflictError) -> Self {
        FynnessError::Conflict(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP request metadata
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Missing required header: {header}")]
    MissingHeader { header: &'static str },

    #[error("Invalid value for header {header}: '{value}'")]
    InvalidHeader { header: &'static str, value: String },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::MissingHeader { .. } => StatusCode::UNAUTHORIZED,
            RequestError::InvalidHeader { .. } => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::MissingHeader { .. } => "MISSING_SCOPE",
            RequestError::InvalidHeader { .. } => "INVALID_SCOPE",
        }
    }
}

impl From<RequestError> for FynnessError {
    fn from(err: RequestError) -> Self {
        FynnessError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{backend} query error: {message}")]
    Query { backend: &'static str, message: String },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("Corrupt {record} record '{key}': {message}")]
    Corrupt {
        record: &'static str,
        key: String,
        message: String,
    },
}

impl From<StorageError> for FynnessError {
    fn from(err: StorageError) -> Self {
        FynnessError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config{}: {message}", .file.as_ref().map(|f| format!(" file '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    #[error("Invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    #[error("IO error: {message}")]
    IoError { message: String },
}

impl From<ConfigError> for FynnessError {
    fn from(err: ConfigError) -> Self {
        FynnessError::Config(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for FynnessError {
    fn from(err: serde_json::Error) -> Self {
        FynnessError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for FynnessError {
    fn from(err: std::io::Error) -> Self {
        FynnessError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for FynnessError {
    fn from(err: serde_yaml::Error) -> Self {
        FynnessError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for FynnessError {
    fn from(err: sqlx::Error) -> Self {
        FynnessError::Storage(StorageError::Query {
            backend: "PostgreSQL",
            message: err.to_string(),
        })
    }
}

/// Storage traits speak `anyhow`; typed errors carried inside survive the trip.
impl From<anyhow::Error> for FynnessError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<FynnessError>() {
            Ok(typed) => typed,
            Err(err) => match err.downcast::<StorageError>() {
                Ok(storage) => FynnessError::Storage(storage),
                Err(err) => FynnessError::Internal(format!("{:#}", err)),
            },
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for ledger operations
pub type FynnessResult<T> = Result<T, FynnessError>;
