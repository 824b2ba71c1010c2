//! Request scoping: the user and optional company every operation is filtered by
//!
//! Identity and tenancy are resolved upstream; this core only receives them as
//! two opaque identifiers, threaded explicitly through every call.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{FynnessError, RequestError};

/// Header carrying the authenticated user id
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the active company id (multi-company accounts)
pub const COMPANY_HEADER: &str = "x-company-id";

/// Filter applied to every read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
}

impl Scope {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            company_id: None,
        }
    }

    pub fn with_company(mut self, company_id: Uuid) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Whether a record stamped with these ids is visible to this scope
    ///
    /// Without a company filter every record of the user is visible.
    pub fn owns(&self, user_id: Uuid, company_id: Option<Uuid>) -> bool {
        self.user_id == user_id && self.company_id.is_none_or(|c| company_id == Some(c))
    }

    pub fn owns_record<R: Scoped + ?Sized>(&self, record: &R) -> bool {
        self.owns(record.user_id(), record.company_id())
    }
}

/// Records stamped with the scope that created them
pub trait Scoped {
    fn user_id(&self) -> Uuid;
    fn company_id(&self) -> Option<Uuid>;

    fn scope(&self) -> Scope {
        Scope {
            user_id: self.user_id(),
            company_id: self.company_id(),
        }
    }
}

/// Extract the scope from request headers
pub fn extract_scope(headers: &HeaderMap) -> Result<Scope, FynnessError> {
    let user_id = parse_header(headers, USER_HEADER)?.ok_or(RequestError::MissingHeader {
        header: USER_HEADER,
    })?;
    let company_id = parse_header(headers, COMPANY_HEADER)?;

    Ok(Scope {
        user_id,
        company_id,
    })
}

fn parse_header(headers: &HeaderMap, header: &'static str) -> Result<Option<Uuid>, FynnessError> {
    let Some(raw) = headers.get(header) else {
        return Ok(None);
    };
    let value = raw.to_str().map_err(|_| RequestError::InvalidHeader {
        header,
        value: "<non-ascii>".to_string(),
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(trimmed)
        .map(Some)
        .map_err(|_| {
            RequestError::InvalidHeader {
                header,
                value: trimmed.to_string(),
            }
            .into()
        })
}

impl<S> FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = FynnessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_scope(&parts.headers)
    }
}
