//! Axum extractors whose rejections render as [`FynnessError`] responses
//!
//! The stock `Json`, `Query` and `Path` extractors reject with plain-text
//! bodies. These wrappers turn the same failures into the structured error
//! body every other endpoint returns.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::core::error::{FynnessError, ValidationError};

/// JSON request body
///
/// # Example
///
/// ```rust,ignore
/// async fn create_entry(
///     scope: Scope,
///     JsonBody(request): JsonBody<CreateEntryRequest>,
/// ) -> Result<Json<LedgerEntry>, FynnessError> { ... }
/// ```
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = FynnessError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        <Json<T> as FromRequest<S>>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(json_rejection)
    }
}

/// An absent body (no JSON content type) extracts as `None`
impl<S, T> OptionalFromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = FynnessError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        <Json<T> as OptionalFromRequest<S>>::from_request(req, state)
            .await
            .map(|body| body.map(|Json(value)| JsonBody(value)))
            .map_err(json_rejection)
    }
}

impl<T: Default> JsonBody<T> {
    /// The body when one was sent, `T::default()` otherwise
    pub fn or_default(body: Option<Self>) -> T {
        body.map(|JsonBody(value)| value).unwrap_or_default()
    }
}

fn json_rejection(rejection: JsonRejection) -> FynnessError {
    ValidationError::InvalidJson {
        message: rejection.body_text(),
    }
    .into()
}

/// Query string
#[derive(Debug, Clone, Default)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = FynnessError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(query_rejection)
    }
}

fn query_rejection(rejection: QueryRejection) -> FynnessError {
    ValidationError::InvalidQuery {
        message: rejection.body_text(),
    }
    .into()
}

/// Path parameters (ids, year / month)
#[derive(Debug, Clone)]
pub struct PathParams<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = FynnessError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| PathParams(value))
            .map_err(path_rejection)
    }
}

fn path_rejection(rejection: PathRejection) -> FynnessError {
    ValidationError::InvalidPath {
        message: rejection.body_text(),
    }
    .into()
}
