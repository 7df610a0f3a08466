use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mizan_core::{api::ApiResponse, books::BooksError};
use serde::Serialize;
use tracing::error;

/// Everything a handler can fail with, rendered as the JSON envelope.
#[derive(Debug)]
pub enum ApiError {
    Books(BooksError),
    BadRequest(String),
    Unauthorized(&'static str),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Books(e) => books_status(e),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Books(e) => e.to_string(),
            Self::BadRequest(m) | Self::Internal(m) => m.clone(),
            Self::Unauthorized(reason) => format!("Unauthorized: {reason}"),
        }
    }
}

fn books_status(e: &BooksError) -> StatusCode {
    match e {
        BooksError::NotFound { .. } => StatusCode::NOT_FOUND,
        BooksError::InvalidField { .. }
        | BooksError::PartyKindMismatch { .. }
        | BooksError::EmptyTransaction
        | BooksError::DuplicateItem(_) => StatusCode::BAD_REQUEST,
        BooksError::Duplicate { .. } | BooksError::InUse { .. } => StatusCode::CONFLICT,
        BooksError::InsufficientStock { .. }
        | BooksError::Overpayment { .. }
        | BooksError::TotalBelowPaid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BooksError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<BooksError> for ApiError {
    fn from(e: BooksError) -> Self {
        Self::Books(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self.message(), "request failed");
        }
        (status, Json(ApiResponse::<()>::err(self.message()))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap a handler's value in a successful envelope.
#[allow(clippy::unnecessary_wraps)]
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

pub type ApiCreated<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// Wrap a newly created record in a `201 Created` envelope.
#[allow(clippy::unnecessary_wraps)]
pub fn created<T: Serialize>(data: T) -> ApiCreated<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

/// `Json` body extractor whose rejections use the envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections use the envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Path` extractor whose rejections use the envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use mizan_core::books::EntityKind;
    use mizan_primitives::Amount;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_books_errors_map_to_statuses() {
        let cases = [
            (
                BooksError::NotFound {
                    entity: EntityKind::Product,
                    id: Uuid::nil(),
                },
                StatusCode::NOT_FOUND,
            ),
            (BooksError::EmptyTransaction, StatusCode::BAD_REQUEST),
            (
                BooksError::InUse {
                    entity: EntityKind::Category,
                    id: Uuid::nil(),
                },
                StatusCode::CONFLICT,
            ),
            (
                BooksError::Overpayment {
                    amount: Amount::ZERO,
                    remaining: Amount::ZERO,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BooksError::Inconsistent("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unauthorized_message() {
        let err = ApiError::Unauthorized("invalid API key");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Unauthorized: invalid API key");
    }
}
