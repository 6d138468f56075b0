use std::backtrace::Backtrace;
use log::error;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;

const INTERNAL_ERROR_DETAIL: &str = "An unexpected error occurred. Please try again later.";

/// Failures of the booking and query operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::InvalidRequest(_) => Status::BadRequest,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
    pub fn kind(&self) -> &'static str {
        status_kind(self.status())
    }
    fn detail(&self) -> String {
        match self {
            ApiError::Internal(_) => INTERNAL_ERROR_DETAIL.to_string(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn status_kind(status: Status) -> &'static str {
    match status.code {
        400 => "invalid_request",
        404 => "not_found",
        409 => "conflict",
        422 => "validation_error",
        500..=599 => "internal_error",
        _ => "error",
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        error!("SQL Error: {err}\nbacktrace: {}", Backtrace::capture());
        ApiError::Internal(err.to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ErrorBody {
    pub fn new(status: Status, detail: impl Into<String>) -> Self {
        Self { error: status_kind(status), detail: detail.into() }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = ErrorBody { error: self.kind(), detail: self.detail() };
        Custom(status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NotFound("x".into()).status(), Status::NotFound);
        assert_eq!(ApiError::InvalidRequest("x".into()).status(), Status::BadRequest);
        assert_eq!(ApiError::Conflict("x".into()).status(), Status::Conflict);
        assert_eq!(ApiError::Validation("x".into()).status(), Status::UnprocessableEntity);
        assert_eq!(ApiError::Internal("x".into()).status(), Status::InternalServerError);
    }

    #[rocket::async_test]
    async fn test_internal_response_hides_reason() {
        let client = rocket::local::asynchronous::Client::debug_with(vec![]).await.unwrap();
        let req = client.get("/api/v1/classes");
        let mut resp = ApiError::Internal("database disk image is malformed".into()).respond_to(&req).unwrap();
        assert_eq!(resp.status(), Status::InternalServerError);
        let body: serde_json::Value = serde_json::from_str(&resp.body_mut().to_string().await.unwrap()).unwrap();
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["detail"], INTERNAL_ERROR_DETAIL);
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), "internal_error");
        assert_eq!(err.detail(), INTERNAL_ERROR_DETAIL);
        assert_eq!(ApiError::Conflict("Class is fully booked".into()).detail(), "Class is fully booked");
    }
}
