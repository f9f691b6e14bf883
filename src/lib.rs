pub mod accounts;
pub mod backend;
pub mod config;
pub mod error;
pub mod messages;
pub mod presence;
pub mod session;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod username;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

pub use error::ChatError;
pub use session::{ChatSession, LeaveKind, LeaveOutcome, SessionState};
pub use username::Username;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

pub trait GetField {
    fn get_obj_field(&self, field: &str) -> AppResult<&Map<String, Value>>;
}

impl GetField for serde_json::Value {
    fn get_obj_field(&self, field: &str) -> AppResult<&Map<String, Value>> {
        self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_object()
            .ok_or(format!("expected {field} in {self} to be object").into())
    }
}


pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: anyhow::anyhow!("{what} not found"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{:#}", self.error);
        }
        let body = serde_json::json!({
            "data": null,
            "error": { "status": self.status.as_u16(), "message": self.error.to_string() },
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow::Error::msg(err) }
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error: anyhow::Error::msg(err.to_owned()) }
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: anyhow::Error::from(err) }
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(std::io::Error);
