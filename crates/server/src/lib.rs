use api_types::error::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{DEFAULT_WEBHOOK_DEADLINE, ServerState, router, run_with_listener};

mod health;
mod server;
mod webhook;

pub enum ServerError {
    Engine(EngineError),
    Timeout,
}

/// Only failures the provider should redeliver reach here; the webhook
/// acknowledges everything else itself.
fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => {
            tracing::error!("engine error: {other}");
            other.to_string()
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let error = match self {
            ServerError::Engine(err) => message_for_engine_error(err),
            ServerError::Timeout => "deadline exceeded".to_string(),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::*;

    #[test]
    fn engine_database_maps_to_500() {
        let res = ServerError::from(EngineError::Database(DbErr::Custom("boom".to_string())))
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn timeout_maps_to_500() {
        let res = ServerError::Timeout.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
