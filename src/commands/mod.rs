//! HTTP handlers.
//!
//! Request-shape problems (missing parameters, unknown engine, unreadable
//! body) are reported through the status code. Failures that happen while an
//! engine is involved travel in the body of a `200 OK`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::dispatcher::CheckError;
use crate::error::RequestError;
use crate::models::{ConnectRequest, ConnectResponse, DatabaseType, ExecuteRequest, QueryResult};
use crate::state::AppState;
use crate::templates::{templates_for, QueryTemplate};

pub type SharedState = Arc<AppState>;

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(QueryResult::failed(self.to_string(), 0)),
        )
            .into_response()
    }
}

fn malformed(rejection: JsonRejection) -> RequestError {
    RequestError::MalformedBody(rejection.body_text())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "unidb",
    })
}

/// `POST /api/execute`
pub async fn execute_query(
    State(state): State<SharedState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, RequestError> {
    let Json(request) = payload.map_err(malformed)?;
    let result = state.dispatcher.execute(request).await.inspect_err(|e| {
        debug!(error = %e, "rejected execute request");
    })?;
    Ok(Json(result))
}

/// `POST /api/connect`: open a session, probe it, close it.
pub async fn connect_db(
    State(state): State<SharedState>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> (StatusCode, Json<ConnectResponse>) {
    let connection = match payload
        .map_err(malformed)
        .and_then(|Json(request)| request.into_connection())
    {
        Ok(connection) => connection,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ConnectResponse::failed(e.to_string()))),
    };

    match state.dispatcher.check_connection(&connection).await {
        Ok(message) => {
            info!(engine = %connection.db_type, host = %connection.host, "connection check passed");
            (StatusCode::OK, Json(ConnectResponse::connected(message)))
        }
        Err(CheckError::Request(e)) => {
            (StatusCode::BAD_REQUEST, Json(ConnectResponse::failed(e.to_string())))
        }
        Err(CheckError::Engine(e)) => {
            error!(engine = %connection.db_type, host = %connection.host, error = %e, "connection check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectResponse::failed(e.to_string())),
            )
        }
    }
}

/// `GET /api/templates/:type`
pub async fn get_templates(
    Path(db_type): Path<String>,
) -> Result<Json<&'static [QueryTemplate]>, RequestError> {
    let db_type: DatabaseType = db_type.parse()?;
    Ok(Json(templates_for(db_type)))
}
