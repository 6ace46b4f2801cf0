//! The HTTP surface of the ledger.
//!
//! | Method | Path                  | Body / query            | Answer                      |
//! |--------|-----------------------|-------------------------|-----------------------------|
//! | GET    | `/api/budget`         | `?month=YYYY-MM`        | the month record            |
//! | GET    | `/api/budget`         |                         | the whole dataset           |
//! | POST   | `/api/budget`         | `{month, data}`         | `{success, data, state}`    |
//! | PUT    | `/api/budget`         | `{fromMonth, toMonth}`  | `{success, data, state}`    |
//! | GET    | `/api/budget/summary` | `?month=YYYY-MM`        | the month's totals          |
//!
//! Failures answer `{error, message}`: 400 for a bad request, 500 for anything else.

use crate::error::{ErrorType, Res};
use crate::ledger::{Ledger, Saved};
use crate::model::{MonthKey, MonthRecord};
use crate::sync::SyncState;
use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::{debug, error, info};

/// Builds the routes, serving `ledger`.
pub fn router(ledger: Ledger) -> Router {
    Router::new()
        .route(
            "/api/budget",
            get(get_budget).post(post_budget).put(put_budget),
        )
        .route("/api/budget/summary", get(get_summary))
        .with_state(ledger)
}

/// Serves `ledger` on `addr` until the process receives Ctrl-C.
pub async fn serve(ledger: Ledger, addr: SocketAddr) -> Res<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;
    info!("Serving the ledger on http://{}", listener.local_addr()?);
    axum::serve(listener, router(ledger))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The HTTP server stopped unexpectedly")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down the HTTP server");
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    month: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetMonthBody {
    month: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloneMonthBody {
    from_month: Option<String>,
    to_month: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    success: bool,
    data: MonthRecord,
    state: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<Saved<MonthRecord>> for WriteResponse {
    fn from(saved: Saved<MonthRecord>) -> Self {
        Self {
            success: true,
            data: saved.value,
            state: saved.report.state,
            reason: saved.report.reason,
        }
    }
}

async fn get_budget(
    State(ledger): State<Ledger>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, ApiError> {
    match query.month {
        Some(month) => {
            let month = parse_month(&month)?;
            debug!("GET budget for {month}");
            Ok(Json(ledger.get_month(month).await?).into_response())
        }
        None => {
            debug!("GET whole budget");
            Ok(Json(ledger.get_all().await?).into_response())
        }
    }
}

async fn post_budget(
    State(ledger): State<Ledger>,
    body: Result<Json<SetMonthBody>, JsonRejection>,
) -> Result<Json<WriteResponse>, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;
    let (Some(month), Some(data)) = (body.month, body.data) else {
        return Err(ApiError::bad_request("Month and data are required"));
    };
    let month = parse_month(&month)?;
    let record: MonthRecord = serde_json::from_value(data)
        .map_err(|e| ApiError::bad_request(format!("Invalid month data: {e}")))?;
    debug!("POST budget for {month}");
    Ok(Json(ledger.set_month(month, record).await?.into()))
}

async fn put_budget(
    State(ledger): State<Ledger>,
    body: Result<Json<CloneMonthBody>, JsonRejection>,
) -> Result<Json<WriteResponse>, ApiError> {
    let Json(body) = body.map_err(ApiError::from_rejection)?;
    let (Some(from), Some(to)) = (body.from_month, body.to_month) else {
        return Err(ApiError::bad_request("From month and to month are required"));
    };
    let (from, to) = (parse_month(&from)?, parse_month(&to)?);
    debug!("PUT budget clone {from} -> {to}");
    Ok(Json(ledger.clone_month(from, to).await?.into()))
}

async fn get_summary(
    State(ledger): State<Ledger>,
    Query(query): Query<MonthQuery>,
) -> Result<Response, ApiError> {
    let Some(month) = query.month else {
        return Err(ApiError::bad_request("Month is required"));
    };
    let month = parse_month(&month)?;
    Ok(Json(ledger.summary(month).await?).into_response())
}

fn parse_month(value: &str) -> Result<MonthKey, ApiError> {
    MonthKey::from_str(value).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// An error answer: `{error, message}` with a non-2xx status.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: ErrorType,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorType,
    message: &'a str,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ErrorType::Validation,
            message: message.into(),
        }
    }

    fn from_rejection(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<crate::Error> for ApiError {
    fn from(e: crate::Error) -> Self {
        let status = if e.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            error: e.error_type(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, Dataset};
    use crate::test::TestEnv;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn send(method: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/budget")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_then_get_month() {
        let env = TestEnv::new().await;
        let app = router(env.ledger().await);

        let data = json!({
            "balance": 1500.5,
            "cash": 0,
            "income": 3000,
            "target": 500,
            "automaticPayments": [{"id": "p1", "name": "Rent", "amount": 1200}],
            "creditPayments": []
        });
        let (status, body) = call(
            app.clone(),
            send("POST", json!({"month": "2026-03", "data": data})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["state"], json!("committed"));
        assert_eq!(
            body["data"]["automaticPayments"][0]["kind"],
            json!("recurring")
        );

        let (status, body) = call(app.clone(), get("/api/budget?month=2026-03")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], json!(1500.5));
        assert_eq!(body["automaticPayments"][0]["name"], json!("Rent"));

        let (status, body) = call(app.clone(), get("/api/budget/summary?month=2026-03")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remaining"], json!(3300.5));
        assert_eq!(body["spendable"], json!(2800.5));

        let (status, body) = call(app, get("/api/budget")).await;
        assert_eq!(status, StatusCode::OK);
        let dataset: Dataset = serde_json::from_value(body).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_month_is_empty_record() {
        let env = TestEnv::new().await;
        let app = router(env.ledger().await);
        let (status, body) = call(app, get("/api/budget?month=2031-01")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], json!(0));
        assert_eq!(body["creditPayments"], json!([]));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let env = TestEnv::new().await;
        let app = router(env.ledger().await);

        let (status, body) = call(app.clone(), get("/api/budget?month=2026-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("validation"));

        let (status, body) = call(app.clone(), send("POST", json!({"month": "2026-01"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Month and data are required"));

        let blank_name = json!({"automaticPayments": [{"id": "x", "name": "", "amount": 1}]});
        let (status, _) = call(
            app.clone(),
            send("POST", json!({"month": "2026-01", "data": blank_name})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app.clone(), send("PUT", json!({"fromMonth": "2026-01"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("From month and to month are required"));

        let (status, _) = call(app, get("/api/budget/summary")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(env.store().document("public/budget.json").is_none());
    }

    #[tokio::test]
    async fn test_put_clones_month() {
        let env = TestEnv::new().await;
        let ledger = env.ledger().await;
        ledger
            .update_month(MonthKey::from_str("2026-01").unwrap(), |record| {
                record.set_balance(Amount::from_cents(999));
                record.set_income(Amount::from_cents(100_000));
                Ok(())
            })
            .await
            .unwrap();

        let (status, body) = call(
            router(ledger),
            send("PUT", json!({"fromMonth": "2026-01", "toMonth": "2026-02"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["balance"], json!(0));
        assert_eq!(body["data"]["income"], json!(1000));
    }

    #[tokio::test]
    async fn test_degraded_save_is_reported() {
        let env = TestEnv::new().await;
        env.store().set_unreachable(true);
        let (status, body) = call(
            router(env.ledger().await),
            send("PUT", json!({"fromMonth": "2026-01", "toMonth": "2026-02"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["state"], json!("degraded"));
        assert!(body["reason"].as_str().unwrap().contains("unavailable"));
    }
}
