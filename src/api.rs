//! HTTP boundary for checkout, tracking and order history.
//!
//! Every response carries `success`; failures add a `message` and never
//! expose storage details. A wrong email and an unknown identifier produce
//! the same not-found answer so order codes cannot be probed.

use crate::checkout::{CheckoutRequest, CheckoutService};
use crate::entity::order::{self, OrderStatus};
use crate::error::OrderError;
use crate::lookup::{buyer_query, HistoryEntry, OrderLookup, TrackingView};
use crate::pricing::{from_stored, to_f64};
use crate::repository::OrderRepository;
use crate::timeline::format_timestamp;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const NOT_FOUND_MESSAGE: &str = "Order not found. Please check your order ID or tracking number.";
const INTERNAL_MESSAGE: &str = "We could not process the order right now. Please try again.";
const TIMEOUT_MESSAGE: &str = "The order service is busy. Please try again.";

#[derive(Clone)]
pub struct AppState {
    pub repository: OrderRepository,
    pub checkout: Arc<CheckoutService>,
    pub lookup: OrderLookup,
}

impl AppState {
    pub fn new(repository: OrderRepository) -> Self {
        Self {
            checkout: Arc::new(CheckoutService::new(repository.clone())),
            lookup: OrderLookup::new(repository.clone()),
            repository,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/checkout", post(checkout))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/track", get(track_query).post(track_json))
        .route("/api/orders/history", get(history_query).post(history_json))
        .route("/api/orders/{code}/status", put(update_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Failure envelope: `{ "success": false, "message": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(message) => Self::bad_request(message),
            OrderError::NotFound(_) | OrderError::OwnershipMismatch(_) => {
                tracing::debug!(error = %err, "order lookup refused");
                Self {
                    status: StatusCode::NOT_FOUND,
                    message: NOT_FOUND_MESSAGE.to_owned(),
                }
            }
            OrderError::Timeout(_) => {
                tracing::error!(error = %err, "order request timed out");
                Self {
                    status: StatusCode::GATEWAY_TIMEOUT,
                    message: TIMEOUT_MESSAGE.to_owned(),
                }
            }
            OrderError::Conflict(_) | OrderError::Persistence(_) => {
                tracing::error!(error = %err, "order persistence failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: INTERNAL_MESSAGE.to_owned(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(format!("Invalid query: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct Failure {
    success: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Failure {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> ApiResult<T> {
    Ok(Json(Success {
        success: true,
        body,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct SummaryBody {
    subtotal: f64,
    shipping: f64,
    tax: f64,
    total: f64,
}

#[derive(Serialize)]
struct PlacedOrder {
    id: String,
    tracking_number: String,
    summary: SummaryBody,
    status: OrderStatus,
    estimated_delivery: String,
    ordered_at: String,
}

#[derive(Serialize)]
struct CheckoutBody {
    message: &'static str,
    order: PlacedOrder,
}

async fn checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<CheckoutBody> {
    let Json(request) = payload?;
    let receipt = state.checkout.place_order(request).await?;
    ok(CheckoutBody {
        message: "Order placed successfully",
        order: PlacedOrder {
            id: receipt.order_code,
            tracking_number: receipt.tracking_number,
            summary: SummaryBody {
                subtotal: to_f64(receipt.summary.subtotal),
                shipping: to_f64(receipt.summary.shipping),
                tax: to_f64(receipt.summary.tax),
                total: to_f64(receipt.summary.total),
            },
            status: receipt.status,
            estimated_delivery: receipt.estimated_delivery.format("%Y-%m-%d").to_string(),
            ordered_at: format_timestamp(receipt.ordered_at),
        },
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TrackParams {
    order_id: String,
    email: Option<String>,
}

#[derive(Serialize)]
struct TrackBody {
    order: TrackingView,
}

async fn track(state: AppState, params: TrackParams) -> ApiResult<TrackBody> {
    let order = state
        .lookup
        .track(&params.order_id, params.email.as_deref())
        .await?;
    ok(TrackBody { order })
}

async fn track_query(
    State(state): State<AppState>,
    params: Result<Query<TrackParams>, QueryRejection>,
) -> ApiResult<TrackBody> {
    let Query(params) = params?;
    track(state, params).await
}

async fn track_json(
    State(state): State<AppState>,
    params: Result<Json<TrackParams>, JsonRejection>,
) -> ApiResult<TrackBody> {
    let Json(params) = params?;
    track(state, params).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HistoryParams {
    user_id: Option<i64>,
    email: Option<String>,
}

#[derive(Serialize)]
struct HistoryBody {
    orders: Vec<HistoryEntry>,
    total_orders: usize,
    total_spent: f64,
    average_order: f64,
}

async fn history(state: AppState, params: HistoryParams) -> ApiResult<HistoryBody> {
    let query = buyer_query(params.user_id, params.email.as_deref())?;
    let history = state.lookup.history(&query).await?;
    ok(HistoryBody {
        total_orders: history.total_orders(),
        total_spent: to_f64(history.total_spent),
        average_order: to_f64(history.average_order),
        orders: history.orders,
    })
}

async fn history_query(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<HistoryBody> {
    let Query(params) = params?;
    history(state, params).await
}

async fn history_json(
    State(state): State<AppState>,
    params: Result<Json<HistoryParams>, JsonRejection>,
) -> ApiResult<HistoryBody> {
    let Json(params) = params?;
    history(state, params).await
}

#[derive(Serialize)]
struct OrderTotal {
    total: f64,
}

#[derive(Serialize)]
struct OrderBuyer {
    name: String,
    email: String,
}

#[derive(Serialize)]
struct OrderRow {
    id: String,
    status: OrderStatus,
    ordered_at: String,
    summary: OrderTotal,
    user: OrderBuyer,
}

#[derive(Serialize)]
struct OrdersBody {
    orders: Vec<OrderRow>,
    count: usize,
    revenue: f64,
}

async fn list_orders(State(state): State<AppState>) -> ApiResult<OrdersBody> {
    let orders = state.repository.list_orders().await?;
    let revenue: Decimal = orders.iter().map(|o| from_stored(o.total)).sum();
    let orders: Vec<OrderRow> = orders
        .into_iter()
        .map(|o| OrderRow {
            ordered_at: format_timestamp(o.ordered_at),
            summary: OrderTotal {
                total: to_f64(from_stored(o.total)),
            },
            status: o.status,
            id: o.order_code,
            user: OrderBuyer {
                name: o.user_name,
                email: o.user_email,
            },
        })
        .collect();
    ok(OrdersBody {
        count: orders.len(),
        revenue: to_f64(revenue),
        orders,
    })
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: OrderStatus,
}

#[derive(Serialize)]
struct StatusRow {
    id: String,
    status: OrderStatus,
    delivered_at: Option<String>,
}

#[derive(Serialize)]
struct StatusBody {
    order: StatusRow,
}

impl From<order::Model> for StatusRow {
    fn from(o: order::Model) -> Self {
        Self {
            id: o.order_code,
            status: o.status,
            delivered_at: o.delivered_at.map(format_timestamp),
        }
    }
}

async fn update_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
    change: Result<Json<StatusChange>, JsonRejection>,
) -> ApiResult<StatusBody> {
    let Json(change) = change?;
    let code = code.trim().to_uppercase();
    let updated = state.repository.update_status(&code, change.status).await?;
    tracing::info!(order_code = %updated.order_code, status = updated.status.as_str(), "order status changed");
    ok(StatusBody {
        order: updated.into(),
    })
}
