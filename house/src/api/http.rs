use arcade_types::{
    BalanceQuery, DepositRequest, GuessRequest, PlaceBetRequest, ReportOutcomeRequest,
    WagerHistoryQuery, WithdrawalRequest,
};
use axum::{
    extract::{Query, State as AxumState},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{House, HouseError};

/// Simple health response for basic liveness checks
#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

fn respond<T: Serialize>(result: Result<T, HouseError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn config(AxumState(house): AxumState<Arc<House>>) -> Response {
    Json(house.config.clone()).into_response()
}

pub(super) async fn metrics(
    headers: HeaderMap,
    AxumState(house): AxumState<Arc<House>>,
) -> Response {
    if let Some(status) = metrics_auth_error(house.config.metrics_token.as_deref(), &headers) {
        return status.into_response();
    }
    Json(house.metrics_snapshot()).into_response()
}

pub(super) async fn balance(
    AxumState(house): AxumState<Arc<House>>,
    Query(query): Query<BalanceQuery>,
) -> Response {
    Json(house.balances(&query.wallet)).into_response()
}

pub(super) async fn wagers(
    AxumState(house): AxumState<Arc<House>>,
    Query(query): Query<WagerHistoryQuery>,
) -> Response {
    Json(house.wager_history(&query)).into_response()
}

pub(super) async fn place_bet(
    AxumState(house): AxumState<Arc<House>>,
    Json(request): Json<PlaceBetRequest>,
) -> Response {
    respond(house.place_bet(request).await)
}

pub(super) async fn guess(
    AxumState(house): AxumState<Arc<House>>,
    Json(request): Json<GuessRequest>,
) -> Response {
    respond(house.guess(request).await)
}

pub(super) async fn report_outcome(
    AxumState(house): AxumState<Arc<House>>,
    Json(request): Json<ReportOutcomeRequest>,
) -> Response {
    respond(house.report_outcome(request).await)
}

pub(super) async fn record_deposit(
    AxumState(house): AxumState<Arc<House>>,
    Json(request): Json<DepositRequest>,
) -> Response {
    respond(house.record_deposit(request).await)
}

pub(super) async fn request_withdrawal(
    AxumState(house): AxumState<Arc<House>>,
    Json(request): Json<WithdrawalRequest>,
) -> Response {
    respond(house.request_withdrawal(request).await)
}

fn metrics_auth_error(token: Option<&str>, headers: &HeaderMap) -> Option<StatusCode> {
    let token = token.filter(|token| !token.is_empty())?;
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let header_token = headers
        .get("x-metrics-token")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(token) || header_token == Some(token) {
        None
    } else {
        Some(StatusCode::UNAUTHORIZED)
    }
}
