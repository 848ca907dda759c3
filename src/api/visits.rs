//! Visit and check-in/check-out endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        card::{IssuedCard, PrintedCard},
        visit::{
            CheckedInVisitor, CreateVisit, ScanRequest, ScanResponse, VisitDecision, VisitDetails,
        },
    },
};

use super::AuthenticatedOperator;

/// Check a visitor in by scanning their card
#[utoipa::path(
    post,
    path = "/checkin",
    tag = "desk",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Checked in", body = ScanResponse),
        (status = 400, description = "No QR data"),
        (status = 404, description = "Card not found"),
        (status = 409, description = "Already checked in today"),
        (status = 422, description = "Visit period not valid for today or finished")
    )
)]
pub async fn check_in(
    State(state): State<crate::AppState>,
    Json(request): Json<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    let response = state.services.visits.check_in(&request, Utc::now()).await?;
    Ok(Json(response))
}

/// Check a visitor out by scanning their card
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "desk",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Checked out", body = ScanResponse),
        (status = 400, description = "No QR data"),
        (status = 404, description = "Card not found"),
        (status = 422, description = "Not checked in today or already checked out")
    )
)]
pub async fn check_out(
    State(state): State<crate::AppState>,
    Json(request): Json<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    let response = state.services.visits.check_out(&request, Utc::now()).await?;
    Ok(Json(response))
}

/// List visitors currently checked in
#[utoipa::path(
    get,
    path = "/visits/checked-in",
    tag = "visits",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visitors inside the facility", body = Vec<CheckedInVisitor>)
    )
)]
pub async fn list_checked_in(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
) -> AppResult<Json<Vec<CheckedInVisitor>>> {
    claims.require_hr()?;

    let visitors = state.services.visits.checked_in().await?;
    Ok(Json(visitors))
}

/// Check a visitor out on their behalf
#[utoipa::path(
    post,
    path = "/visits/{id}/manual-checkout",
    tag = "visits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Checked out by HR", body = ScanResponse),
        (status = 404, description = "Visit not found"),
        (status = 422, description = "No active check-in")
    )
)]
pub async fn manual_checkout(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<Json<ScanResponse>> {
    claims.require_hr()?;

    let response = state.services.visits.manual_checkout(id, Utc::now()).await?;
    Ok(Json(response))
}

/// Register a visitor and authorize a visit
#[utoipa::path(
    post,
    path = "/visits",
    tag = "visits",
    security(("bearer_auth" = [])),
    request_body = CreateVisit,
    responses(
        (status = 201, description = "Visit created", body = VisitDetails),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Visitor email already in use")
    )
)]
pub async fn create_visit(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Json(data): Json<CreateVisit>,
) -> AppResult<(StatusCode, Json<VisitDetails>)> {
    claims.require_registration()?;

    let visit = state
        .services
        .visits
        .create(&data, claims.email.clone(), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

/// Get a visit with today's window status
#[utoipa::path(
    get,
    path = "/visits/{id}",
    tag = "visits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit details", body = VisitDetails),
        (status = 404, description = "Visit not found")
    )
)]
pub async fn get_visit(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(_claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<Json<VisitDetails>> {
    let visit = state.services.visits.get(id, Utc::now()).await?;
    Ok(Json(visit))
}

/// Issue the visitor card for a visit
#[utoipa::path(
    post,
    path = "/visits/{id}/card",
    tag = "visits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 201, description = "Card issued", body = IssuedCard),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit not approved or already has a card")
    )
)]
pub async fn issue_card(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<IssuedCard>)> {
    claims.require_registration()?;

    let card = state.services.visits.issue_card(id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// Approve a pending visit
#[utoipa::path(
    post,
    path = "/visits/{id}/approve",
    tag = "visits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit approved", body = VisitDetails),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit already decided")
    )
)]
pub async fn approve_visit(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<Json<VisitDetails>> {
    claims.require_approver()?;

    let visit = state
        .services
        .visits
        .decide(id, VisitDecision::Approve, claims.email.clone(), Utc::now())
        .await?;
    Ok(Json(visit))
}

/// Reject a pending visit
#[utoipa::path(
    post,
    path = "/visits/{id}/reject",
    tag = "visits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Visit rejected", body = VisitDetails),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit already decided")
    )
)]
pub async fn reject_visit(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<Json<VisitDetails>> {
    claims.require_approver()?;

    let visit = state
        .services
        .visits
        .decide(id, VisitDecision::Reject, claims.email.clone(), Utc::now())
        .await?;
    Ok(Json(visit))
}

/// Approved visits whose card still has to be printed
#[utoipa::path(
    get,
    path = "/visits/print-queue",
    tag = "cards",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visits awaiting card printing", body = Vec<VisitDetails>)
    )
)]
pub async fn print_queue(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
) -> AppResult<Json<Vec<VisitDetails>>> {
    claims.require_registration()?;

    let visits = state.services.visits.print_queue(Utc::now()).await?;
    Ok(Json(visits))
}

/// Confirm a visit's card was printed and handed over
#[utoipa::path(
    post,
    path = "/visits/{id}/card/printed",
    tag = "cards",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 200, description = "Card marked printed", body = PrintedCard),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Visit not approved, has no card, or card already printed")
    )
)]
pub async fn mark_card_printed(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<Json<PrintedCard>> {
    claims.require_registration()?;

    let printed = state.services.visits.mark_printed(id, Utc::now()).await?;
    Ok(Json(printed))
}

/// Delete a visit whose card was never printed
#[utoipa::path(
    delete,
    path = "/visits/{id}",
    tag = "cards",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Visit ID")),
    responses(
        (status = 204, description = "Visit deleted"),
        (status = 404, description = "Visit not found"),
        (status = 409, description = "Card already printed")
    )
)]
pub async fn delete_visit(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_registration()?;

    state.services.visits.delete_unprinted(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
