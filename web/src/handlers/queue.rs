//! Drop queue endpoints.

use crate::error::AppError;
use crate::extractors::{ClientIp, UserAgent};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use drop_commerce_core::admission::JoinRequest;
use drop_commerce_core::hashing::ClientSignals;
use drop_commerce_core::store::Store;
use drop_commerce_core::types::{CustomerInput, DropId, QueueTicketView, TicketId};
use serde::Deserialize;

/// Queue join request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    /// Customer, upserted by email
    pub customer: CustomerInput,
    /// Browser fingerprint
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Query string of the ticket status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    /// Ticket to look up
    pub ticket_id: Option<String>,
}

fn parse_drop_id(raw: &str) -> Result<DropId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("Invalid drop id: {raw}")))
}

/// Join a drop's release queue.
///
/// # Endpoint
///
/// ```text
/// POST /api/drops/:drop_id/queue
/// ```
///
/// Answers 201 with the ticket view. A risk-rejected join still answers 201,
/// with status `REJECTED` and the reason in `riskReason`.
///
/// # Errors
///
/// - 400 malformed body or drop id
/// - 403 drop not open or not queueing
/// - 404 unknown drop
pub async fn join_queue<S: Store>(
    State(state): State<AppState<S>>,
    Path(drop_id): Path<String>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    body: Result<Json<JoinBody>, JsonRejection>,
) -> Result<(StatusCode, Json<QueueTicketView>), AppError> {
    let drop_id = parse_drop_id(&drop_id)?;
    let Json(body) = body?;

    let view = state
        .admission
        .join_queue(JoinRequest {
            drop_id,
            customer: body.customer,
            signals: ClientSignals {
                fingerprint: body.fingerprint,
                ip,
                user_agent,
            },
        })
        .await?;

    tracing::debug!(%drop_id, ticket_id = %view.ticket_id, status = view.status.as_str(), "Queue join answered");
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current state of a queue ticket.
///
/// # Endpoint
///
/// ```text
/// GET /api/drops/:drop_id/queue?ticketId=<uuid>
/// ```
///
/// # Errors
///
/// - 400 missing or malformed `ticketId`
/// - 404 unknown drop or ticket
pub async fn ticket_status<S: Store>(
    State(state): State<AppState<S>>,
    Path(drop_id): Path<String>,
    query: Result<Query<TicketQuery>, QueryRejection>,
) -> Result<Json<QueueTicketView>, AppError> {
    let drop_id = parse_drop_id(&drop_id)?;
    let Query(query) = query?;
    let raw = query
        .ticket_id
        .ok_or_else(|| AppError::bad_request("ticketId is required"))?;
    let ticket_id: TicketId = raw
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid ticket id: {raw}")))?;

    Ok(Json(state.admission.get_ticket(drop_id, ticket_id).await?))
}
