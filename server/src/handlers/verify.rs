//! Public check-in endpoints reached by scanning a ticket's QR code.

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::tickets::TicketContext;
use crate::models::TicketStatus;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiForm, ApiPath, ApiQuery};
use crate::utils::response::{see_other, success};
use crate::utils::validation;
use crate::utils::verification::VerificationPayload;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPreview {
    pub ticket_id: Uuid,
    pub ticket_number: String,
    pub event_title: String,
    pub sub_event_title: String,
    pub organization_name: Option<String>,
    pub start_date: DateTime<Utc>,
    pub venue: String,
    pub attendee_name: Option<String>,
    pub status: TicketStatus,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<&TicketContext> for VerificationPreview {
    fn from(context: &TicketContext) -> Self {
        Self {
            ticket_id: context.ticket.id,
            ticket_number: context.ticket.ticket_number.clone(),
            event_title: context.main_event.title.clone(),
            sub_event_title: context.sub_event.title.clone(),
            organization_name: context.organization_name(),
            start_date: context.sub_event.start_date,
            venue: context.sub_event.venue.clone(),
            attendee_name: context.ticket.attendee_name.clone(),
            status: context.ticket.status,
            used_at: context.ticket.used_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceForm {
    #[serde(default)]
    pub ticket_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub ticket: Uuid,
}

/// Decodes a scanned token and shows what the ticket is for.
pub async fn preview(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> AppResult<Response> {
    let payload = VerificationPayload::decode(&token)
        .ok_or_else(|| AppError::NotFound("Invalid verification link".to_string()))?;

    let ticket = state
        .store
        .find_ticket(payload.ticket_id)
        .await?
        .filter(|t| t.user_id == payload.user_id && t.is_confirmed())
        .ok_or_else(|| {
            AppError::ValidationError(
                "This ticket is either invalid or has already been used".to_string(),
            )
        })?;

    let context = TicketContext::load(&state, ticket).await?;
    if context.payload() != payload {
        tracing::warn!(ticket_id = %payload.ticket_id, "Verification token does not match ticket");
        return Err(AppError::ValidationError(
            "This ticket is not valid for this event".to_string(),
        ));
    }

    Ok(success(
        VerificationPreview::from(&context),
        "Ticket is valid",
    ))
}

/// Marks a confirmed ticket USED and redirects to the success page.
pub async fn mark_attendance(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<AttendanceForm>,
) -> AppResult<Response> {
    let raw = validation::required(&form.ticket_id, "Ticket ID is required")?;
    let not_found = || AppError::NotFound("Ticket not found".to_string());
    let ticket_id = Uuid::parse_str(&raw).map_err(|_| not_found())?;

    let ticket = state
        .store
        .find_ticket(ticket_id)
        .await?
        .ok_or_else(not_found)?;
    let invalid = || AppError::ValidationError("Ticket is not valid or already used".to_string());
    if !ticket.is_confirmed() {
        return Err(invalid());
    }

    let used = state
        .store
        .mark_ticket_used(ticket.id, Utc::now())
        .await?
        .ok_or_else(invalid)?;

    tracing::info!(ticket_id = %used.id, sub_event_id = %used.sub_event_id, "Ticket checked in");
    Ok(see_other(&format!("/verify/success?ticket={}", used.id)))
}

pub async fn success_view(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SuccessQuery>,
) -> AppResult<Response> {
    let ticket = state
        .store
        .find_ticket(query.ticket)
        .await?
        .filter(|t| t.status == TicketStatus::Used)
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    let context = TicketContext::load(&state, ticket).await?;
    Ok(success(
        VerificationPreview::from(&context),
        "Attendance recorded",
    ))
}
