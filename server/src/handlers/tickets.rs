use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::{MainEvent, Organization, SubEvent, Ticket, TicketStatus};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::ApiPath;
use crate::utils::response::success;
use crate::utils::verification::{verification_url, VerificationPayload};

/// A ticket together with the sub-event, main event and organization it
/// belongs to.
pub(crate) struct TicketContext {
    pub ticket: Ticket,
    pub sub_event: SubEvent,
    pub main_event: MainEvent,
    pub organization: Option<Organization>,
}

impl TicketContext {
    pub(crate) async fn load(state: &AppState, ticket: Ticket) -> AppResult<Self> {
        let sub_event = state
            .store
            .find_sub_event(ticket.sub_event_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Ticket {} references a missing sub-event",
                    ticket.id
                ))
            })?;
        let main_event = state
            .store
            .find_main_event(sub_event.main_event_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Sub-event {} references a missing event",
                    sub_event.id
                ))
            })?;
        let organization = state
            .store
            .find_organization(main_event.organization_id)
            .await?;

        Ok(Self {
            ticket,
            sub_event,
            main_event,
            organization,
        })
    }

    pub(crate) fn organization_name(&self) -> Option<String> {
        self.organization.as_ref().map(|o| o.name.clone())
    }

    pub(crate) fn payload(&self) -> VerificationPayload {
        VerificationPayload {
            ticket_id: self.ticket.id,
            user_id: self.ticket.user_id,
            event_id: self.main_event.id,
            sub_event_id: self.sub_event.id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub event_title: String,
    pub sub_event_title: String,
    pub organization_name: Option<String>,
    pub start_date: DateTime<Utc>,
    pub venue: String,
}

impl From<TicketContext> for TicketSummary {
    fn from(context: TicketContext) -> Self {
        let organization_name = context.organization_name();
        Self {
            ticket: context.ticket,
            event_title: context.main_event.title,
            sub_event_title: context.sub_event.title,
            organization_name,
            start_date: context.sub_event.start_date,
            venue: context.sub_event.venue,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub summary: TicketSummary,
    pub verification_token: String,
    pub verification_url: String,
}

/// Loads a ticket owned by the caller. Tickets of other users read as missing.
async fn owned_ticket(state: &AppState, user: &CurrentUser, ticket_id: Uuid) -> AppResult<Ticket> {
    state
        .store
        .find_ticket(ticket_id)
        .await?
        .filter(|t| t.user_id == user.id())
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    let tickets = state.store.list_tickets_for_user(user.id()).await?;

    let mut summaries = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        summaries.push(TicketSummary::from(TicketContext::load(&state, ticket).await?));
    }
    Ok(success(summaries, "Tickets retrieved"))
}

/// A confirmed ticket with the token and link its QR code encodes.
pub async fn get_ticket(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let ticket = owned_ticket(&state, &user, ticket_id).await?;
    if !ticket.is_confirmed() {
        return Err(AppError::NotFound("Ticket not found".to_string()));
    }

    let context = TicketContext::load(&state, ticket).await?;
    let token = context.payload().encode();
    let url = verification_url(&state.config.public_base_url, &token);

    Ok(success(
        TicketDetail {
            summary: context.into(),
            verification_token: token,
            verification_url: url,
        },
        "Ticket retrieved",
    ))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let ticket = owned_ticket(&state, &user, ticket_id).await?;
    if ticket.status != TicketStatus::Confirmed {
        return Err(AppError::ValidationError(
            "Only confirmed tickets can be cancelled".to_string(),
        ));
    }

    let cancelled = state.store.cancel_ticket(ticket.id).await?.ok_or_else(|| {
        AppError::ValidationError("Only confirmed tickets can be cancelled".to_string())
    })?;

    tracing::info!(ticket_id = %cancelled.id, user_id = %user.id(), "Ticket cancelled");
    Ok(success(cancelled, "Ticket cancelled"))
}
