use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{can_manage_organization, CurrentUser};
use crate::models::MainEvent;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::success;

pub mod auth;
pub mod events;
pub mod organizations;
pub mod sub_events;
pub mod tickets;
pub mod verify;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketing-api",
    };

    success(payload, "Health check successful")
}

pub(crate) async fn find_event(state: &AppState, event_id: Uuid) -> AppResult<MainEvent> {
    state
        .store
        .find_main_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// Fails with 403 unless the caller is an OWNER or ADMIN of the event's organization.
/// `action` completes the sentence "You must be an organization admin to ...".
pub(crate) async fn ensure_event_manager(
    state: &AppState,
    user: &CurrentUser,
    event: &MainEvent,
    action: &str,
) -> AppResult<()> {
    if can_manage_organization(state.store.as_ref(), user.id(), event.organization_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "You must be an organization admin to {}",
            action
        )))
    }
}

/// Loads the event and applies [`ensure_event_manager`].
pub(crate) async fn managed_event(
    state: &AppState,
    user: &CurrentUser,
    event_id: Uuid,
    action: &str,
) -> AppResult<MainEvent> {
    let event = find_event(state, event_id).await?;
    ensure_event_manager(state, user, &event, action).await?;
    Ok(event)
}
