use std::collections::HashMap;

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::handlers::managed_event;
use crate::models::{MainEvent, MainEventChanges, NewMainEvent, Organization, SubEvent};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiJson, ApiPath};
use crate::utils::response::{created, success};
use crate::utils::validation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl EventRequest {
    fn validate(self) -> AppResult<MainEventChanges> {
        let changes = MainEventChanges {
            title: validation::required(&self.title, "Title is required")?,
            description: validation::required(&self.description, "Description is required")?,
            venue: validation::required(&self.venue, "Venue is required")?,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        validation::date_order(changes.start_date, changes.end_date)?;
        Ok(changes)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListing {
    #[serde(flatten)]
    pub event: MainEvent,
    pub organization: Option<Organization>,
    pub sub_events: Vec<SubEvent>,
}

/// Attaches each event's organization and sub-events, keeping only
/// sub-events accepted by `keep`.
async fn build_listings(
    state: &AppState,
    events: Vec<MainEvent>,
    keep: impl Fn(&SubEvent) -> bool,
) -> AppResult<Vec<EventListing>> {
    let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    let mut sub_events_by_event: HashMap<Uuid, Vec<SubEvent>> = HashMap::new();
    for sub_event in state.store.list_sub_events(&event_ids).await? {
        if keep(&sub_event) {
            sub_events_by_event
                .entry(sub_event.main_event_id)
                .or_default()
                .push(sub_event);
        }
    }

    let mut organizations: HashMap<Uuid, Option<Organization>> = HashMap::new();
    let mut listings = Vec::with_capacity(events.len());
    for event in events {
        if !organizations.contains_key(&event.organization_id) {
            let organization = state.store.find_organization(event.organization_id).await?;
            organizations.insert(event.organization_id, organization);
        }
        listings.push(EventListing {
            organization: organizations
                .get(&event.organization_id)
                .cloned()
                .flatten(),
            sub_events: sub_events_by_event.remove(&event.id).unwrap_or_default(),
            event,
        });
    }
    Ok(listings)
}

/// Published events visible to every signed-in user.
pub async fn list_published_events(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Response> {
    let events = state.store.list_published_main_events().await?;
    let listings = build_listings(&state, events, SubEvent::is_published).await?;
    Ok(success(listings, "Events retrieved"))
}

/// Every event, drafts included, of the organizations the caller belongs to.
pub async fn list_managed_events(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    let organization_ids: Vec<Uuid> = state
        .store
        .list_memberships(user.id())
        .await?
        .into_iter()
        .map(|m| m.organization_id)
        .collect();

    let events = if organization_ids.is_empty() {
        Vec::new()
    } else {
        state
            .store
            .list_main_events_for_organizations(&organization_ids)
            .await?
    };
    let listings = build_listings(&state, events, |_| true).await?;
    Ok(success(listings, "Managed events retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<EventRequest>,
) -> AppResult<Response> {
    let membership = state
        .store
        .list_memberships(user.id())
        .await?
        .into_iter()
        .find(|m| m.role.can_manage_events())
        .ok_or_else(|| {
            AppError::Forbidden("You must be an organization admin to create events".to_string())
        })?;

    let fields = body.validate()?;
    let event = state
        .store
        .create_main_event(NewMainEvent {
            organization_id: membership.organization_id,
            title: fields.title,
            description: fields.description,
            venue: fields.venue,
            start_date: fields.start_date,
            end_date: fields.end_date,
        })
        .await?;

    tracing::info!(
        event_id = %event.id,
        organization_id = %event.organization_id,
        "Event created"
    );
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = managed_event(&state, &user, event_id, "view this event").await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<EventRequest>,
) -> AppResult<Response> {
    let event = managed_event(&state, &user, event_id, "edit this event").await?;
    let changes = body.validate()?;

    let sub_events = state.store.list_sub_events(&[event.id]).await?;
    let uncovered = sub_events
        .iter()
        .any(|s| s.start_date < changes.start_date || s.end_date > changes.end_date);
    if uncovered {
        return Err(AppError::ValidationError(
            "Event dates must cover all sub-event dates".to_string(),
        ));
    }

    let updated = state
        .store
        .update_main_event(event.id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(success(updated, "Event updated"))
}

pub async fn publish_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = managed_event(&state, &user, event_id, "publish this event").await?;

    let published = state
        .store
        .publish_main_event(event.id)
        .await?
        .ok_or_else(|| AppError::ValidationError("Event is already published".to_string()))?;

    tracing::info!(event_id = %published.id, "Event published");
    Ok(success(published, "Event published"))
}

/// Direct registration for a published event that has no published sub-events.
pub async fn register_for_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = state
        .store
        .find_main_event(event_id)
        .await?
        .filter(MainEvent::is_published)
        .ok_or_else(|| AppError::NotFound("Event not found or not published".to_string()))?;

    let has_sub_events = state
        .store
        .list_sub_events(&[event.id])
        .await?
        .iter()
        .any(SubEvent::is_published);
    if has_sub_events {
        return Err(AppError::ValidationError(
            "This event has sub-events. Please register for specific sub-events instead."
                .to_string(),
        ));
    }

    let registration = state
        .store
        .create_event_registration(user.id(), event.id)
        .await?
        .ok_or_else(|| {
            AppError::ValidationError("You are already registered for this event".to_string())
        })?;

    tracing::info!(event_id = %event.id, user_id = %user.id(), "Event registration created");
    Ok(created(registration, "Registration successful"))
}
