use std::collections::HashSet;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{can_manage_organization, CurrentUser};
use crate::handlers::{ensure_event_manager, find_event, managed_event};
use crate::models::{
    AttendeeDetails, GovIdType, MainEvent, NewSubEvent, NewTicket, Organization, SubEvent,
    SubEventChanges, SubEventType, SubEventUpdate, TicketIssue,
};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{optional_json, ApiJson, ApiPath};
use crate::utils::response::{created, success};
use crate::utils::validation;

/// Prices are stored as `NUMERIC(12, 2)`.
const MAX_PRICE_SCALE: u32 = 2;

fn max_price() -> Decimal {
    Decimal::new(10_000_000_000, 0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubEventRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub price: Decimal,
    pub event_type: SubEventType,
}

impl SubEventRequest {
    /// Field validation plus containment in the parent event's dates.
    fn validate(self, parent: &MainEvent) -> AppResult<SubEventChanges> {
        let fields = SubEventChanges {
            title: validation::required(&self.title, "Title is required")?,
            description: validation::required(&self.description, "Description is required")?,
            venue: validation::required(&self.venue, "Venue is required")?,
            start_date: self.start_date,
            end_date: self.end_date,
            capacity: self.capacity,
            price: self.price,
            event_type: self.event_type,
        };

        if fields.capacity < 1 {
            return Err(AppError::ValidationError(
                "Capacity must be at least 1".to_string(),
            ));
        }
        if fields.price < Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if fields.price.scale() > MAX_PRICE_SCALE {
            return Err(AppError::ValidationError(
                "Price can have at most 2 decimal places".to_string(),
            ));
        }
        if fields.price >= max_price() {
            return Err(AppError::ValidationError(
                "Price must be less than 10000000000".to_string(),
            ));
        }
        validation::date_order(fields.start_date, fields.end_date)?;
        if !parent.contains_range(fields.start_date, fields.end_date) {
            return Err(AppError::ValidationError(
                "Sub-event dates must be within main event dates".to_string(),
            ));
        }
        Ok(fields)
    }
}

/// Optional attendee identity sent with a ticket registration.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeRequest {
    pub attendee_name: Option<String>,
    pub attendee_dob: Option<String>,
    pub attendee_gov_id: Option<String>,
    pub attendee_gov_id_type: Option<String>,
}

impl AttendeeRequest {
    fn parse(self, today: NaiveDate) -> AppResult<AttendeeDetails> {
        let dob = match validation::optional(self.attendee_dob) {
            Some(raw) => {
                let date = parse_date(&raw).ok_or_else(|| {
                    AppError::ValidationError("Invalid date of birth".to_string())
                })?;
                if date > today {
                    return Err(AppError::ValidationError(
                        "Date of birth cannot be in the future".to_string(),
                    ));
                }
                Some(date)
            }
            None => None,
        };

        let gov_id_type = match validation::optional(self.attendee_gov_id_type) {
            Some(raw) => Some(
                serde_json::from_value::<GovIdType>(serde_json::Value::String(raw)).map_err(
                    |_| AppError::ValidationError("Invalid government ID type".to_string()),
                )?,
            ),
            None => None,
        };

        Ok(AttendeeDetails {
            name: validation::optional(self.attendee_name),
            dob,
            gov_id: validation::optional(self.attendee_gov_id),
            gov_id_type,
        })
    }
}

/// Accepts a plain `YYYY-MM-DD` date or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubEventListing {
    #[serde(flatten)]
    pub sub_event: SubEvent,
    pub is_registered: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverview {
    pub event: MainEvent,
    pub organization: Option<Organization>,
    pub is_organizer: bool,
    pub is_registered: bool,
    pub sub_events: Vec<SubEventListing>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubEventDetail {
    #[serde(flatten)]
    pub sub_event: SubEvent,
    pub main_event: MainEvent,
    pub is_organizer: bool,
    pub is_registered: bool,
    pub confirmed_count: i64,
    pub remaining_capacity: i64,
}

/// Loads a sub-event and checks it hangs under `event_id`.
async fn sub_event_of(state: &AppState, event_id: Uuid, sub_event_id: Uuid) -> AppResult<SubEvent> {
    let sub_event = state
        .store
        .find_sub_event(sub_event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Sub-event not found".to_string()))?;
    if sub_event.main_event_id != event_id {
        return Err(AppError::ValidationError(
            "Sub-event does not belong to this event".to_string(),
        ));
    }
    Ok(sub_event)
}

/// An event with its sub-events. Organizers see drafts; everyone else only
/// sees published events and sub-events.
pub async fn event_overview(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = find_event(&state, event_id).await?;
    let is_organizer =
        can_manage_organization(state.store.as_ref(), user.id(), event.organization_id).await?;
    if !is_organizer && !event.is_published() {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    let sub_events: Vec<SubEvent> = state
        .store
        .list_sub_events(&[event.id])
        .await?
        .into_iter()
        .filter(|s| is_organizer || s.is_published())
        .collect();
    let sub_event_ids: Vec<Uuid> = sub_events.iter().map(|s| s.id).collect();
    let registered: HashSet<Uuid> = state
        .store
        .list_confirmed_tickets(user.id(), &sub_event_ids)
        .await?
        .into_iter()
        .map(|t| t.sub_event_id)
        .collect();

    let organization = state.store.find_organization(event.organization_id).await?;
    let overview = EventOverview {
        is_organizer,
        is_registered: !registered.is_empty(),
        sub_events: sub_events
            .into_iter()
            .map(|sub_event| SubEventListing {
                is_registered: registered.contains(&sub_event.id),
                sub_event,
            })
            .collect(),
        organization,
        event,
    };
    Ok(success(overview, "Event retrieved"))
}

pub async fn get_sub_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((event_id, sub_event_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let sub_event = sub_event_of(&state, event_id, sub_event_id).await?;
    let event = find_event(&state, event_id).await?;
    let is_organizer =
        can_manage_organization(state.store.as_ref(), user.id(), event.organization_id).await?;
    if !is_organizer && !(event.is_published() && sub_event.is_published()) {
        return Err(AppError::NotFound("Sub-event not found".to_string()));
    }

    let is_registered = !state
        .store
        .list_confirmed_tickets(user.id(), &[sub_event.id])
        .await?
        .is_empty();
    let confirmed_count = state.store.count_confirmed_tickets(sub_event.id).await?;

    Ok(success(
        SubEventDetail {
            remaining_capacity: (i64::from(sub_event.capacity) - confirmed_count).max(0),
            sub_event,
            main_event: event,
            is_organizer,
            is_registered,
            confirmed_count,
        },
        "Sub-event retrieved",
    ))
}

pub async fn create_sub_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SubEventRequest>,
) -> AppResult<Response> {
    let event = managed_event(&state, &user, event_id, "create sub-events").await?;
    let fields = body.validate(&event)?;

    let sub_event = state
        .store
        .create_sub_event(NewSubEvent {
            main_event_id: event.id,
            title: fields.title,
            description: fields.description,
            venue: fields.venue,
            start_date: fields.start_date,
            end_date: fields.end_date,
            capacity: fields.capacity,
            price: fields.price,
            event_type: fields.event_type,
        })
        .await?;

    tracing::info!(sub_event_id = %sub_event.id, event_id = %event.id, "Sub-event created");
    Ok(created(sub_event, "Sub-event created"))
}

pub async fn update_sub_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((event_id, sub_event_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<SubEventRequest>,
) -> AppResult<Response> {
    let sub_event = sub_event_of(&state, event_id, sub_event_id).await?;
    let event = managed_event(&state, &user, event_id, "edit this sub-event").await?;
    let changes = body.validate(&event)?;

    let updated = match state.store.update_sub_event(sub_event.id, changes).await? {
        SubEventUpdate::Updated(updated) => updated,
        SubEventUpdate::BelowConfirmed { confirmed } => {
            tracing::debug!(sub_event_id = %sub_event.id, confirmed, "Capacity edit refused");
            return Err(AppError::ValidationError(
                "Capacity cannot be lower than the number of confirmed tickets".to_string(),
            ));
        }
        SubEventUpdate::Missing => {
            return Err(AppError::NotFound("Sub-event not found".to_string()))
        }
    };

    Ok(success(updated, "Sub-event updated"))
}

pub async fn publish_sub_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((event_id, sub_event_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let sub_event = sub_event_of(&state, event_id, sub_event_id).await?;
    let event = find_event(&state, event_id).await?;
    ensure_event_manager(&state, &user, &event, "publish this sub-event").await?;

    let published = state
        .store
        .publish_sub_event(sub_event.id)
        .await?
        .ok_or_else(|| AppError::ValidationError("Sub-event is already published".to_string()))?;

    tracing::info!(sub_event_id = %published.id, event_id = %event.id, "Sub-event published");
    Ok(success(published, "Sub-event published"))
}

/// Issues a ticket for a published sub-event of a published event.
pub async fn register_for_sub_event(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((event_id, sub_event_id)): ApiPath<(Uuid, Uuid)>,
    body: Bytes,
) -> AppResult<Response> {
    let sub_event = state
        .store
        .find_sub_event(sub_event_id)
        .await?
        .filter(|s| s.is_published() && s.main_event_id == event_id)
        .ok_or_else(|| AppError::NotFound("Sub-event not found or not published".to_string()))?;

    let event = find_event(&state, event_id).await?;
    if !event.is_published() {
        return Err(AppError::ValidationError(
            "Main event is not published".to_string(),
        ));
    }

    let now = Utc::now();
    let attendee = optional_json::<AttendeeRequest>(&body)?.parse(now.date_naive())?;
    let request = NewTicket::new(user.id(), sub_event.id, sub_event.price, attendee, now);

    match state.store.issue_ticket(request).await? {
        TicketIssue::Issued(ticket) => {
            tracing::info!(
                ticket_id = %ticket.id,
                sub_event_id = %sub_event.id,
                user_id = %user.id(),
                "Ticket issued"
            );
            Ok(created(ticket, "Registration successful"))
        }
        TicketIssue::AlreadyRegistered => Err(AppError::ValidationError(
            "You are already registered for this sub-event".to_string(),
        )),
        TicketIssue::SoldOut => Err(AppError::ValidationError(
            "This sub-event has reached its capacity".to_string(),
        )),
        TicketIssue::SubEventMissing => Err(AppError::NotFound(
            "Sub-event not found or not published".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date("1990-04-12"),
            NaiveDate::from_ymd_opt(1990, 4, 12)
        );
        assert_eq!(
            parse_date("1990-04-12T00:00:00Z"),
            NaiveDate::from_ymd_opt(1990, 4, 12)
        );
        assert_eq!(parse_date("12/04/1990"), None);
    }

    #[test]
    fn test_attendee_blank_fields_are_absent() {
        let request = AttendeeRequest {
            attendee_name: Some("  ".to_string()),
            attendee_dob: Some(String::new()),
            attendee_gov_id: None,
            attendee_gov_id_type: Some(String::new()),
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(request.parse(today).unwrap(), AttendeeDetails::default());
    }

    #[test]
    fn test_attendee_parses_identity() {
        let request = AttendeeRequest {
            attendee_name: Some("Ada Lovelace".to_string()),
            attendee_dob: Some("1990-04-12".to_string()),
            attendee_gov_id: Some("X123".to_string()),
            attendee_gov_id_type: Some("DRIVERS_LICENSE".to_string()),
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let details = request.parse(today).unwrap();
        assert_eq!(details.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(details.gov_id_type, Some(GovIdType::DriversLicense));
        assert_eq!(details.dob, NaiveDate::from_ymd_opt(1990, 4, 12));
    }

    #[test]
    fn test_attendee_rejects_bad_input() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let future = AttendeeRequest {
            attendee_dob: Some("2030-01-01".to_string()),
            ..Default::default()
        };
        assert!(future.parse(today).is_err());

        let bad_type = AttendeeRequest {
            attendee_gov_id_type: Some("LIBRARY_CARD".to_string()),
            ..Default::default()
        };
        assert!(bad_type.parse(today).is_err());
    }
}
