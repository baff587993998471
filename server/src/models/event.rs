use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Publication state shared by main events and sub-events.
///
/// The only transition is `Draft -> Published`; there is no unpublish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "event_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "sub_event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubEventType {
    #[default]
    General,
    Competition,
    Workshop,
    Performance,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MainEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MainEvent {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }

    /// Whether `[start, end]` lies inside this event's own date range.
    pub fn contains_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start >= self.start_date && end <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubEvent {
    pub id: Uuid,
    pub main_event_id: Uuid,
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub price: Decimal,
    pub event_type: SubEventType,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubEvent {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

#[derive(Debug, Clone)]
pub struct NewMainEvent {
    pub organization_id: Uuid,
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewMainEvent {
    pub fn into_event(self, now: DateTime<Utc>) -> MainEvent {
        MainEvent {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            title: self.title,
            description: self.description,
            venue: self.venue,
            start_date: self.start_date,
            end_date: self.end_date,
            status: EventStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Full replacement of a main event's editable fields.
#[derive(Debug, Clone)]
pub struct MainEventChanges {
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl MainEventChanges {
    pub fn apply(self, event: &mut MainEvent, now: DateTime<Utc>) {
        event.title = self.title;
        event.description = self.description;
        event.venue = self.venue;
        event.start_date = self.start_date;
        event.end_date = self.end_date;
        event.updated_at = now;
    }
}

#[derive(Debug, Clone)]
pub struct NewSubEvent {
    pub main_event_id: Uuid,
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub price: Decimal,
    pub event_type: SubEventType,
}

impl NewSubEvent {
    pub fn into_sub_event(self, now: DateTime<Utc>) -> SubEvent {
        SubEvent {
            id: Uuid::new_v4(),
            main_event_id: self.main_event_id,
            title: self.title,
            description: self.description,
            venue: self.venue,
            start_date: self.start_date,
            end_date: self.end_date,
            capacity: self.capacity,
            price: self.price,
            event_type: self.event_type,
            status: EventStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubEventChanges {
    pub title: String,
    pub description: String,
    pub venue: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub price: Decimal,
    pub event_type: SubEventType,
}

impl SubEventChanges {
    pub fn apply(self, sub_event: &mut SubEvent, now: DateTime<Utc>) {
        sub_event.title = self.title;
        sub_event.description = self.description;
        sub_event.venue = self.venue;
        sub_event.start_date = self.start_date;
        sub_event.end_date = self.end_date;
        sub_event.capacity = self.capacity;
        sub_event.price = self.price;
        sub_event.event_type = self.event_type;
        sub_event.updated_at = now;
    }
}

/// Outcome of editing a sub-event. The capacity check and the write happen
/// together, so a concurrent registration cannot push the count past the
/// new capacity.
#[derive(Debug, Clone)]
pub enum SubEventUpdate {
    Updated(SubEvent),
    BelowConfirmed { confirmed: i64 },
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn festival() -> MainEvent {
        let start = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        NewMainEvent {
            organization_id: Uuid::new_v4(),
            title: "Festival".to_string(),
            description: "Summer festival".to_string(),
            venue: "Main square".to_string(),
            start_date: start,
            end_date: start + Duration::days(3),
        }
        .into_event(Utc::now())
    }

    #[test]
    fn test_new_events_start_as_draft() {
        let event = festival();
        assert_eq!(event.status, EventStatus::Draft);
        assert!(!event.is_published());
    }

    #[test]
    fn test_contains_range_is_inclusive() {
        let event = festival();
        assert!(event.contains_range(event.start_date, event.end_date));
        assert!(event.contains_range(
            event.start_date + Duration::hours(1),
            event.start_date + Duration::hours(2)
        ));
        assert!(!event.contains_range(event.start_date - Duration::minutes(1), event.end_date));
        assert!(!event.contains_range(event.start_date, event.end_date + Duration::minutes(1)));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(EventStatus::Published).unwrap(),
            "PUBLISHED"
        );
        let parsed: SubEventType = serde_json::from_str("\"WORKSHOP\"").unwrap();
        assert_eq!(parsed, SubEventType::Workshop);
    }
}
