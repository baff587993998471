use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Confirmed,
    Cancelled,
    Pending,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "gov_id_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovIdType {
    Passport,
    DriversLicense,
    NationalId,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sub_event_id: Uuid,
    pub ticket_number: String,
    pub status: TicketStatus,
    pub price: Decimal,
    pub attendee_name: Option<String>,
    pub attendee_dob: Option<NaiveDate>,
    pub attendee_gov_id: Option<String>,
    pub attendee_gov_id_type: Option<GovIdType>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_confirmed(&self) -> bool {
        self.status == TicketStatus::Confirmed
    }
}

/// Identity of the person attending on a ticket. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendeeDetails {
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gov_id: Option<String>,
    pub gov_id_type: Option<GovIdType>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: Uuid,
    pub sub_event_id: Uuid,
    pub ticket_number: String,
    pub price: Decimal,
    pub attendee: AttendeeDetails,
}

impl NewTicket {
    pub fn new(
        user_id: Uuid,
        sub_event_id: Uuid,
        price: Decimal,
        attendee: AttendeeDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            sub_event_id,
            ticket_number: ticket_number(sub_event_id, user_id, now),
            price,
            attendee,
        }
    }

    pub fn into_ticket(self, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            sub_event_id: self.sub_event_id,
            ticket_number: self.ticket_number,
            status: TicketStatus::Confirmed,
            price: self.price,
            attendee_name: self.attendee.name,
            attendee_dob: self.attendee.dob,
            attendee_gov_id: self.attendee.gov_id,
            attendee_gov_id_type: self.attendee.gov_id_type,
            used_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of an atomic issue attempt against a sub-event.
#[derive(Debug, Clone)]
pub enum TicketIssue {
    Issued(Ticket),
    AlreadyRegistered,
    SoldOut,
    SubEventMissing,
}

/// Human-readable ticket number. Not a secret and not unique by constraint.
pub fn ticket_number(sub_event_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> String {
    format!("{}-{}-{}", sub_event_id, user_id, now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ticket_number_embeds_ids_and_millis() {
        let sub_event_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let now = Utc.timestamp_millis_opt(1_780_000_000_123).unwrap();

        let number = ticket_number(sub_event_id, user_id, now);
        assert_eq!(number, format!("{sub_event_id}-{user_id}-1780000000123"));
    }

    #[test]
    fn test_issued_ticket_is_confirmed_and_unused() {
        let attendee = AttendeeDetails {
            name: Some("Grace Hopper".to_string()),
            gov_id_type: Some(GovIdType::Passport),
            ..Default::default()
        };
        let now = Utc::now();
        let price = Decimal::new(1500, 2);
        let ticket =
            NewTicket::new(Uuid::new_v4(), Uuid::new_v4(), price, attendee, now).into_ticket(now);

        assert!(ticket.is_confirmed());
        assert!(ticket.used_at.is_none());
        assert_eq!(ticket.attendee_name.as_deref(), Some("Grace Hopper"));

        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["attendeeGovIdType"], "PASSPORT");
        assert_eq!(json["status"], "CONFIRMED");
    }
}
