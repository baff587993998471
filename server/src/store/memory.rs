use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    EventRegistration, EventStatus, MainEvent, MainEventChanges, MemberRole, NewMainEvent,
    NewOrganization, NewSession, NewSubEvent, NewTicket, NewUser, Organization,
    OrganizationMember, RegistrationStatus, Session, SubEvent, SubEventChanges, SubEventUpdate,
    Ticket, TicketIssue, TicketStatus, User,
};
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    organizations: HashMap<Uuid, Organization>,
    members: Vec<OrganizationMember>,
    main_events: HashMap<Uuid, MainEvent>,
    sub_events: HashMap<Uuid, SubEvent>,
    tickets: HashMap<Uuid, Ticket>,
    registrations: Vec<EventRegistration>,
}

impl Tables {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn confirmed_count(&self, sub_event_id: Uuid) -> usize {
        self.tickets
            .values()
            .filter(|t| t.sub_event_id == sub_event_id && t.status == TicketStatus::Confirmed)
            .count()
    }
}

/// In-process [`Store`]. A single lock guards every table, which makes each
/// trait method atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate_email() -> AppError {
    AppError::Conflict("User with this email already exists".to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.email_taken(&user.email) {
            return Err(duplicate_email());
        }
        let user = user.into_user(Utc::now());
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_session(&self, session: NewSession) -> AppResult<Session> {
        let now = Utc::now();
        let session = session.into_session(now);
        let mut tables = self.tables.lock().await;
        tables.sessions.retain(|_, s| !s.is_expired(now));
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> AppResult<()> {
        self.tables.lock().await.sessions.remove(&id);
        Ok(())
    }

    async fn register_organization(
        &self,
        organization: NewOrganization,
        admin: NewUser,
    ) -> AppResult<(Organization, User)> {
        let mut tables = self.tables.lock().await;
        if tables.email_taken(&admin.email) {
            return Err(duplicate_email());
        }
        if tables
            .organizations
            .values()
            .any(|o| o.name == organization.name)
        {
            return Err(AppError::Conflict(
                "Organization with this name already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let organization = organization.into_organization(now);
        let user = admin.into_user(now);
        tables.members.push(OrganizationMember {
            id: Uuid::new_v4(),
            organization_id: organization.id,
            user_id: user.id,
            role: MemberRole::Owner,
            created_at: now,
        });
        tables
            .organizations
            .insert(organization.id, organization.clone());
        tables.users.insert(user.id, user.clone());
        Ok((organization, user))
    }

    async fn find_organization(&self, id: Uuid) -> AppResult<Option<Organization>> {
        Ok(self.tables.lock().await.organizations.get(&id).cloned())
    }

    async fn find_organization_by_name(&self, name: &str) -> AppResult<Option<Organization>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .organizations
            .values()
            .find(|o| o.name == name)
            .cloned())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<OrganizationMember>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn list_memberships(&self, user_id: Uuid) -> AppResult<Vec<OrganizationMember>> {
        let tables = self.tables.lock().await;
        let mut memberships: Vec<_> = tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memberships.sort_by_key(|m| m.created_at);
        Ok(memberships)
    }

    async fn create_main_event(&self, event: NewMainEvent) -> AppResult<MainEvent> {
        let event = event.into_event(Utc::now());
        self.tables
            .lock()
            .await
            .main_events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>> {
        Ok(self.tables.lock().await.main_events.get(&id).cloned())
    }

    async fn update_main_event(
        &self,
        id: Uuid,
        changes: MainEventChanges,
    ) -> AppResult<Option<MainEvent>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.main_events.get_mut(&id).map(|event| {
            changes.apply(event, Utc::now());
            event.clone()
        }))
    }

    async fn publish_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .main_events
            .get_mut(&id)
            .filter(|event| event.status == EventStatus::Draft)
            .map(|event| {
                event.status = EventStatus::Published;
                event.updated_at = Utc::now();
                event.clone()
            }))
    }

    async fn list_published_main_events(&self) -> AppResult<Vec<MainEvent>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables
            .main_events
            .values()
            .filter(|e| e.is_published())
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_date);
        Ok(events)
    }

    async fn list_main_events_for_organizations(
        &self,
        organization_ids: &[Uuid],
    ) -> AppResult<Vec<MainEvent>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<_> = tables
            .main_events
            .values()
            .filter(|e| organization_ids.contains(&e.organization_id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_date);
        Ok(events)
    }

    async fn create_sub_event(&self, sub_event: NewSubEvent) -> AppResult<SubEvent> {
        let sub_event = sub_event.into_sub_event(Utc::now());
        self.tables
            .lock()
            .await
            .sub_events
            .insert(sub_event.id, sub_event.clone());
        Ok(sub_event)
    }

    async fn find_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>> {
        Ok(self.tables.lock().await.sub_events.get(&id).cloned())
    }

    async fn update_sub_event(
        &self,
        id: Uuid,
        changes: SubEventChanges,
    ) -> AppResult<SubEventUpdate> {
        let mut tables = self.tables.lock().await;
        let confirmed = tables.confirmed_count(id) as i64;
        let Some(sub_event) = tables.sub_events.get_mut(&id) else {
            return Ok(SubEventUpdate::Missing);
        };
        if i64::from(changes.capacity) < confirmed {
            return Ok(SubEventUpdate::BelowConfirmed { confirmed });
        }
        changes.apply(sub_event, Utc::now());
        Ok(SubEventUpdate::Updated(sub_event.clone()))
    }

    async fn publish_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .sub_events
            .get_mut(&id)
            .filter(|sub_event| sub_event.status == EventStatus::Draft)
            .map(|sub_event| {
                sub_event.status = EventStatus::Published;
                sub_event.updated_at = Utc::now();
                sub_event.clone()
            }))
    }

    async fn list_sub_events(&self, main_event_ids: &[Uuid]) -> AppResult<Vec<SubEvent>> {
        let tables = self.tables.lock().await;
        let mut sub_events: Vec<_> = tables
            .sub_events
            .values()
            .filter(|s| main_event_ids.contains(&s.main_event_id))
            .cloned()
            .collect();
        sub_events.sort_by_key(|s| s.start_date);
        Ok(sub_events)
    }

    async fn count_confirmed_tickets(&self, sub_event_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.confirmed_count(sub_event_id) as i64)
    }

    async fn issue_ticket(&self, ticket: NewTicket) -> AppResult<TicketIssue> {
        let mut tables = self.tables.lock().await;
        let Some(capacity) = tables
            .sub_events
            .get(&ticket.sub_event_id)
            .map(|s| s.capacity)
        else {
            return Ok(TicketIssue::SubEventMissing);
        };

        let already_registered = tables.tickets.values().any(|t| {
            t.user_id == ticket.user_id
                && t.sub_event_id == ticket.sub_event_id
                && t.status == TicketStatus::Confirmed
        });
        if already_registered {
            return Ok(TicketIssue::AlreadyRegistered);
        }
        if tables.confirmed_count(ticket.sub_event_id) >= capacity.max(0) as usize {
            return Ok(TicketIssue::SoldOut);
        }

        let ticket = ticket.into_ticket(Utc::now());
        tables.tickets.insert(ticket.id, ticket.clone());
        Ok(TicketIssue::Issued(ticket))
    }

    async fn find_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(self.tables.lock().await.tickets.get(&id).cloned())
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        let mut tickets: Vec<_> = tables
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn list_confirmed_tickets(
        &self,
        user_id: Uuid,
        sub_event_ids: &[Uuid],
    ) -> AppResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && t.status == TicketStatus::Confirmed
                    && sub_event_ids.contains(&t.sub_event_id)
            })
            .cloned()
            .collect())
    }

    async fn mark_ticket_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> AppResult<Option<Ticket>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .get_mut(&id)
            .filter(|t| t.status == TicketStatus::Confirmed)
            .map(|ticket| {
                ticket.status = TicketStatus::Used;
                ticket.used_at = Some(used_at);
                ticket.updated_at = used_at;
                ticket.clone()
            }))
    }

    async fn cancel_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .get_mut(&id)
            .filter(|t| t.status == TicketStatus::Confirmed)
            .map(|ticket| {
                ticket.status = TicketStatus::Cancelled;
                ticket.updated_at = Utc::now();
                ticket.clone()
            }))
    }

    async fn create_event_registration(
        &self,
        user_id: Uuid,
        main_event_id: Uuid,
    ) -> AppResult<Option<EventRegistration>> {
        let mut tables = self.tables.lock().await;
        if tables
            .registrations
            .iter()
            .any(|r| r.user_id == user_id && r.main_event_id == main_event_id)
        {
            return Ok(None);
        }
        let registration = EventRegistration {
            id: Uuid::new_v4(),
            user_id,
            main_event_id,
            status: RegistrationStatus::Confirmed,
            created_at: Utc::now(),
        };
        tables.registrations.push(registration.clone());
        Ok(Some(registration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendeeDetails, SubEventType, UserRole};
    use chrono::Duration;
    use rust_decimal::Decimal;

    async fn seed_user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                name: "Attendee".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::User,
            })
            .await
            .unwrap()
    }

    async fn seed_sub_event(store: &MemoryStore, capacity: i32) -> SubEvent {
        let start = Utc::now() + Duration::days(30);
        let event = store
            .create_main_event(NewMainEvent {
                organization_id: Uuid::new_v4(),
                title: "Expo".to_string(),
                description: "Expo".to_string(),
                venue: "Hall".to_string(),
                start_date: start,
                end_date: start + Duration::days(2),
            })
            .await
            .unwrap();
        store
            .create_sub_event(NewSubEvent {
                main_event_id: event.id,
                title: "Keynote".to_string(),
                description: "Opening".to_string(),
                venue: "Hall A".to_string(),
                start_date: start,
                end_date: start + Duration::hours(1),
                capacity,
                price: Decimal::ZERO,
                event_type: SubEventType::General,
            })
            .await
            .unwrap()
    }

    fn new_ticket(user: &User, sub_event: &SubEvent) -> NewTicket {
        NewTicket::new(
            user.id,
            sub_event.id,
            sub_event.price,
            AttendeeDetails::default(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        seed_user(&store, "dup@example.com").await;
        let err = store
            .create_user(NewUser {
                name: "Other".to_string(),
                email: "dup@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: UserRole::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_issue_ticket_enforces_duplicate_and_capacity() {
        let store = MemoryStore::new();
        let sub_event = seed_sub_event(&store, 1).await;
        let first = seed_user(&store, "first@example.com").await;
        let second = seed_user(&store, "second@example.com").await;

        let issued = store.issue_ticket(new_ticket(&first, &sub_event)).await.unwrap();
        assert!(matches!(issued, TicketIssue::Issued(_)));

        let again = store.issue_ticket(new_ticket(&first, &sub_event)).await.unwrap();
        assert!(matches!(again, TicketIssue::AlreadyRegistered));

        let full = store.issue_ticket(new_ticket(&second, &sub_event)).await.unwrap();
        assert!(matches!(full, TicketIssue::SoldOut));

        assert_eq!(store.count_confirmed_tickets(sub_event.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_ticket_frees_the_seat() {
        let store = MemoryStore::new();
        let sub_event = seed_sub_event(&store, 1).await;
        let first = seed_user(&store, "first@example.com").await;
        let second = seed_user(&store, "second@example.com").await;

        let TicketIssue::Issued(ticket) =
            store.issue_ticket(new_ticket(&first, &sub_event)).await.unwrap()
        else {
            panic!("expected a ticket");
        };
        assert!(store.cancel_ticket(ticket.id).await.unwrap().is_some());
        assert!(store.cancel_ticket(ticket.id).await.unwrap().is_none());

        let issued = store.issue_ticket(new_ticket(&second, &sub_event)).await.unwrap();
        assert!(matches!(issued, TicketIssue::Issued(_)));
    }

    #[tokio::test]
    async fn test_concurrent_issues_never_oversell() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let sub_event = seed_sub_event(&store, 3).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let user = seed_user(&store, &format!("user{i}@example.com")).await;
            let store = store.clone();
            let ticket = new_ticket(&user, &sub_event);
            handles.push(tokio::spawn(async move { store.issue_ticket(ticket).await }));
        }

        let mut issued = 0;
        for handle in handles {
            if let TicketIssue::Issued(_) = handle.await.unwrap().unwrap() {
                issued += 1;
            }
        }
        assert_eq!(issued, 3);
        assert_eq!(store.count_confirmed_tickets(sub_event.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mark_used_happens_once() {
        let store = MemoryStore::new();
        let sub_event = seed_sub_event(&store, 5).await;
        let user = seed_user(&store, "scan@example.com").await;
        let TicketIssue::Issued(ticket) =
            store.issue_ticket(new_ticket(&user, &sub_event)).await.unwrap()
        else {
            panic!("expected a ticket");
        };

        let used = store.mark_ticket_used(ticket.id, Utc::now()).await.unwrap();
        assert_eq!(used.unwrap().status, TicketStatus::Used);
        assert!(store
            .mark_ticket_used(ticket.id, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_publish_only_from_draft() {
        let store = MemoryStore::new();
        let sub_event = seed_sub_event(&store, 5).await;

        assert!(store.publish_main_event(sub_event.main_event_id).await.unwrap().is_some());
        assert!(store.publish_main_event(sub_event.main_event_id).await.unwrap().is_none());
        assert!(store.publish_sub_event(sub_event.id).await.unwrap().is_some());
        assert!(store.publish_sub_event(sub_event.id).await.unwrap().is_none());
        assert!(store.publish_sub_event(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_event_registration_is_unique_per_user() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "reg@example.com").await;
        let event_id = Uuid::new_v4();

        assert!(store
            .create_event_registration(user.id, event_id)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .create_event_registration(user.id, event_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_capacity_edit_checks_confirmed_count_atomically() {
        let store = MemoryStore::new();
        let sub_event = seed_sub_event(&store, 2).await;
        let first = seed_user(&store, "first@example.com").await;
        let second = seed_user(&store, "second@example.com").await;

        store.issue_ticket(new_ticket(&first, &sub_event)).await.unwrap();
        // A seat sold after the caller last looked at the count.
        assert_eq!(store.count_confirmed_tickets(sub_event.id).await.unwrap(), 1);
        store.issue_ticket(new_ticket(&second, &sub_event)).await.unwrap();

        let mut changes = SubEventChanges {
            title: sub_event.title.clone(),
            description: sub_event.description.clone(),
            venue: sub_event.venue.clone(),
            start_date: sub_event.start_date,
            end_date: sub_event.end_date,
            capacity: 1,
            price: sub_event.price,
            event_type: sub_event.event_type,
        };
        let refused = store.update_sub_event(sub_event.id, changes.clone()).await.unwrap();
        assert!(matches!(refused, SubEventUpdate::BelowConfirmed { confirmed: 2 }));
        let stored = store.find_sub_event(sub_event.id).await.unwrap().unwrap();
        assert_eq!(stored.capacity, 2);

        changes.capacity = 2;
        let updated = store.update_sub_event(sub_event.id, changes.clone()).await.unwrap();
        assert!(matches!(updated, SubEventUpdate::Updated(s) if s.capacity == 2));

        let missing = store.update_sub_event(Uuid::new_v4(), changes).await.unwrap();
        assert!(matches!(missing, SubEventUpdate::Missing));
    }

    #[tokio::test]
    async fn test_new_session_purges_expired_ones() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "sess@example.com").await;

        let stale = store
            .create_session(NewSession {
                user_id: user.id,
                token_hash: "stale".to_string(),
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .create_session(NewSession {
                user_id: user.id,
                token_hash: "fresh".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.find_session_by_token_hash("stale").await.unwrap().is_none());
        assert!(store.find_session_by_token_hash("fresh").await.unwrap().is_some());
        assert!(!store.tables.lock().await.sessions.contains_key(&stale.id));
    }
}
