//! Persistence boundary for the ticketing domain.
//!
//! Handlers only see [`Store`]. [`PgStore`] is the production backend;
//! [`MemoryStore`] keeps everything in process and backs the test suite.
//!
//! Operations whose correctness depends on a read and a write happening
//! together (publishing, ticket issuance, check-in) are single trait methods
//! so each backend can make them atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    EventRegistration, MainEvent, MainEventChanges, NewMainEvent, NewOrganization, NewSession,
    NewSubEvent, NewTicket, NewUser, Organization, OrganizationMember, Session, SubEvent,
    SubEventChanges, SubEventUpdate, Ticket, TicketIssue, User,
};
use crate::utils::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // Users and sessions
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create_session(&self, session: NewSession) -> AppResult<Session>;
    async fn find_session_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>>;
    async fn delete_session(&self, id: Uuid) -> AppResult<()>;

    // Organizations
    /// Creates the organization, its admin user and the OWNER membership together.
    async fn register_organization(
        &self,
        organization: NewOrganization,
        admin: NewUser,
    ) -> AppResult<(Organization, User)>;
    async fn find_organization(&self, id: Uuid) -> AppResult<Option<Organization>>;
    async fn find_organization_by_name(&self, name: &str) -> AppResult<Option<Organization>>;
    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<OrganizationMember>>;
    async fn list_memberships(&self, user_id: Uuid) -> AppResult<Vec<OrganizationMember>>;

    // Main events
    async fn create_main_event(&self, event: NewMainEvent) -> AppResult<MainEvent>;
    async fn find_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>>;
    async fn update_main_event(
        &self,
        id: Uuid,
        changes: MainEventChanges,
    ) -> AppResult<Option<MainEvent>>;
    /// Moves a DRAFT event to PUBLISHED. `None` when the event is missing or not a draft.
    async fn publish_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>>;
    async fn list_published_main_events(&self) -> AppResult<Vec<MainEvent>>;
    async fn list_main_events_for_organizations(
        &self,
        organization_ids: &[Uuid],
    ) -> AppResult<Vec<MainEvent>>;

    // Sub-events
    async fn create_sub_event(&self, sub_event: NewSubEvent) -> AppResult<SubEvent>;
    async fn find_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>>;
    /// Applies `changes` unless the new capacity is below the sub-event's
    /// confirmed ticket count, checked atomically with the write.
    async fn update_sub_event(
        &self,
        id: Uuid,
        changes: SubEventChanges,
    ) -> AppResult<SubEventUpdate>;
    /// Moves a DRAFT sub-event to PUBLISHED. `None` when missing or not a draft.
    async fn publish_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>>;
    /// Sub-events of the given main events, earliest first.
    async fn list_sub_events(&self, main_event_ids: &[Uuid]) -> AppResult<Vec<SubEvent>>;
    async fn count_confirmed_tickets(&self, sub_event_id: Uuid) -> AppResult<i64>;

    // Tickets
    /// Checks for an existing confirmed ticket and for remaining capacity,
    /// then inserts, all as one atomic step.
    async fn issue_ticket(&self, ticket: NewTicket) -> AppResult<TicketIssue>;
    async fn find_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>>;
    /// The user's tickets, newest first.
    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<Ticket>>;
    async fn list_confirmed_tickets(
        &self,
        user_id: Uuid,
        sub_event_ids: &[Uuid],
    ) -> AppResult<Vec<Ticket>>;
    /// CONFIRMED -> USED. `None` when the ticket is missing or not confirmed.
    async fn mark_ticket_used(&self, id: Uuid, used_at: DateTime<Utc>)
        -> AppResult<Option<Ticket>>;
    /// CONFIRMED -> CANCELLED. `None` when the ticket is missing or not confirmed.
    async fn cancel_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>>;

    // Main-event registrations
    /// `None` when the user is already registered for the event.
    async fn create_event_registration(
        &self,
        user_id: Uuid,
        main_event_id: Uuid,
    ) -> AppResult<Option<EventRegistration>>;
}
