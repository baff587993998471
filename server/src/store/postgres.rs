use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    EventRegistration, MainEvent, MainEventChanges, MemberRole, NewMainEvent, NewOrganization,
    NewSession, NewSubEvent, NewTicket, NewUser, Organization, OrganizationMember, Session,
    SubEvent, SubEventChanges, SubEventUpdate, Ticket, TicketIssue, User,
};
use crate::store::Store;
use crate::utils::error::{is_unique_violation, AppError, AppResult};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, token_hash, expires_at, created_at";
const ORGANIZATION_COLUMNS: &str = "id, name, description, website, created_at, updated_at";
const MEMBER_COLUMNS: &str = "id, organization_id, user_id, role, created_at";
const MAIN_EVENT_COLUMNS: &str = "id, organization_id, title, description, venue, start_date, \
     end_date, status, created_at, updated_at";
const SUB_EVENT_COLUMNS: &str = "id, main_event_id, title, description, venue, start_date, \
     end_date, capacity, price, event_type, status, created_at, updated_at";
const TICKET_COLUMNS: &str = "id, user_id, sub_event_id, ticket_number, status, price, \
     attendee_name, attendee_dob, attendee_gov_id, attendee_gov_id_type, used_at, created_at, \
     updated_at";
const REGISTRATION_COLUMNS: &str = "id, user_id, main_event_id, status, created_at";

/// [`Store`] backed by PostgreSQL through a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_user_insert_error(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("User with this email already exists".to_string())
    } else {
        AppError::DatabaseError(err)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_insert_error)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_session(&self, session: NewSession) -> AppResult<Session> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Removed expired sessions");
        }

        let sql = format!(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING {SESSION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Session>(&sql)
            .bind(Uuid::new_v4())
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = $1");
        Ok(sqlx::query_as::<_, Session>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_session(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn register_organization(
        &self,
        organization: NewOrganization,
        admin: NewUser,
    ) -> AppResult<(Organization, User)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO organizations (id, name, description, website) \
             VALUES ($1, $2, $3, $4) RETURNING {ORGANIZATION_COLUMNS}"
        );
        let organization = sqlx::query_as::<_, Organization>(&sql)
            .bind(Uuid::new_v4())
            .bind(&organization.name)
            .bind(&organization.description)
            .bind(&organization.website)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::Conflict("Organization with this name already exists".to_string())
                } else {
                    AppError::DatabaseError(err)
                }
            })?;

        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&admin.name)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .bind(admin.role)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_user_insert_error)?;

        sqlx::query(
            "INSERT INTO organization_members (id, organization_id, user_id, role) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(organization.id)
        .bind(user.id)
        .bind(MemberRole::Owner)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((organization, user))
    }

    async fn find_organization(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_organization_by_name(&self, name: &str) -> AppResult<Option<Organization>> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE name = $1");
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> AppResult<Option<OrganizationMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM organization_members \
             WHERE user_id = $1 AND organization_id = $2"
        );
        Ok(sqlx::query_as::<_, OrganizationMember>(&sql)
            .bind(user_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_memberships(&self, user_id: Uuid) -> AppResult<Vec<OrganizationMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM organization_members \
             WHERE user_id = $1 ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, OrganizationMember>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_main_event(&self, event: NewMainEvent) -> AppResult<MainEvent> {
        let sql = format!(
            "INSERT INTO main_events \
             (id, organization_id, title, description, venue, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {MAIN_EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .bind(Uuid::new_v4())
            .bind(event.organization_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.venue)
            .bind(event.start_date)
            .bind(event.end_date)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>> {
        let sql = format!("SELECT {MAIN_EVENT_COLUMNS} FROM main_events WHERE id = $1");
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_main_event(
        &self,
        id: Uuid,
        changes: MainEventChanges,
    ) -> AppResult<Option<MainEvent>> {
        let sql = format!(
            "UPDATE main_events SET title = $2, description = $3, venue = $4, \
             start_date = $5, end_date = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {MAIN_EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(&changes.venue)
            .bind(changes.start_date)
            .bind(changes.end_date)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn publish_main_event(&self, id: Uuid) -> AppResult<Option<MainEvent>> {
        let sql = format!(
            "UPDATE main_events SET status = 'PUBLISHED', updated_at = NOW() \
             WHERE id = $1 AND status = 'DRAFT' RETURNING {MAIN_EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_published_main_events(&self) -> AppResult<Vec<MainEvent>> {
        let sql = format!(
            "SELECT {MAIN_EVENT_COLUMNS} FROM main_events \
             WHERE status = 'PUBLISHED' ORDER BY start_date"
        );
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_main_events_for_organizations(
        &self,
        organization_ids: &[Uuid],
    ) -> AppResult<Vec<MainEvent>> {
        let sql = format!(
            "SELECT {MAIN_EVENT_COLUMNS} FROM main_events \
             WHERE organization_id = ANY($1) ORDER BY start_date"
        );
        Ok(sqlx::query_as::<_, MainEvent>(&sql)
            .bind(organization_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_sub_event(&self, sub_event: NewSubEvent) -> AppResult<SubEvent> {
        let sql = format!(
            "INSERT INTO sub_events \
             (id, main_event_id, title, description, venue, start_date, end_date, \
              capacity, price, event_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SUB_EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, SubEvent>(&sql)
            .bind(Uuid::new_v4())
            .bind(sub_event.main_event_id)
            .bind(&sub_event.title)
            .bind(&sub_event.description)
            .bind(&sub_event.venue)
            .bind(sub_event.start_date)
            .bind(sub_event.end_date)
            .bind(sub_event.capacity)
            .bind(sub_event.price)
            .bind(sub_event.event_type)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>> {
        let sql = format!("SELECT {SUB_EVENT_COLUMNS} FROM sub_events WHERE id = $1");
        Ok(sqlx::query_as::<_, SubEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_sub_event(
        &self,
        id: Uuid,
        changes: SubEventChanges,
    ) -> AppResult<SubEventUpdate> {
        let mut tx = self.pool.begin().await?;

        // Holds off ticket issuance for this sub-event until the edit commits.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM sub_events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(SubEventUpdate::Missing);
        }

        let confirmed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE sub_event_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if i64::from(changes.capacity) < confirmed {
            return Ok(SubEventUpdate::BelowConfirmed { confirmed });
        }

        let sql = format!(
            "UPDATE sub_events SET title = $2, description = $3, venue = $4, \
             start_date = $5, end_date = $6, capacity = $7, price = $8, event_type = $9, \
             updated_at = NOW() WHERE id = $1 RETURNING {SUB_EVENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, SubEvent>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(&changes.venue)
            .bind(changes.start_date)
            .bind(changes.end_date)
            .bind(changes.capacity)
            .bind(changes.price)
            .bind(changes.event_type)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SubEventUpdate::Updated(updated))
    }

    async fn publish_sub_event(&self, id: Uuid) -> AppResult<Option<SubEvent>> {
        let sql = format!(
            "UPDATE sub_events SET status = 'PUBLISHED', updated_at = NOW() \
             WHERE id = $1 AND status = 'DRAFT' RETURNING {SUB_EVENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, SubEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_sub_events(&self, main_event_ids: &[Uuid]) -> AppResult<Vec<SubEvent>> {
        let sql = format!(
            "SELECT {SUB_EVENT_COLUMNS} FROM sub_events \
             WHERE main_event_id = ANY($1) ORDER BY start_date"
        );
        Ok(sqlx::query_as::<_, SubEvent>(&sql)
            .bind(main_event_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_confirmed_tickets(&self, sub_event_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE sub_event_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(sub_event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn issue_ticket(&self, ticket: NewTicket) -> AppResult<TicketIssue> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent issues for the same sub-event.
        let capacity: Option<i32> =
            sqlx::query_scalar("SELECT capacity FROM sub_events WHERE id = $1 FOR UPDATE")
                .bind(ticket.sub_event_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(capacity) = capacity else {
            return Ok(TicketIssue::SubEventMissing);
        };

        let already_registered: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tickets \
             WHERE user_id = $1 AND sub_event_id = $2 AND status = 'CONFIRMED')",
        )
        .bind(ticket.user_id)
        .bind(ticket.sub_event_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_registered {
            return Ok(TicketIssue::AlreadyRegistered);
        }

        let confirmed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE sub_event_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(ticket.sub_event_id)
        .fetch_one(&mut *tx)
        .await?;
        if confirmed >= i64::from(capacity) {
            return Ok(TicketIssue::SoldOut);
        }

        let sql = format!(
            "INSERT INTO tickets \
             (id, user_id, sub_event_id, ticket_number, status, price, attendee_name, \
              attendee_dob, attendee_gov_id, attendee_gov_id_type) \
             VALUES ($1, $2, $3, $4, 'CONFIRMED', $5, $6, $7, $8, $9) RETURNING {TICKET_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Ticket>(&sql)
            .bind(Uuid::new_v4())
            .bind(ticket.user_id)
            .bind(ticket.sub_event_id)
            .bind(&ticket.ticket_number)
            .bind(ticket.price)
            .bind(&ticket.attendee.name)
            .bind(ticket.attendee.dob)
            .bind(&ticket.attendee.gov_id)
            .bind(ticket.attendee.gov_id_type)
            .fetch_one(&mut *tx)
            .await;

        let inserted = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Ok(TicketIssue::AlreadyRegistered),
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;
        Ok(TicketIssue::Issued(inserted))
    }

    async fn find_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_confirmed_tickets(
        &self,
        user_id: Uuid,
        sub_event_ids: &[Uuid],
    ) -> AppResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE user_id = $1 AND sub_event_id = ANY($2) AND status = 'CONFIRMED'"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(user_id)
            .bind(sub_event_ids)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn mark_ticket_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> AppResult<Option<Ticket>> {
        let sql = format!(
            "UPDATE tickets SET status = 'USED', used_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'CONFIRMED' RETURNING {TICKET_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .bind(used_at)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn cancel_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        let sql = format!(
            "UPDATE tickets SET status = 'CANCELLED', updated_at = NOW() \
             WHERE id = $1 AND status = 'CONFIRMED' RETURNING {TICKET_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_event_registration(
        &self,
        user_id: Uuid,
        main_event_id: Uuid,
    ) -> AppResult<Option<EventRegistration>> {
        let sql = format!(
            "INSERT INTO event_registrations (id, user_id, main_event_id, status) \
             VALUES ($1, $2, $3, 'CONFIRMED') \
             ON CONFLICT (user_id, main_event_id) DO NOTHING \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, EventRegistration>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(main_event_id)
            .fetch_optional(&self.pool)
            .await?)
    }
}
