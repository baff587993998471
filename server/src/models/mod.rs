pub mod event;
pub mod organization;
pub mod registration;
pub mod session;
pub mod ticket;
pub mod user;

pub use event::{
    EventStatus, MainEvent, MainEventChanges, NewMainEvent, NewSubEvent, SubEvent,
    SubEventChanges, SubEventType, SubEventUpdate,
};
pub use organization::{MemberRole, NewOrganization, Organization, OrganizationMember};
pub use registration::{EventRegistration, RegistrationStatus};
pub use session::{NewSession, Session};
pub use ticket::{AttendeeDetails, GovIdType, NewTicket, Ticket, TicketIssue, TicketStatus};
pub use user::{NewUser, User, UserRole};
