use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{auth, events, health_check, organizations, sub_events, tickets, verify};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let is_production = state.config.is_production;
    let cors = create_cors_layer(state.config.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(is_production))
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::signup))
        .route(
            "/organizations/register",
            post(organizations::register_organization),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .merge(event_routes())
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/:ticket_id", get(tickets::get_ticket))
        .route("/tickets/:ticket_id/cancel", post(tickets::cancel_ticket))
        .route("/verify", post(verify::mark_attendance))
        .route("/verify/success", get(verify::success_view))
        .route("/verify/:token", get(verify::preview))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events",
            get(events::list_published_events).post(events::create_event),
        )
        .route("/events/managed", get(events::list_managed_events))
        .route(
            "/events/:event_id",
            get(events::get_event).patch(events::update_event),
        )
        .route("/events/:event_id/publish", post(events::publish_event))
        .route("/events/:event_id/register", post(events::register_for_event))
        .route(
            "/events/:event_id/sub-events",
            get(sub_events::event_overview).post(sub_events::create_sub_event),
        )
        .route(
            "/events/:event_id/sub-events/:sub_event_id",
            get(sub_events::get_sub_event).patch(sub_events::update_sub_event),
        )
        .route(
            "/events/:event_id/sub-events/:sub_event_id/publish",
            post(sub_events::publish_sub_event),
        )
        .route(
            "/events/:event_id/sub-events/:sub_event_id/register",
            post(sub_events::register_for_sub_event),
        )
}
